use std::sync::Arc;

use shopfront_core::connectivity::OnlineStatus;

use crate::commands::common::{format_event_line, CliContext};
use crate::error::CliError;

/// Sync on every reconnect until interrupted.
pub async fn run_watch(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let online = OnlineStatus::new(false);
    let engine = Arc::new(context.build_engine(&online).await?);
    let mut events = engine.subscribe();
    let mut connectivity = online.subscribe();
    engine.start().await;

    let monitor = Arc::new(context.connectivity_monitor(&online)?);
    let monitor_handle = monitor.spawn(context.settings.check_interval());

    if !as_json {
        println!(
            "Watching {} (checking connectivity every {}s, Ctrl-C to stop)",
            engine.collections().join(", "),
            context.settings.check_interval_secs
        );
    }

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            Some(event) = events.recv() => {
                if as_json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    println!("{}", format_event_line(&event));
                }
            }
            Ok(is_online) = connectivity.recv() => {
                if !as_json {
                    println!("{}", if is_online { "online" } else { "offline" });
                }
            }
        }
    }

    monitor_handle.stop();
    engine.shutdown();
    Ok(())
}

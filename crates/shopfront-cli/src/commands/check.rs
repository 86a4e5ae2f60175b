use shopfront_core::connectivity::OnlineStatus;

use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_check(context: &CliContext) -> Result<(), CliError> {
    let online = OnlineStatus::new(false);
    let monitor = context.connectivity_monitor(&online)?;

    if monitor.check_connectivity().await {
        println!("online");
    } else {
        println!(
            "offline (no answer from {} within {} ms)",
            context.settings.probe_targets.join(", "),
            context.settings.probe_overall_timeout_ms
        );
    }
    Ok(())
}

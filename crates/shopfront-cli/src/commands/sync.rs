use shopfront_core::connectivity::OnlineStatus;

use crate::commands::common::{format_sync_report_lines, CliContext};
use crate::error::CliError;

pub async fn run_sync(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let online = OnlineStatus::new(false);
    let engine = context.build_engine(&online).await?;
    if !context.connectivity_monitor(&online)?.check_connectivity().await {
        tracing::info!("No probe target answered; the device looks offline");
    }

    let report = engine.perform_sync().await;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_sync_report_lines(&report) {
            println!("{line}");
        }
    }

    if let Some(reason) = report.rejected {
        return Err(CliError::SyncRejected(reason));
    }
    if !report.success {
        let failed = report
            .results
            .iter()
            .filter(|(_, result)| result.is_failed())
            .map(|(collection, _)| collection.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CliError::SyncFailed(failed));
    }
    Ok(())
}

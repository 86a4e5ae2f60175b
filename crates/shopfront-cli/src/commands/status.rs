use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::commands::common::{format_timestamp, CliContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub profile: String,
    pub db_path: String,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub collections: Vec<CollectionStatus>,
}

#[derive(Debug, Serialize)]
pub struct CollectionStatus {
    pub name: String,
    pub records: usize,
    pub configured: bool,
}

pub async fn run_status(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let db = context.open_database().await?;
    let last_sync_time = db.load_last_sync_time().await?;

    let mut names = context.settings.collections.clone();
    for name in db.collection_names().await? {
        if !names.contains(&name) {
            names.push(name);
        }
    }

    let mut collections = Vec::with_capacity(names.len());
    for name in names {
        let records = db.load_collection(&name).await?.len();
        let configured = context.settings.collections.contains(&name);
        collections.push(CollectionStatus {
            name,
            records,
            configured,
        });
    }

    let report = StatusReport {
        profile: context.profile_name.clone(),
        db_path: context.db_path.display().to_string(),
        last_sync_time,
        collections,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        format!("Profile: {}", report.profile),
        format!("Database: {}", report.db_path),
        format!(
            "Last sync: {}",
            report
                .last_sync_time
                .map_or_else(|| "never".to_string(), format_timestamp)
        ),
    ];
    for collection in &report.collections {
        let marker = if collection.configured { "" } else { " (not synced)" };
        lines.push(format!(
            "  {}: {} records{marker}",
            collection.name, collection.records
        ));
    }
    lines
}

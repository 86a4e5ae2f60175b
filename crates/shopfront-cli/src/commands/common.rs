use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use shopfront_core::config::{RemoteConfig, SyncSettings};
use shopfront_core::connectivity::{ConnectivityMonitor, HttpProbe, OnlineStatus};
use shopfront_core::remote::HttpDocumentStore;
use shopfront_core::services::DatabaseService;
use shopfront_core::util::normalize_text_option;
use shopfront_core::{Record, SyncEngine, SyncEvent, SyncReport, SyncResult};

use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub const DB_PATH_ENV: &str = "SHOPFRONT_DB_PATH";
pub const REMOTE_URL_ENV: &str = "SHOPFRONT_REMOTE_URL";
pub const API_TOKEN_ENV: &str = "SHOPFRONT_API_TOKEN";

const PREVIEW_FIELDS: usize = 4;

pub type CliSyncEngine = SyncEngine<DatabaseService, HttpDocumentStore>;

/// Everything a command needs from flags, environment and the profile file.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub profile_name: String,
    pub profile: CliProfile,
    pub settings: SyncSettings,
    pub db_path: PathBuf,
}

impl CliContext {
    pub fn load(
        profile: Option<&str>,
        settings_path: Option<&Path>,
        db_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(profile);
        let profile = config.profile(&profile_name).cloned().unwrap_or_default();
        let settings = resolve_settings(settings_path, &profile)?;

        Ok(Self {
            profile_name,
            profile,
            settings,
            db_path: resolve_db_path(db_path),
        })
    }

    pub async fn open_database(&self) -> Result<DatabaseService, CliError> {
        open_database(&self.db_path).await
    }

    pub fn remote_config(&self) -> Result<RemoteConfig, CliError> {
        let url = resolve_remote_url(env::var(REMOTE_URL_ENV).ok(), &self.profile)
            .ok_or(CliError::RemoteNotConfigured)?;
        let token = normalize_text_option(env::var(API_TOKEN_ENV).ok());
        Ok(RemoteConfig::new(url, token)?)
    }

    pub fn remote_store(&self, online: &OnlineStatus) -> Result<HttpDocumentStore, CliError> {
        Ok(HttpDocumentStore::new(&self.remote_config()?)?
            .with_poll_interval(self.settings.remote_poll_interval())
            .with_online_status(online.clone()))
    }

    pub fn connectivity_monitor(
        &self,
        online: &OnlineStatus,
    ) -> Result<ConnectivityMonitor<HttpProbe>, CliError> {
        Ok(ConnectivityMonitor::new(
            HttpProbe::new()?,
            &self.settings,
            online.clone(),
        ))
    }

    pub async fn build_engine(&self, online: &OnlineStatus) -> Result<CliSyncEngine, CliError> {
        let remote = self.remote_store(online)?;
        let local = self.open_database().await?;
        let engine = SyncEngine::new(local, remote, online.clone(), &self.settings);
        engine.restore_last_sync_time().await;
        Ok(engine)
    }

    /// Owner identity for locks; `None` until `config init` has run.
    pub fn owner(&self) -> Option<(String, String)> {
        let owner_id = normalize_text_option(self.profile.owner_id.clone())?;
        let owner_name = self
            .profile
            .display_name()
            .unwrap_or_else(|| owner_id.clone());
        Some((owner_id, owner_name))
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shopfront")
        .join("shopfront.db")
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path).await?)
}

/// Environment first, then the profile.
pub fn resolve_remote_url(env_value: Option<String>, profile: &CliProfile) -> Option<String> {
    normalize_text_option(env_value).or_else(|| profile.remote_url())
}

pub fn resolve_settings(
    settings_path: Option<&Path>,
    profile: &CliProfile,
) -> Result<SyncSettings, CliError> {
    if let Some(path) = settings_path {
        if !path.exists() {
            return Err(CliError::Config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }
        return Ok(SyncSettings::load_from_path(path)?);
    }

    let settings = profile.settings.clone().unwrap_or_default();
    Ok(settings.validated()?)
}

pub fn normalize_name(value: &str) -> Option<String> {
    normalize_text_option(Some(value.to_string()))
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_result_counts(result: &SyncResult) -> String {
    let mut line = format!(
        "{} uploaded, {} downloaded, {} conflicts ({} resolved)",
        result.uploaded, result.downloaded, result.conflicts, result.resolved
    );
    if result.skipped > 0 {
        line.push_str(&format!(", {} skipped", result.skipped));
    }
    line
}

pub fn format_sync_report_lines(report: &SyncReport) -> Vec<String> {
    if let Some(reason) = report.rejected {
        return vec![format!("Sync not started: {reason}")];
    }

    let mut lines = report
        .results
        .iter()
        .map(|(collection, result)| match &result.error {
            Some(error) => format!("{collection}: failed ({error})"),
            None => format!("{collection}: {}", format_result_counts(result)),
        })
        .collect::<Vec<_>>();
    let status = if report.success {
        "Sync completed"
    } else {
        "Sync completed with errors"
    };
    lines.push(format!("{status} at {}", format_timestamp(report.timestamp)));
    lines
}

pub fn format_event_line(event: &SyncEvent) -> String {
    match event {
        SyncEvent::Started => "sync started".to_string(),
        SyncEvent::Progress {
            collection,
            uploaded,
            downloaded,
            conflicts,
        } => format!(
            "  {collection}: {uploaded} uploaded, {downloaded} downloaded, {conflicts} conflicts"
        ),
        SyncEvent::Completed {
            success, timestamp, ..
        } => {
            let outcome = if *success { "ok" } else { "with errors" };
            format!("sync completed {outcome} at {}", format_timestamp(*timestamp))
        }
    }
}

/// First few fields as `key=value`, in key order.
pub fn record_preview(record: &Record) -> String {
    let mut preview = record
        .fields
        .iter()
        .take(PREVIEW_FIELDS)
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    if record.fields.len() > PREVIEW_FIELDS {
        preview.push_str(" ...");
    }
    preview
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let id = if record.id.is_empty() {
                "<no id>"
            } else {
                record.id.as_str()
            };
            format!(
                "{id:<20} {}  {}",
                format_timestamp(record.updated_at),
                record_preview(record)
            )
        })
        .collect()
}

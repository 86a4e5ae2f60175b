//! Runtime configuration for the sync stack.
//!
//! `SyncSettings` carries the tunables of the engine and connectivity
//! monitor; `RemoteConfig` locates the cloud document store. Both are plain
//! serde structs so clients can embed them in their own config files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_COLLECTIONS: [&str; 2] = ["products", "invoices"];
const DEFAULT_PROBE_TARGETS: [&str; 3] = [
    "https://www.google.com",
    "https://www.cloudflare.com",
    "https://www.microsoft.com",
];

/// Tunables for reconciliation and connectivity detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Collections reconciled by each sync run, in order
    pub collections: Vec<String>,
    /// Hosts probed to decide whether the device is online
    pub probe_targets: Vec<String>,
    /// Timeout of a single probe
    pub probe_timeout_ms: u64,
    /// Upper bound for one connectivity check
    pub probe_overall_timeout_ms: u64,
    /// Interval of the background connectivity check
    pub check_interval_secs: u64,
    /// Polling interval of remote live feeds
    pub remote_poll_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            collections: DEFAULT_COLLECTIONS.iter().map(ToString::to_string).collect(),
            probe_targets: DEFAULT_PROBE_TARGETS
                .iter()
                .map(ToString::to_string)
                .collect(),
            probe_timeout_ms: 3_000,
            probe_overall_timeout_ms: 5_000,
            check_interval_secs: 30,
            remote_poll_interval_secs: 15,
        }
    }
}

impl SyncSettings {
    /// Load settings from a JSON file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse settings at {}: {}",
                path.display(),
                error
            ))
        })?;
        settings.validated()
    }

    /// Normalize and validate, returning the cleaned settings.
    pub fn validated(mut self) -> Result<Self> {
        self.collections = normalize_list(self.collections);
        self.probe_targets = normalize_list(self.probe_targets)
            .into_iter()
            .map(|target| target.trim_end_matches('/').to_string())
            .collect();

        if self.collections.is_empty() {
            return Err(Error::Config(
                "at least one collection must be configured".to_string(),
            ));
        }
        if self.probe_targets.is_empty() {
            return Err(Error::Config(
                "at least one probe target must be configured".to_string(),
            ));
        }
        if let Some(target) = self.probe_targets.iter().find(|target| !is_http_url(target)) {
            return Err(Error::Config(format!(
                "probe target '{target}' must include http:// or https://"
            )));
        }
        if self.probe_timeout_ms == 0 || self.probe_timeout_ms > self.probe_overall_timeout_ms {
            return Err(Error::Config(
                "probe_timeout_ms must be positive and not exceed probe_overall_timeout_ms"
                    .to_string(),
            ));
        }
        if self.check_interval_secs == 0 || self.remote_poll_interval_secs == 0 {
            return Err(Error::Config("intervals must be positive".to_string()));
        }
        Ok(self)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub const fn probe_overall_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_overall_timeout_ms)
    }

    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub const fn remote_poll_interval(&self) -> Duration {
        Duration::from_secs(self.remote_poll_interval_secs)
    }
}

/// Location and credentials of the cloud document store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_request_timeout_secs() -> u64 {
    10
}

impl RemoteConfig {
    /// Build a validated config; the base URL must be http(s).
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| Error::Config("remote base URL must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::Config(
                "remote base URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: normalize_text_option(api_token),
            request_timeout_secs: default_request_timeout_secs(),
        })
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn normalize_list(values: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if let Some(value) = normalize_text_option(Some(value)) {
            if !normalized.contains(&value) {
                normalized.push(value);
            }
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = SyncSettings::default().validated().unwrap();
        assert_eq!(settings.collections, vec!["products", "invoices"]);
        assert_eq!(settings.probe_timeout(), Duration::from_secs(3));
        assert_eq!(settings.probe_overall_timeout(), Duration::from_secs(5));
        assert_eq!(settings.check_interval(), Duration::from_secs(30));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: SyncSettings =
            serde_json::from_str(r#"{ "collections": ["products"] }"#).unwrap();
        assert_eq!(settings.collections, vec!["products"]);
        assert_eq!(settings.probe_targets.len(), 3);
    }

    #[test]
    fn validation_dedupes_and_rejects_bad_values() {
        let settings = SyncSettings {
            collections: vec![" products ".to_string(), "products".to_string()],
            ..SyncSettings::default()
        }
        .validated()
        .unwrap();
        assert_eq!(settings.collections, vec!["products"]);

        let no_collections = SyncSettings {
            collections: vec!["  ".to_string()],
            ..SyncSettings::default()
        };
        assert!(no_collections.validated().is_err());

        let bad_target = SyncSettings {
            probe_targets: vec!["example.com".to_string()],
            ..SyncSettings::default()
        };
        assert!(bad_target.validated().is_err());

        let inverted_timeouts = SyncSettings {
            probe_timeout_ms: 6_000,
            ..SyncSettings::default()
        };
        assert!(inverted_timeouts.validated().is_err());
    }

    #[test]
    fn load_from_missing_path_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = SyncSettings::load_from_path(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(settings, SyncSettings::default());
    }

    #[test]
    fn load_from_path_rejects_unknown_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{ "colections": ["products"] }"#).unwrap();

        let error = SyncSettings::load_from_path(&path).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn remote_config_validates_and_trims() {
        let config =
            RemoteConfig::new(" https://docs.example.com/ ", Some("  ".to_string())).unwrap();
        assert_eq!(config.base_url, "https://docs.example.com");
        assert_eq!(config.api_token, None);

        assert!(RemoteConfig::new("docs.example.com", None).is_err());
        assert!(RemoteConfig::new("", None).is_err());
    }

    #[test]
    fn remote_config_debug_redacts_token() {
        let config =
            RemoteConfig::new("https://docs.example.com", Some("secret".to_string())).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}

//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shopfront_core::config::SyncSettings;
use shopfront_core::util::normalize_text_option;

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const PROFILE_ENV: &str = "SHOPFRONT_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Stable identity used as the lock owner
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SyncSettings>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shopfront")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit name, then `SHOPFRONT_PROFILE`, then the active profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(PROFILE_ENV).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn remote_url(&self) -> Option<String> {
        normalize_text_option(self.remote_url.clone())
    }

    /// Owner id, generating and storing a new UUID v7 when missing.
    pub fn ensure_owner_id(&mut self) -> String {
        if let Some(owner_id) = normalize_text_option(self.owner_id.clone()) {
            return owner_id;
        }
        let owner_id = uuid::Uuid::now_v7().to_string();
        self.owner_id = Some(owner_id.clone());
        owner_id
    }

    /// Display name for locks; falls back to the owner id.
    pub fn display_name(&self) -> Option<String> {
        normalize_text_option(self.owner_name.clone())
            .or_else(|| normalize_text_option(self.owner_id.clone()))
    }

    fn normalize(&mut self) {
        self.remote_url = normalize_text_option(self.remote_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.owner_id = normalize_text_option(self.owner_id.clone());
        self.owner_name = normalize_text_option(self.owner_name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" till-1 ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "till-1".to_string(),
            CliProfile {
                remote_url: Some(" https://api.example.com/ ".to_string()),
                owner_id: Some("owner-1".to_string()),
                owner_name: Some(" Front desk ".to_string()),
                settings: Some(SyncSettings {
                    collections: vec!["products".to_string()],
                    ..SyncSettings::default()
                }),
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("till-1"));
        let profile = loaded.profile("till-1").unwrap();
        assert_eq!(profile.remote_url().as_deref(), Some("https://api.example.com"));
        assert_eq!(profile.owner_name.as_deref(), Some("Front desk"));
        assert_eq!(
            profile.settings.as_ref().map(|settings| settings.collections.clone()),
            Some(vec!["products".to_string()])
        );
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("back-office".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(config.resolve_profile_name(Some("till-2")), "till-2");
        if std::env::var_os(PROFILE_ENV).is_none() {
            assert_eq!(config.resolve_profile_name(None), "back-office");
        }
    }

    #[test]
    fn ensure_owner_id_is_stable_once_generated() {
        let mut profile = CliProfile::default();
        let generated = profile.ensure_owner_id();
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
        assert_eq!(profile.ensure_owner_id(), generated);
        assert_eq!(profile.display_name(), Some(generated));
    }
}

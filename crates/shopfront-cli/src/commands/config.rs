use std::env;

use serde::Serialize;
use shopfront_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::commands::common::{resolve_remote_url, REMOTE_URL_ENV};
use crate::config_profiles::{default_config_path, normalize_profile_name, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            remote_url,
            owner_name,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            remote_url,
            owner_name,
            no_activate,
        ),
        ConfigCommands::Show { json } => run_config_show(global_profile, json),
        ConfigCommands::Use { name } => run_config_use(&name),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    remote_url: Option<String>,
    owner_name: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let remote_url = normalize_text_option(remote_url)
        .or_else(|| normalize_text_option(env::var(REMOTE_URL_ENV).ok()));

    apply_config_init(
        &mut config,
        &profile_name,
        remote_url,
        owner_name,
        !no_activate,
    )?;
    let path = config.save().map_err(CliError::Config)?;

    println!("Saved profile '{profile_name}' to {}", path.display());
    if let Some(profile) = config.profile(&profile_name) {
        match profile.remote_url() {
            Some(url) => println!("Remote: {url}"),
            None => println!("Remote: not configured (records stay local)"),
        }
        if let Some(name) = profile.display_name() {
            println!("Owner: {name}");
        }
    }
    Ok(())
}

/// Merge `config init` options into the profile, keeping existing values
/// for options that were not given.
#[allow(clippy::needless_pass_by_value)]
pub fn apply_config_init(
    config: &mut CliProfilesConfig,
    profile_name: &str,
    remote_url: Option<String>,
    owner_name: Option<String>,
    activate: bool,
) -> Result<(), CliError> {
    let remote_url = remote_url
        .as_deref()
        .map(normalize_remote_url)
        .transpose()?;

    let profile = config.profile_mut_or_default(profile_name);
    if let Some(url) = remote_url {
        profile.remote_url = Some(url);
    }
    if let Some(name) = normalize_text_option(owner_name) {
        profile.owner_name = Some(name);
    }
    profile.ensure_owner_id();

    if activate || config.active_profile.is_none() {
        config.active_profile = Some(profile_name.to_string());
    }
    Ok(())
}

pub fn normalize_remote_url(value: &str) -> Result<String, CliError> {
    let value = normalize_text_option(Some(value.to_string()))
        .ok_or_else(|| CliError::Config("Remote URL must not be empty".to_string()))?;
    if !is_http_url(&value) {
        return Err(CliError::Config(
            "Remote URL must include http:// or https://".to_string(),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

#[derive(Debug, Serialize)]
struct ProfileSummary {
    profile: String,
    active: bool,
    config_path: String,
    remote_url: Option<String>,
    owner_id: Option<String>,
    owner_name: Option<String>,
    collections: Vec<String>,
}

fn run_config_show(profile_name: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = config.resolve_profile_name(profile_name);
    let profile = config.profile(&name).cloned().unwrap_or_default();

    let summary = ProfileSummary {
        active: config.active_profile.as_deref() == Some(name.as_str()),
        config_path: default_config_path().display().to_string(),
        remote_url: resolve_remote_url(env::var(REMOTE_URL_ENV).ok(), &profile),
        owner_id: profile.owner_id.clone(),
        owner_name: profile.owner_name.clone(),
        collections: profile
            .settings
            .as_ref()
            .map(|settings| settings.collections.clone())
            .unwrap_or_default(),
        profile: name,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let active = if summary.active { " (active)" } else { "" };
    println!("Profile: {}{active}", summary.profile);
    println!("Config: {}", summary.config_path);
    println!(
        "Remote: {}",
        summary.remote_url.as_deref().unwrap_or("not configured")
    );
    println!(
        "Owner: {} ({})",
        summary.owner_name.as_deref().unwrap_or("-"),
        summary.owner_id.as_deref().unwrap_or("no id yet")
    );
    if !summary.collections.is_empty() {
        println!("Collections: {}", summary.collections.join(", "));
    }
    Ok(())
}

fn run_config_use(name: &str) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = apply_config_use(&mut config, name)?;
    config.save().map_err(CliError::Config)?;
    println!("Active profile: {name}");
    Ok(())
}

pub fn apply_config_use(config: &mut CliProfilesConfig, name: &str) -> Result<String, CliError> {
    let name = normalize_profile_name(Some(name))
        .ok_or_else(|| CliError::Config("Profile name must not be empty".to_string()))?;
    if config.profile(&name).is_none() {
        return Err(CliError::ProfileNotFound(name));
    }
    config.active_profile = Some(name.clone());
    Ok(name)
}

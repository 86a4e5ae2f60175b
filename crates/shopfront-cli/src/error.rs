use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shopfront_core::Error),
    #[error(transparent)]
    Remote(#[from] shopfront_core::remote::RemoteError),
    #[error(transparent)]
    Connectivity(#[from] shopfront_core::connectivity::ConnectivityError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Collection name cannot be empty")]
    EmptyCollection,
    #[error("Item ID cannot be empty")]
    EmptyItemId,
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("Sync was not started: {0}")]
    SyncRejected(shopfront_core::SyncRejection),
    #[error("Sync finished with failed collections: {0}")]
    SyncFailed(String),
    #[error(
        "Remote store is not configured. Run `shopfront config init --remote-url <URL>` or set SHOPFRONT_REMOTE_URL."
    )]
    RemoteNotConfigured,
}

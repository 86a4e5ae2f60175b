//! Remote document store abstraction and implementations.

mod http;
mod memory;

use std::future::Future;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::Record;

pub use http::HttpDocumentStore;
pub use memory::MemoryDocumentStore;

/// Errors raised by a remote document store
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The store could not be reached (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(String),
    /// The store refused the credentials
    #[error("Permission denied: {0}")]
    Permission(String),
    /// The store answered with an unexpected status
    #[error("Remote API error: {0}")]
    Api(String),
    /// The store answered with a body that could not be decoded, or was asked to store one
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    /// Live updates cannot be started in the current context
    #[error("Live updates unavailable: {0}")]
    SubscriptionUnavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidPayload(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Networked document collections addressed by `(collection, id)`.
///
/// `put_one` is an idempotent upsert, so callers may retry it freely.
pub trait RemoteCollectionStore: Send + Sync {
    /// Fetch every document of a collection
    fn list_all(&self, collection: &str) -> impl Future<Output = RemoteResult<Vec<Record>>> + Send;

    /// Fetch one document; `None` when it does not exist
    fn get_one(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = RemoteResult<Option<Record>>> + Send;

    /// Insert or replace a document by id
    fn put_one(
        &self,
        collection: &str,
        record: &Record,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Delete a document; deleting a missing document succeeds
    fn delete_one(&self, collection: &str, id: &str)
        -> impl Future<Output = RemoteResult<()>> + Send;

    /// Live feed of collection snapshots for presentation layers.
    ///
    /// The sync engine never uses this.
    fn subscribe(&self, collection: &str) -> RemoteResult<RemoteFeed>;
}

/// Stream of collection snapshots. Dropping it ends the subscription.
pub struct RemoteFeed {
    collection: String,
    receiver: broadcast::Receiver<Vec<Record>>,
    worker: Option<JoinHandle<()>>,
}

impl RemoteFeed {
    pub(crate) fn new(
        collection: impl Into<String>,
        receiver: broadcast::Receiver<Vec<Record>>,
        worker: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            collection: collection.into(),
            receiver,
            worker,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Wait for the next snapshot; `None` once the feed has closed.
    ///
    /// Snapshots missed by a slow reader are skipped, the next one supersedes them.
    pub async fn recv(&mut self) -> Option<Vec<Record>> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(
                        "Remote feed for '{}' skipped {} stale snapshots",
                        self.collection,
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for RemoteFeed {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

pub(crate) fn require_record_id(record: &Record) -> RemoteResult<()> {
    if record.has_valid_id() {
        Ok(())
    } else {
        Err(RemoteError::InvalidPayload(
            "record id cannot be empty".to_string(),
        ))
    }
}

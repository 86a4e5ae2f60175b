//! Local durable storage for Shopfront

mod collection_repository;
mod connection;
mod migrations;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::models::Record;
use crate::Result;

pub use collection_repository::LibSqlCollectionRepository;
pub use connection::Database;

/// On-device snapshot storage, one snapshot per named collection.
///
/// `put` replaces the whole collection in one effective write. There is no
/// transaction spanning several collections.
pub trait LocalCollectionStore: Send + Sync {
    /// Load every record of a collection (empty when unknown)
    fn get(&self, name: &str) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Replace a collection with `records`
    fn put(&self, name: &str, records: &[Record]) -> impl Future<Output = Result<()>> + Send;

    /// Completion time of the last sync run, when the store keeps one
    fn last_sync_time(&self) -> impl Future<Output = Result<Option<DateTime<Utc>>>> + Send {
        async { Ok(None) }
    }

    /// Remember the completion time of a sync run
    fn set_last_sync_time(&self, at: DateTime<Utc>) -> impl Future<Output = Result<()>> + Send {
        let _ = at;
        async { Ok(()) }
    }
}

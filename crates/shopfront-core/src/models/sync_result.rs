//! Sync outcome models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-collection reconciliation counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Local-only records pushed to the remote store
    pub uploaded: usize,
    /// Remote-only records pulled into the local snapshot
    pub downloaded: usize,
    /// Records present on both sides with differing `updatedAt`
    pub conflicts: usize,
    /// Conflicts whose merged record reached the remote store
    pub resolved: usize,
    /// Local records dropped for a missing or empty id
    #[serde(default)]
    pub skipped: usize,
    /// Set when reconciliation of this collection failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    /// Zero-count result carrying a failure message
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Why a sync request was turned away without touching any store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRejection {
    AlreadySyncing,
    Offline,
}

impl std::fmt::Display for SyncRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadySyncing => write!(f, "Sync already in progress"),
            Self::Offline => write!(f, "Offline - sync skipped"),
        }
    }
}

/// Outcome of one `perform_sync` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub results: BTreeMap<String, SyncResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<SyncRejection>,
}

impl SyncReport {
    pub(crate) fn rejected(reason: SyncRejection) -> Self {
        Self {
            success: false,
            timestamp: Utc::now(),
            results: BTreeMap::new(),
            rejected: Some(reason),
        }
    }

    pub(crate) fn completed(results: BTreeMap<String, SyncResult>, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: results.values().all(|result| !result.is_failed()),
            timestamp,
            results,
            rejected: None,
        }
    }

    /// Sum of the counts across all collections
    pub fn totals(&self) -> SyncResult {
        self.results
            .values()
            .fold(SyncResult::default(), |mut total, result| {
                total.uploaded += result.uploaded;
                total.downloaded += result.downloaded;
                total.conflicts += result.conflicts;
                total.resolved += result.resolved;
                total.skipped += result.skipped;
                total
            })
    }
}

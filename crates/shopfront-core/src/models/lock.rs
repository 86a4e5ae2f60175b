//! Item lock model

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Record;
use crate::util::millis_to_datetime;

/// Lease after which a lock is considered abandoned.
pub const LOCK_LEASE: Duration = Duration::from_secs(5 * 60);

/// Remote collection holding lock documents.
pub const LOCK_COLLECTION: &str = "item_locks";

/// Advisory lease on one record, used to warn concurrent editors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub collection: String,
    pub item_id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub acquired_at_ms: i64,
}

impl Lock {
    /// Remote document id for the lock on `(collection, item_id)`
    pub fn document_id(collection: &str, item_id: &str) -> String {
        format!("{collection}:{item_id}")
    }

    /// Whether the lease has run out at `now_ms`
    pub fn is_stale_at(&self, now_ms: i64) -> bool {
        let lease_ms = i64::try_from(LOCK_LEASE.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.acquired_at_ms) > lease_ms
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    /// Encode as a remote document
    pub fn to_record(&self) -> Record {
        let at = millis_to_datetime(self.acquired_at_ms);
        Record::new(Self::document_id(&self.collection, &self.item_id), at)
            .with_field("collection", self.collection.clone())
            .with_field("itemId", self.item_id.clone())
            .with_field("ownerId", self.owner_id.clone())
            .with_field("ownerName", self.owner_name.clone())
            .with_field("acquiredAtMs", self.acquired_at_ms)
    }

    /// Decode a remote document; `None` when required fields are missing
    pub fn from_record(record: &Record) -> Option<Self> {
        let text = |key: &str| record.field(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            collection: text("collection")?,
            item_id: text("itemId")?,
            owner_id: text("ownerId")?,
            owner_name: text("ownerName").unwrap_or_default(),
            acquired_at_ms: record.field("acquiredAtMs").and_then(Value::as_i64)?,
        })
    }
}

/// Answer to a lock acquisition attempt.
///
/// A denial is ordinary data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockOutcome {
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_by: Option<String>,
}

impl LockOutcome {
    pub const fn granted() -> Self {
        Self {
            granted: true,
            held_by: None,
        }
    }

    pub fn denied(held_by: impl Into<String>) -> Self {
        Self {
            granted: false,
            held_by: Some(held_by.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(acquired_at_ms: i64) -> Lock {
        Lock {
            collection: "products".to_string(),
            item_id: "p1".to_string(),
            owner_id: "till-1".to_string(),
            owner_name: "Front counter".to_string(),
            acquired_at_ms,
        }
    }

    #[test]
    fn record_roundtrip_preserves_lock() {
        let original = lock(1_700_000_000_000);
        let record = original.to_record();
        assert_eq!(record.id, "products:p1");
        assert_eq!(Lock::from_record(&record), Some(original));
    }

    #[test]
    fn staleness_uses_five_minute_lease() {
        let lock = lock(1_000_000);
        assert!(!lock.is_stale_at(1_000_000 + 5 * 60 * 1000));
        assert!(lock.is_stale_at(1_000_000 + 5 * 60 * 1000 + 1));
    }

    #[test]
    fn from_record_rejects_incomplete_document() {
        let record = Record::new("products:p1", chrono::Utc::now()).with_field("ownerId", "x");
        assert!(Lock::from_record(&record).is_none());
    }
}

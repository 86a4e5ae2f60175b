//! Advisory per-record edit locks.
//!
//! # Guarantees
//!
//! Locks are a courtesy signal for concurrent editors, not a correctness
//! mechanism. Acquisition fails open: when the remote store cannot be read or
//! written the lock is reported as granted, so local editing never blocks on
//! the network. Staleness relies on unsynchronized wall clocks. The sync
//! engine never consults these locks.

use std::sync::Arc;

use crate::models::{Lock, LockOutcome, LOCK_COLLECTION};
use crate::remote::{RemoteCollectionStore, RemoteResult};
use crate::util::unix_millis_now;

/// Best-effort lease manager backed by the remote `item_locks` collection
pub struct ItemLockManager<R> {
    remote: Arc<R>,
}

impl<R> Clone for ItemLockManager<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<R: RemoteCollectionStore> ItemLockManager<R> {
    pub const fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// Try to take the lock on `(collection, item_id)` for `owner_id`.
    ///
    /// Granted when no lock exists, the existing lock is stale, or it already
    /// belongs to `owner_id` (which refreshes the lease). Denials report the
    /// holder's name. Remote failures grant the lock.
    pub async fn try_acquire(
        &self,
        collection: &str,
        item_id: &str,
        owner_id: &str,
        owner_name: &str,
    ) -> LockOutcome {
        let document_id = Lock::document_id(collection, item_id);
        let now_ms = unix_millis_now();

        match self.remote.get_one(LOCK_COLLECTION, &document_id).await {
            Ok(Some(record)) => {
                if let Some(existing) = Lock::from_record(&record) {
                    if !existing.is_owned_by(owner_id) && !existing.is_stale_at(now_ms) {
                        tracing::debug!(
                            "Lock on {} held by {} ({})",
                            document_id,
                            existing.owner_name,
                            existing.owner_id
                        );
                        return LockOutcome::denied(existing.owner_name);
                    }
                }
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    "Could not read lock {}: {}. Granting without a lease.",
                    document_id,
                    error
                );
                return LockOutcome::granted();
            }
        }

        let lock = Lock {
            collection: collection.to_string(),
            item_id: item_id.to_string(),
            owner_id: owner_id.to_string(),
            owner_name: owner_name.to_string(),
            acquired_at_ms: now_ms,
        };
        if let Err(error) = self.remote.put_one(LOCK_COLLECTION, &lock.to_record()).await {
            tracing::warn!(
                "Could not write lock {}: {}. Granting without a lease.",
                document_id,
                error
            );
        }
        LockOutcome::granted()
    }

    /// Drop the lock if `owner_id` still holds it; returns whether it was removed.
    ///
    /// Another owner's lock is left untouched.
    pub async fn release(
        &self,
        collection: &str,
        item_id: &str,
        owner_id: &str,
    ) -> RemoteResult<bool> {
        let document_id = Lock::document_id(collection, item_id);
        let Some(record) = self.remote.get_one(LOCK_COLLECTION, &document_id).await? else {
            return Ok(false);
        };

        match Lock::from_record(&record) {
            Some(lock) if lock.is_owned_by(owner_id) => {
                self.remote.delete_one(LOCK_COLLECTION, &document_id).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// The live (non-stale) lock on `(collection, item_id)`, if any
    pub async fn holder(&self, collection: &str, item_id: &str) -> RemoteResult<Option<Lock>> {
        let document_id = Lock::document_id(collection, item_id);
        let record = self.remote.get_one(LOCK_COLLECTION, &document_id).await?;
        let now_ms = unix_millis_now();
        Ok(record
            .as_ref()
            .and_then(Lock::from_record)
            .filter(|lock| !lock.is_stale_at(now_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Record, LOCK_LEASE};
    use crate::remote::{MemoryDocumentStore, RemoteError, RemoteFeed};

    /// Remote whose every call fails as if the network were down
    struct UnreachableRemote;

    impl RemoteCollectionStore for UnreachableRemote {
        async fn list_all(&self, _collection: &str) -> RemoteResult<Vec<Record>> {
            Err(RemoteError::Network("unreachable".to_string()))
        }

        async fn get_one(&self, _collection: &str, _id: &str) -> RemoteResult<Option<Record>> {
            Err(RemoteError::Network("unreachable".to_string()))
        }

        async fn put_one(&self, _collection: &str, _record: &Record) -> RemoteResult<()> {
            Err(RemoteError::Network("unreachable".to_string()))
        }

        async fn delete_one(&self, _collection: &str, _id: &str) -> RemoteResult<()> {
            Err(RemoteError::Network("unreachable".to_string()))
        }

        fn subscribe(&self, collection: &str) -> RemoteResult<RemoteFeed> {
            Err(RemoteError::SubscriptionUnavailable(collection.to_string()))
        }
    }

    fn manager() -> (ItemLockManager<MemoryDocumentStore>, MemoryDocumentStore) {
        let remote = MemoryDocumentStore::new();
        (ItemLockManager::new(Arc::new(remote.clone())), remote)
    }

    fn lease_ms() -> i64 {
        i64::try_from(LOCK_LEASE.as_millis()).unwrap()
    }

    #[tokio::test]
    async fn grants_free_item_and_records_owner() {
        let (locks, remote) = manager();

        let outcome = locks.try_acquire("products", "p1", "till-1", "Ana").await;
        assert_eq!(outcome, LockOutcome::granted());

        let holder = locks.holder("products", "p1").await.unwrap().unwrap();
        assert_eq!(holder.owner_id, "till-1");
        assert_eq!(holder.owner_name, "Ana");
        assert_eq!(remote.snapshot(LOCK_COLLECTION).len(), 1);
    }

    #[tokio::test]
    async fn denies_live_lock_of_another_owner() {
        let (locks, _) = manager();
        locks.try_acquire("products", "p1", "till-1", "Ana").await;

        let outcome = locks.try_acquire("products", "p1", "till-2", "Ben").await;
        assert_eq!(outcome, LockOutcome::denied("Ana"));
    }

    #[tokio::test]
    async fn same_owner_reacquires() {
        let (locks, _) = manager();
        locks.try_acquire("products", "p1", "till-1", "Ana").await;

        let outcome = locks.try_acquire("products", "p1", "till-1", "Ana").await;
        assert!(outcome.granted);
    }

    #[tokio::test]
    async fn stale_lock_is_taken_over() {
        let (locks, remote) = manager();
        let stale = Lock {
            collection: "products".to_string(),
            item_id: "p1".to_string(),
            owner_id: "till-1".to_string(),
            owner_name: "Ana".to_string(),
            acquired_at_ms: unix_millis_now() - lease_ms() - 1_000,
        };
        remote.seed(LOCK_COLLECTION, [stale.to_record()]);

        assert_eq!(locks.holder("products", "p1").await.unwrap(), None);
        let outcome = locks.try_acquire("products", "p1", "till-2", "Ben").await;
        assert!(outcome.granted);
        let holder = locks.holder("products", "p1").await.unwrap().unwrap();
        assert_eq!(holder.owner_id, "till-2");
    }

    #[tokio::test]
    async fn release_only_removes_own_lock() {
        let (locks, _) = manager();
        locks.try_acquire("invoices", "inv-9", "till-1", "Ana").await;

        assert!(!locks.release("invoices", "inv-9", "till-2").await.unwrap());
        assert!(locks.holder("invoices", "inv-9").await.unwrap().is_some());

        assert!(locks.release("invoices", "inv-9", "till-1").await.unwrap());
        assert!(locks.holder("invoices", "inv-9").await.unwrap().is_none());
        assert!(!locks.release("invoices", "inv-9", "till-1").await.unwrap());
    }

    #[tokio::test]
    async fn acquisition_fails_open_when_remote_errors() {
        let locks = ItemLockManager::new(Arc::new(UnreachableRemote));

        let outcome = locks.try_acquire("products", "p1", "till-1", "Ana").await;
        assert!(outcome.granted);
        assert!(outcome.held_by.is_none());
        assert!(locks.release("products", "p1", "till-1").await.is_err());
    }
}

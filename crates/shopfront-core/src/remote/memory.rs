//! In-process document store.
//!
//! Useful for demos without a backend and as the remote side in tests. Every
//! write publishes the new collection snapshot to subscribers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use super::{require_record_id, RemoteCollectionStore, RemoteFeed, RemoteResult};
use crate::models::Record;

const FEED_CAPACITY: usize = 16;

type Collections = HashMap<String, BTreeMap<String, Record>>;

/// Thread-safe in-memory document collections
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<Mutex<Collections>>,
    feeds: Arc<Mutex<HashMap<String, broadcast::Sender<Vec<Record>>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection wholesale (seeding helper)
    pub fn seed(&self, collection: &str, records: impl IntoIterator<Item = Record>) {
        let snapshot = {
            let mut collections = self.lock_collections();
            let documents = collections.entry(collection.to_string()).or_default();
            documents.clear();
            for record in records {
                documents.insert(record.id.clone(), record);
            }
            documents.values().cloned().collect::<Vec<_>>()
        };
        self.publish(collection, snapshot);
    }

    /// Current documents of a collection, ordered by id
    pub fn snapshot(&self, collection: &str) -> Vec<Record> {
        self.lock_collections()
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock_collections(&self) -> std::sync::MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, collection: &str, snapshot: Vec<Record>) {
        let feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = feeds.get(collection) {
            // No receivers left is fine; the next subscribe recreates interest.
            let _ = sender.send(snapshot);
        }
    }
}

impl RemoteCollectionStore for MemoryDocumentStore {
    async fn list_all(&self, collection: &str) -> RemoteResult<Vec<Record>> {
        Ok(self.snapshot(collection))
    }

    async fn get_one(&self, collection: &str, id: &str) -> RemoteResult<Option<Record>> {
        Ok(self
            .lock_collections()
            .get(collection)
            .and_then(|documents| documents.get(id).cloned()))
    }

    async fn put_one(&self, collection: &str, record: &Record) -> RemoteResult<()> {
        require_record_id(record)?;
        let snapshot = {
            let mut collections = self.lock_collections();
            let documents = collections.entry(collection.to_string()).or_default();
            documents.insert(record.id.clone(), record.clone());
            documents.values().cloned().collect::<Vec<_>>()
        };
        self.publish(collection, snapshot);
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> RemoteResult<()> {
        let snapshot = {
            let mut collections = self.lock_collections();
            let Some(documents) = collections.get_mut(collection) else {
                return Ok(());
            };
            if documents.remove(id).is_none() {
                return Ok(());
            }
            documents.values().cloned().collect::<Vec<_>>()
        };
        self.publish(collection, snapshot);
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> RemoteResult<RemoteFeed> {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        let receiver = feeds
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe();
        Ok(RemoteFeed::new(collection, receiver, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;

    fn product(id: &str, stock: i64) -> Record {
        Record::new(id, "2024-01-01T00:00:00Z".parse().unwrap()).with_field("stock", stock)
    }

    #[tokio::test]
    async fn put_is_an_idempotent_upsert() {
        let store = MemoryDocumentStore::new();
        store.put_one("products", &product("p1", 5)).await.unwrap();
        store.put_one("products", &product("p1", 5)).await.unwrap();
        store.put_one("products", &product("p1", 7)).await.unwrap();

        let all = store.list_all("products").await.unwrap();
        assert_eq!(all, vec![product("p1", 7)]);
    }

    #[tokio::test]
    async fn rejects_records_without_id() {
        let store = MemoryDocumentStore::new();
        let error = store.put_one("products", &product("", 1)).await.unwrap_err();
        assert!(matches!(error, RemoteError::InvalidPayload(_)));
        assert!(store.snapshot("products").is_empty());
    }

    #[tokio::test]
    async fn get_and_delete_one() {
        let store = MemoryDocumentStore::new();
        store.seed("products", [product("p1", 1), product("p2", 2)]);

        assert_eq!(
            store.get_one("products", "p2").await.unwrap(),
            Some(product("p2", 2))
        );
        store.delete_one("products", "p2").await.unwrap();
        store.delete_one("products", "missing").await.unwrap();
        store.delete_one("unknown", "p1").await.unwrap();
        assert_eq!(store.get_one("products", "p2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn subscribers_receive_snapshots_after_writes() {
        let store = MemoryDocumentStore::new();
        let mut feed = store.subscribe("products").unwrap();
        assert_eq!(feed.collection(), "products");

        store.put_one("products", &product("p1", 3)).await.unwrap();
        store.put_one("invoices", &product("inv-1", 0)).await.unwrap();

        let snapshot = feed.recv().await.unwrap();
        assert_eq!(snapshot, vec![product("p1", 3)]);
    }
}

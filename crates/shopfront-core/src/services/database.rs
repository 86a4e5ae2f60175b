//! Shared database service wrapper used across clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::{Database, LibSqlCollectionRepository, LocalCollectionStore};
use crate::models::Record;
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self::open_with_recovery(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    async fn open_with_recovery(db_path: &Path) -> Result<Database> {
        match Database::open(db_path).await {
            Ok(db) => Ok(db),
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(db_path)?;
                Database::open(db_path).await
            }
            Err(error) => Err(error),
        }
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "shopfront.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale local database file {}", path.display());
            }
        }

        Ok(())
    }

    /// Filesystem location of the database, `None` for in-memory services.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Load a collection snapshot.
    pub async fn load_collection(&self, name: &str) -> Result<Vec<Record>> {
        let db = self.db.lock().await;
        let repo = LibSqlCollectionRepository::new(db.connection());
        repo.get(name).await
    }

    /// Store collection text as-is, bypassing record encoding.
    #[cfg(test)]
    pub(crate) async fn write_raw_collection(&self, name: &str, raw: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT OR REPLACE INTO collections (name, records, updated_at) VALUES (?, ?, 0)",
                [name, raw],
            )
            .await?;
        Ok(())
    }

    /// Stored collection text, `None` if the collection was never written.
    #[cfg(test)]
    pub(crate) async fn read_raw_collection(&self, name: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query("SELECT records FROM collections WHERE name = ?", [name])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Replace a collection snapshot.
    pub async fn save_collection(&self, name: &str, records: &[Record]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlCollectionRepository::new(db.connection());
        repo.put(name, records).await
    }

    /// List stored collection names.
    pub async fn collection_names(&self) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlCollectionRepository::new(db.connection());
        repo.names().await
    }

    /// Load the last recorded sync completion time.
    pub async fn load_last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let repo = LibSqlCollectionRepository::new(db.connection());
        repo.last_sync_time().await
    }

    /// Record a sync completion time.
    pub async fn save_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlCollectionRepository::new(db.connection());
        repo.set_last_sync_time(at).await
    }
}

impl LocalCollectionStore for DatabaseService {
    async fn get(&self, name: &str) -> Result<Vec<Record>> {
        self.load_collection(name).await
    }

    async fn put(&self, name: &str, records: &[Record]) -> Result<()> {
        self.save_collection(name, records).await
    }

    async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.load_last_sync_time().await
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.save_last_sync_time(at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str) -> Record {
        Record::new(id, "2024-01-01T00:00:00Z".parse().unwrap()).with_field("stock", 1)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_put_and_get_roundtrip() {
        let service = DatabaseService::open_in_memory().await.unwrap();

        LocalCollectionStore::put(&service, "products", &[product("p1")])
            .await
            .unwrap();
        let records = LocalCollectionStore::get(&service, "products").await.unwrap();
        assert_eq!(records, vec![product("p1")]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshot_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("shopfront.db");

        {
            let service = DatabaseService::open_path(&db_path).await.unwrap();
            service
                .save_collection("invoices", &[product("inv-1")])
                .await
                .unwrap();
        }

        let reopened = DatabaseService::open_path(&db_path).await.unwrap();
        let records = reopened.load_collection("invoices").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "inv-1");
        assert_eq!(reopened.path(), Some(db_path.as_path()));
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(DatabaseService::is_corrupted_db_error(&crate::Error::Database(
            "SQLite failure: file is not a database".to_string()
        )));
        assert!(!DatabaseService::is_corrupted_db_error(
            &crate::Error::InvalidInput("collection name cannot be empty".to_string())
        ));
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let test_dir = tempfile::tempdir().unwrap();

        let db_path = test_dir.path().join("shopfront.db");
        let wal_path = test_dir.path().join("shopfront.db-wal");
        let shm_path = test_dir.path().join("shopfront.db-shm");

        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();
        std::fs::write(&shm_path, b"shm").unwrap();

        DatabaseService::quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
        assert!(!shm_path.exists());

        let found_backup = std::fs::read_dir(test_dir.path()).unwrap().any(|entry| {
            entry
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("shopfront.db.corrupt-")
        });
        assert!(found_backup);
    }
}

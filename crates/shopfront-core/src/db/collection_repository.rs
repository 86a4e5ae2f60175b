//! Collection snapshot repository implementation

use chrono::{DateTime, Utc};
use libsql::Connection;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::Record;
use crate::util::unix_millis_now;

const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

/// libSQL-backed storage of whole-collection snapshots.
///
/// Each collection is one row holding a JSON array, so replacing a collection
/// is a single statement.
pub struct LibSqlCollectionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCollectionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Load a collection snapshot; unknown collections are empty.
    ///
    /// Fails with [`Error::Serialization`] if any element cannot be read as a
    /// record.
    pub async fn get(&self, name: &str) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query("SELECT records FROM collections WHERE name = ?", [name])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(Vec::new());
        };
        let raw: String = row.get(0)?;
        let values: Vec<Value> = serde_json::from_str(&raw)?;

        let mut records = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            let record = serde_json::from_value::<Record>(value).inspect_err(|error| {
                tracing::warn!("Unreadable record #{index} in local collection '{name}': {error}");
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Replace a collection snapshot
    pub async fn put(&self, name: &str, records: &[Record]) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("collection name cannot be empty".into()));
        }

        let payload = serde_json::to_string(records)?;
        self.conn
            .execute(
                "INSERT INTO collections (name, records, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    records = excluded.records,
                    updated_at = excluded.updated_at",
                libsql::params![name.to_string(), payload, unix_millis_now()],
            )
            .await?;
        Ok(())
    }

    /// Names of every stored collection
    pub async fn names(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT name FROM collections ORDER BY name ASC", ())
            .await?;

        let mut names = Vec::new();
        while let Some(row) = rows.next().await? {
            names.push(row.get::<String>(0)?);
        }
        Ok(names)
    }

    /// Load the persisted completion time of the last sync run
    pub async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM sync_state WHERE key = ?",
                [LAST_SYNC_TIME_KEY],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let raw: String = row.get(0)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|error| Error::Database(format!("invalid {LAST_SYNC_TIME_KEY}: {error}")))
    }

    /// Persist the completion time of the last sync run
    pub async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)",
                [LAST_SYNC_TIME_KEY.to_string(), at.to_rfc3339()],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn product(id: &str, stock: i64) -> Record {
        Record::new(id, "2024-01-01T00:00:00Z".parse().unwrap()).with_field("stock", stock)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_collection_is_empty() {
        let db = setup().await;
        let repo = LibSqlCollectionRepository::new(db.connection());

        assert!(repo.get("products").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_replaces_whole_collection() {
        let db = setup().await;
        let repo = LibSqlCollectionRepository::new(db.connection());

        repo.put("products", &[product("p1", 5), product("p2", 1)])
            .await
            .unwrap();
        repo.put("products", &[product("p3", 9)]).await.unwrap();

        let stored = repo.get("products").await.unwrap();
        assert_eq!(stored, vec![product("p3", 9)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn collections_are_independent() {
        let db = setup().await;
        let repo = LibSqlCollectionRepository::new(db.connection());

        repo.put("products", &[product("p1", 5)]).await.unwrap();
        repo.put("invoices", &[]).await.unwrap();

        assert_eq!(repo.get("products").await.unwrap().len(), 1);
        assert!(repo.get("invoices").await.unwrap().is_empty());
        assert_eq!(repo.names().await.unwrap(), vec!["invoices", "products"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_element_fails_the_whole_load() {
        let db = setup().await;
        let raw = r#"[{"id":"p1","stock":2},{"id":"p2","updatedAt":"2024-01-01"}]"#;
        db.connection()
            .execute(
                "INSERT INTO collections (name, records, updated_at) VALUES (?, ?, 0)",
                ["products", raw],
            )
            .await
            .unwrap();

        let repo = LibSqlCollectionRepository::new(db.connection());
        let result = repo.get("products").await;
        assert!(matches!(result, Err(Error::Serialization(_))));

        let mut rows = db
            .connection()
            .query("SELECT records FROM collections WHERE name = ?", ["products"])
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), raw);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn last_sync_time_roundtrip() {
        let db = setup().await;
        let repo = LibSqlCollectionRepository::new(db.connection());

        assert_eq!(repo.last_sync_time().await.unwrap(), None);

        let at: DateTime<Utc> = "2024-05-01T12:30:00Z".parse().unwrap();
        repo.set_last_sync_time(at).await.unwrap();
        assert_eq!(repo.last_sync_time().await.unwrap(), Some(at));
    }
}

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde_json::Value;

use super::memory::merge_patch;
use super::{Storage, StorageError, StoreItem};

/// SQLite backend for the storage port. Single pk/sk table, mirroring the
/// partition/sort-key shape of the hosted backends so deployments can run
/// fully offline.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and migrate) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store (for testing).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Delete rows whose retention window has passed. Returns rows removed.
    pub fn purge_expired(&self, now_secs: i64) -> Result<usize, StorageError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn
            .execute("DELETE FROM items WHERE expires_at <= ?1", [now_secs])
            .map_err(map_sqlite)?;
        Ok(removed)
    }
}

fn configure_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout=5000;",
    )?;
    Ok(())
}

/// Run all pending migrations.
fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;
    let current_version = get_current_version(conn);

    let migrations: &[(i64, &str)] = &[(
        1,
        "CREATE TABLE items (
             pk         TEXT NOT NULL,
             sk         TEXT NOT NULL,
             body       TEXT NOT NULL,
             expires_at INTEGER NOT NULL,
             PRIMARY KEY (pk, sk)
         );
         CREATE INDEX idx_items_expires ON items(expires_at);
         INSERT INTO schema_version (version) VALUES (1);",
    )];

    for (version, sql) in migrations {
        if *version > current_version {
            tracing::info!("Running storage migration v{version}");
            conn.execute_batch(sql)?;
        }
    }

    Ok(())
}

fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

/// Lock contention is the one genuinely transient SQLite condition;
/// everything else is surfaced as-is.
fn map_sqlite(e: rusqlite::Error) -> StorageError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &e {
        if matches!(
            inner.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
        ) {
            return StorageError::Transient(e.to_string());
        }
    }
    StorageError::Sqlite(e)
}

impl Storage for SqliteStore {
    async fn put(&self, item: StoreItem) -> Result<(), StorageError> {
        let body = serde_json::to_string(&item.body)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO items (pk, sk, body, expires_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![item.pk, item.sk, body, item.expires_at],
        )
        .map_err(map_sqlite)?;
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoreItem>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT body, expires_at FROM items WHERE pk = ?1 AND sk = ?2",
                [pk, sk],
                |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                },
            )
            .optional()
            .map_err(map_sqlite)?;

        match row {
            None => Ok(None),
            Some((body, expires_at)) => Ok(Some(StoreItem {
                pk: pk.into(),
                sk: sk.into(),
                body: serde_json::from_str(&body)?,
                expires_at,
            })),
        }
    }

    async fn query(
        &self,
        pk: &str,
        sk_prefix: Option<&str>,
    ) -> Result<Vec<StoreItem>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("{}%", sk_prefix.unwrap_or(""));
        let mut stmt = conn
            .prepare(
                "SELECT sk, body, expires_at FROM items
                 WHERE pk = ?1 AND sk LIKE ?2 ORDER BY sk",
            )
            .map_err(map_sqlite)?;
        let rows = stmt
            .query_map([pk, pattern.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(map_sqlite)?;

        let mut items = Vec::new();
        for row in rows {
            let (sk, body, expires_at) = row.map_err(map_sqlite)?;
            items.push(StoreItem {
                pk: pk.into(),
                sk,
                body: serde_json::from_str(&body)?,
                expires_at,
            });
        }
        Ok(items)
    }

    async fn update(&self, pk: &str, sk: &str, patch: Value) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM items WHERE pk = ?1 AND sk = ?2",
                [pk, sk],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite)?;

        let body = body.ok_or_else(|| StorageError::ItemNotFound {
            pk: pk.into(),
            sk: sk.into(),
        })?;
        let mut value: Value = serde_json::from_str(&body)?;
        merge_patch(&mut value, patch);

        conn.execute(
            "UPDATE items SET body = ?3 WHERE pk = ?1 AND sk = ?2",
            rusqlite::params![pk, sk, serde_json::to_string(&value)?],
        )
        .map_err(map_sqlite)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(pk: &str, sk: &str, body: Value, expires_at: i64) -> StoreItem {
        StoreItem {
            pk: pk.into(),
            sk: sk.into(),
            body,
            expires_at,
        }
    }

    #[tokio::test]
    async fn put_get_round_trips() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .put(item("E#1", "META", json!({"symptoms": "cough"}), 100))
            .await
            .unwrap();
        let got = store.get("E#1", "META").await.unwrap().unwrap();
        assert_eq!(got.body["symptoms"], "cough");
        assert_eq!(got.expires_at, 100);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.get("E#1", "META").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_existing_row() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(item("E#1", "META", json!({"v": 1}), 0)).await.unwrap();
        store.put(item("E#1", "META", json!({"v": 2}), 0)).await.unwrap();
        let got = store.get("E#1", "META").await.unwrap().unwrap();
        assert_eq!(got.body["v"], 2);
    }

    #[tokio::test]
    async fn query_prefix_and_order() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(item("E#1", "RESULT#b", json!({}), 0)).await.unwrap();
        store.put(item("E#1", "RESULT#a", json!({}), 0)).await.unwrap();
        store.put(item("E#1", "META", json!({}), 0)).await.unwrap();

        let results = store.query("E#1", Some("RESULT#")).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sk, "RESULT#a");
    }

    #[tokio::test]
    async fn update_merges_and_missing_fails() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .put(item("E#1", "META", json!({"status": "created"}), 0))
            .await
            .unwrap();
        store
            .update("E#1", "META", json!({"status": "completed"}))
            .await
            .unwrap();
        let got = store.get("E#1", "META").await.unwrap().unwrap();
        assert_eq!(got.body["status"], "completed");

        let err = store.update("E#2", "META", json!({})).await.unwrap_err();
        assert!(matches!(err, StorageError::ItemNotFound { .. }));
    }

    #[tokio::test]
    async fn purge_removes_only_expired_rows() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(item("E#1", "META", json!({}), 100)).await.unwrap();
        store.put(item("E#2", "META", json!({}), 200)).await.unwrap();
        let removed = store.purge_expired(150).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("E#1", "META").await.unwrap().is_none());
        assert!(store.get("E#2", "META").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn opens_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triage.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(item("E#1", "META", json!({"v": 1}), 0)).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let got = store.get("E#1", "META").await.unwrap().unwrap();
        assert_eq!(got.body["v"], 1);
    }
}

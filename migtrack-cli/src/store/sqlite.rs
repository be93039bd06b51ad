//! SQLite-backed record store

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{RecordStore, SaveOutcome, StoreError, StoredRecord};
use crate::import::ImportKind;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    kind TEXT NOT NULL,
    record_key TEXT NOT NULL,
    import_set TEXT NOT NULL,
    imported_at TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (kind, record_key)
);
CREATE INDEX IF NOT EXISTS idx_records_import_set ON records (kind, import_set);
"#;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        log::debug!("Opened record store at {}", path.display());
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database; a single pinned connection keeps it alive
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<StoredRecord, StoreError> {
    let kind: String = row.try_get("kind")?;
    let payload: String = row.try_get("payload")?;

    Ok(StoredRecord {
        kind: ImportKind::from_str(&kind).map_err(StoreError::Corrupt)?,
        key: row.try_get("record_key")?,
        import_set: row.try_get("import_set")?,
        imported_at: row.try_get::<DateTime<Utc>, _>("imported_at")?,
        payload: serde_json::from_str(&payload)?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn save(&self, records: &[StoredRecord]) -> Result<SaveOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = 0;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO records (kind, record_key, import_set, imported_at, payload)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (kind, record_key) DO NOTHING
                "#,
            )
            .bind(record.kind.as_str())
            .bind(&record.key)
            .bind(&record.import_set)
            .bind(record.imported_at)
            .bind(serde_json::to_string(&record.payload)?)
            .execute(&mut *tx)
            .await?;

            saved += result.rows_affected() as usize;
        }

        tx.commit().await?;

        Ok(SaveOutcome {
            saved,
            skipped: records.len() - saved,
        })
    }

    async fn fetch(&self, kind: ImportKind, limit: Option<usize>) -> Result<Vec<StoredRecord>, StoreError> {
        // LIMIT -1 means no limit in SQLite
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            r#"
            SELECT kind, record_key, import_set, imported_at, payload
            FROM records
            WHERE kind = ?
            ORDER BY rowid
            LIMIT ?
            "#,
        )
        .bind(kind.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn clear(&self, kind: ImportKind) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE kind = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, kind: ImportKind) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM records WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }
}

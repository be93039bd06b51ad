//! Storage for imported records
//!
//! The import core only needs `save`; `fetch`, `clear` and `count` back the
//! `records` and `clear` commands.

pub mod batch;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::import::{ImportKind, ImportRecord};

pub use batch::{BatchProgress, DEFAULT_BATCH_SIZE, PersistError, PersistReport, persist_in_batches};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("stored row is unreadable: {0}")]
    Corrupt(String),
}

/// Counts returned by one `save` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub saved: usize,
    /// Records the store already held under the same key
    pub skipped: usize,
}

/// A record in its storage form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub kind: ImportKind,
    pub key: String,
    pub import_set: String,
    pub imported_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl StoredRecord {
    /// Deserialize the payload back into its typed record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Conversion of a typed record into its storage form
pub trait StorableRecord: ImportRecord {
    /// Natural key, or a fresh unique key for schemas without one
    fn storage_key(&self) -> String {
        self.natural_key()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    fn to_stored(&self) -> Result<StoredRecord, StoreError> {
        Ok(StoredRecord {
            kind: Self::KIND,
            key: self.storage_key(),
            import_set: self.import_set().to_string(),
            imported_at: self.import_date(),
            payload: serde_json::to_value(self)?,
        })
    }
}

impl<T: ImportRecord> StorableRecord for T {}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert records, skipping any whose (kind, key) is already stored
    async fn save(&self, records: &[StoredRecord]) -> Result<SaveOutcome, StoreError>;

    /// Stored records of one kind in insertion order
    async fn fetch(&self, kind: ImportKind, limit: Option<usize>) -> Result<Vec<StoredRecord>, StoreError>;

    /// Remove every record of one kind, returning how many were removed
    async fn clear(&self, kind: ImportKind) -> Result<u64, StoreError>;

    async fn count(&self, kind: ImportKind) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{ClusterRecord, PackagingRecord};

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_stored_form_uses_natural_key() {
        let record = PackagingRecord {
            application: Some("Office 365".into()),
            package_status: Some("ready".into()),
            readiness_date: None,
            import_date: at(),
            import_set: "IMP-20240601-090000".into(),
        };

        let stored = record.to_stored().unwrap();
        assert_eq!(stored.kind, ImportKind::Packaging);
        assert_eq!(stored.key, "office 365");
        assert_eq!(stored.import_set, "IMP-20240601-090000");
        assert_eq!(stored.decode::<PackagingRecord>().unwrap(), record);
    }

    #[test]
    fn test_keyless_records_get_unique_keys() {
        let record = ClusterRecord {
            department: Some("Finance".into()),
            simple_department: None,
            domain: None,
            cluster_id: Some("C1".into()),
            cluster_readiness: None,
            import_date: at(),
            import_set: "IMP-20240601-090000".into(),
        };

        let first = record.to_stored().unwrap();
        let second = record.to_stored().unwrap();
        assert_ne!(first.key, second.key);
    }
}

//! In-process record store used by `--dry-run` and tests

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{RecordStore, SaveOutcome, StoreError, StoredRecord};
use crate::import::ImportKind;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<StoredRecord>,
    keys: HashSet<(ImportKind, String)>,
}

/// Same duplicate tolerance as [`super::SqliteStore`], nothing persisted
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save(&self, records: &[StoredRecord]) -> Result<SaveOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut outcome = SaveOutcome::default();

        for record in records {
            if inner.keys.insert((record.kind, record.key.clone())) {
                inner.records.push(record.clone());
                outcome.saved += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        Ok(outcome)
    }

    async fn fetch(&self, kind: ImportKind, limit: Option<usize>) -> Result<Vec<StoredRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn clear(&self, kind: ImportKind) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.records.len();
        inner.records.retain(|r| r.kind != kind);
        inner.keys.retain(|(k, _)| *k != kind);
        Ok((before - inner.records.len()) as u64)
    }

    async fn count(&self, kind: ImportKind) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.records.iter().filter(|r| r.kind == kind).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(kind: ImportKind, key: &str) -> StoredRecord {
        StoredRecord {
            kind,
            key: key.to_string(),
            import_set: "IMP-test".to_string(),
            imported_at: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_memory_store_semantics() {
        let store = MemoryStore::new();

        let outcome = store
            .save(&[
                record(ImportKind::Personnel, "jdoe"),
                record(ImportKind::Personnel, "jdoe"),
                record(ImportKind::Personnel, "asmith"),
            ])
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome { saved: 2, skipped: 1 });

        assert_eq!(store.fetch(ImportKind::Personnel, Some(1)).await.unwrap()[0].key, "jdoe");
        assert_eq!(store.count(ImportKind::Personnel).await.unwrap(), 2);

        assert_eq!(store.clear(ImportKind::Personnel).await.unwrap(), 2);
        let again = store.save(&[record(ImportKind::Personnel, "jdoe")]).await.unwrap();
        assert_eq!(again.saved, 1);
    }
}

//! Batched submission of the valid bucket to a record store

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use super::{RecordStore, StorableRecord, StoreError};

/// Records per `save` call unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Sent after every committed batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    pub batches_done: usize,
    pub batch_count: usize,
    pub fraction: f64,
    pub description: String,
}

/// Totals of a fully committed persistence run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub batch_count: usize,
    pub saved: usize,
    pub skipped: usize,
}

/// A batch failed; earlier batches stay committed
#[derive(Debug, Error)]
#[error("batch {failed_batch} of {batch_count} failed after {batches_committed} committed batch(es) ({saved} saved, {skipped} skipped)")]
pub struct PersistError {
    pub batches_committed: usize,
    pub batch_count: usize,
    /// 1-based number of the failing batch
    pub failed_batch: usize,
    pub saved: usize,
    pub skipped: usize,
    #[source]
    pub source: StoreError,
}

/// Save `records` in contiguous chunks of `batch_size`, one `save` call each
///
/// Stops at the first failing batch.
pub async fn persist_in_batches<S, T>(
    store: &S,
    records: &[T],
    batch_size: usize,
    progress: Option<&mpsc::Sender<BatchProgress>>,
) -> Result<PersistReport, PersistError>
where
    S: RecordStore + ?Sized,
    T: StorableRecord,
{
    let batch_count = if batch_size == 0 {
        0
    } else {
        records.len().div_ceil(batch_size)
    };
    let mut report = PersistReport {
        batch_count,
        ..PersistReport::default()
    };

    if batch_size == 0 {
        return Err(PersistError {
            batches_committed: 0,
            batch_count,
            failed_batch: 0,
            saved: 0,
            skipped: 0,
            source: StoreError::InvalidBatchSize,
        });
    }

    log::info!(
        "Persisting {} {} record(s) in {} batch(es) of up to {}",
        records.len(),
        T::KIND,
        batch_count,
        batch_size
    );

    for (i, chunk) in records.chunks(batch_size).enumerate() {
        let fail = |source: StoreError, report: &PersistReport| PersistError {
            batches_committed: i,
            batch_count,
            failed_batch: i + 1,
            saved: report.saved,
            skipped: report.skipped,
            source,
        };

        let stored = chunk
            .iter()
            .map(StorableRecord::to_stored)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fail(e, &report))?;

        let outcome = store.save(&stored).await.map_err(|e| fail(e, &report))?;
        report.saved += outcome.saved;
        report.skipped += outcome.skipped;

        log::debug!(
            "Batch {}/{}: {} saved, {} skipped",
            i + 1,
            batch_count,
            outcome.saved,
            outcome.skipped
        );

        if let Some(tx) = progress {
            let _ = tx.try_send(BatchProgress {
                batches_done: i + 1,
                batch_count,
                fraction: (i + 1) as f64 / batch_count as f64,
                description: format!("Saved batch {} of {}", i + 1, batch_count),
            });
        }
    }

    Ok(report)
}

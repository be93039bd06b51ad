//! Import driver
//!
//! Runs the fixed stage sequence for one workbook and one schema:
//! open -> extract grid -> locate marker/header -> decode, validate and
//! deduplicate each row -> finalize. Progress goes out through the
//! [`ImportContext`]; the result comes back as an [`ImportReport`] value.

use std::path::Path;

use serde::Serialize;

use super::decode::decode_row;
use super::dedup::{DedupOutcome, Deduplicator};
use super::error::ImportError;
use super::grid::{GridRow, extract_grid};
use super::kind::ImportKind;
use super::locator::{ColumnMap, locate};
use super::progress::{ImportContext, ImportStage};
use super::schema::{ImportRecord, ImportStamp, Schema, display_key};
use super::validate::validate_row;
use super::workbook::read_sheet;

/// Rows between progress descriptions and cancellation checks
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Worksheet to read; the first one when `None`
    pub sheet: Option<String>,
    pub progress_interval: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// A row that passed validation and was the first with its key
#[derive(Debug, Clone, Serialize)]
pub struct Classified<T> {
    /// Zero-based sheet row
    pub row_index: usize,
    pub record: T,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidRow<T> {
    pub row_index: usize,
    pub record: T,
    pub violations: Vec<String>,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateRow<T> {
    pub row_index: usize,
    pub record: T,
    pub key: String,
    pub first_row_index: usize,
    pub flags: Vec<String>,
}

impl<T> DuplicateRow<T> {
    /// Review message using 1-based sheet row numbers
    pub fn message(&self) -> String {
        format!(
            "row {} duplicates row {} on key \"{}\"",
            self.row_index + 1,
            self.first_row_index + 1,
            display_key(&self.key)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Completed,
    /// Stopped on request after `rows_decoded` data rows
    Cancelled { rows_decoded: usize },
}

/// Everything an import run produced
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport<T> {
    pub kind: ImportKind,
    pub stamp: ImportStamp,
    pub sheet_name: Option<String>,
    pub sentinel_row: Option<usize>,
    pub header_row: Option<usize>,
    pub valid: Vec<Classified<T>>,
    pub invalid: Vec<InvalidRow<T>>,
    pub duplicates: Vec<DuplicateRow<T>>,
    pub outcome: ImportOutcome,
}

impl<T> ImportReport<T> {
    fn new(kind: ImportKind, stamp: ImportStamp) -> Self {
        Self {
            kind,
            stamp,
            sheet_name: None,
            sentinel_row: None,
            header_row: None,
            valid: Vec::new(),
            invalid: Vec::new(),
            duplicates: Vec::new(),
            outcome: ImportOutcome::Completed,
        }
    }

    fn cancelled(mut self, rows_decoded: usize) -> Self {
        log::info!(
            "Import cancelled after {} row(s): {} valid, {} invalid, {} duplicate kept",
            rows_decoded,
            self.valid.len(),
            self.invalid.len(),
            self.duplicates.len()
        );
        self.outcome = ImportOutcome::Cancelled { rows_decoded };
        self
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, ImportOutcome::Cancelled { .. })
    }

    /// Rows placed in any bucket
    pub fn classified_count(&self) -> usize {
        self.valid.len() + self.invalid.len() + self.duplicates.len()
    }

    /// Records of the valid bucket, in sheet order
    pub fn valid_records(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.valid.iter().map(|row| row.record.clone()).collect()
    }
}

/// Import one workbook with schema `S`
///
/// Structural problems (unreadable file, no data-start marker, no header row)
/// are errors. Cancellation is not: the rows classified so far come back with
/// [`ImportOutcome::Cancelled`].
pub async fn run_import<S: Schema>(
    path: &Path,
    options: &ImportOptions,
    ctx: &ImportContext,
) -> Result<ImportReport<S::Record>, ImportError> {
    let kind = S::kind();
    let stamp = ImportStamp::now();
    let mut report = ImportReport::new(kind, stamp.clone());

    ctx.progress.enter(
        ImportStage::Initializing,
        format!("Preparing import of {}", kind.label()),
    );
    log::info!("Starting {} import from {} ({})", kind, path.display(), stamp.import_set);
    if ctx.is_cancelled() {
        return Ok(report.cancelled(0));
    }

    ctx.progress.enter(ImportStage::Opening, format!("Opening {}", path.display()));
    let owned_path = path.to_path_buf();
    let sheet = options.sheet.clone();
    let grid = tokio::task::spawn_blocking(move || {
        read_sheet(&owned_path, sheet.as_deref()).map(|raw| extract_grid(&raw))
    })
    .await
    .map_err(|e| ImportError::Task(e.to_string()))??;
    log::info!(
        "Read sheet '{}' with {} row(s) across {} column(s)",
        grid.sheet_name,
        grid.len(),
        grid.width()
    );
    report.sheet_name = Some(grid.sheet_name.clone());
    if ctx.is_cancelled() {
        return Ok(report.cancelled(0));
    }

    ctx.progress.enter(ImportStage::Locating, "Locating data-start marker and header row");
    let layout = locate(&grid, S::FIELDS, S::PRIMARY_FIELD)?;
    report.sentinel_row = Some(layout.sentinel_row);
    report.header_row = Some(layout.header_row);
    if ctx.is_cancelled() {
        return Ok(report.cancelled(0));
    }

    let first = layout.first_data_row();
    let total = grid.len().saturating_sub(first);
    let interval = options.progress_interval.max(1);
    let mut dedup = Deduplicator::new();

    ctx.progress.enter(ImportStage::Decoding, format!("Decoding {} row(s)", total));
    for (row_index, row) in grid.rows().iter().enumerate().skip(first) {
        let done = row_index - first;
        if done > 0 && done % interval == 0 {
            if ctx.is_cancelled() {
                return Ok(report.cancelled(done));
            }
            ctx.progress.report(
                ImportStage::Decoding.interpolate(done, total),
                ImportStage::Decoding,
                format!("Decoding row {} of {}", done + 1, total),
            );
            tokio::task::yield_now().await;
        }

        if row.is_blank() {
            continue;
        }
        classify::<S>(&mut report, &mut dedup, row_index, row, &layout.columns, &stamp);
    }

    if ctx.is_cancelled() {
        return Ok(report.cancelled(total));
    }

    ctx.progress.enter(
        ImportStage::Finalizing,
        format!(
            "Finalizing: {} valid, {} invalid, {} duplicate",
            report.valid.len(),
            report.invalid.len(),
            report.duplicates.len()
        ),
    );
    log::info!(
        "{} import finished: {} valid, {} invalid, {} duplicate",
        kind,
        report.valid.len(),
        report.invalid.len(),
        report.duplicates.len()
    );
    ctx.progress.report(1.0, ImportStage::Finalizing, "Import complete");

    Ok(report)
}

/// Decode, validate and deduplicate one non-blank row into exactly one bucket
fn classify<S: Schema>(
    report: &mut ImportReport<S::Record>,
    dedup: &mut Deduplicator,
    row_index: usize,
    row: &GridRow,
    columns: &ColumnMap,
    stamp: &ImportStamp,
) {
    let decoded = decode_row(row_index, row, columns, S::FIELDS);
    let validation = validate_row(&decoded, S::FIELDS);
    let record = S::build(&decoded, stamp);

    if !validation.flags.is_empty() {
        log::warn!("Row {}: {}", row_index + 1, validation.flags.join("; "));
    }

    if !validation.is_valid() {
        log::debug!("Row {} invalid: {}", row_index + 1, validation.violations.join("; "));
        report.invalid.push(InvalidRow {
            row_index,
            record,
            violations: validation.violations,
            flags: validation.flags,
        });
        return;
    }

    let Some(key) = record.natural_key() else {
        report.valid.push(Classified {
            row_index,
            record,
            flags: validation.flags,
        });
        return;
    };

    match dedup.check(&key, row_index) {
        DedupOutcome::First => report.valid.push(Classified {
            row_index,
            record,
            flags: validation.flags,
        }),
        DedupOutcome::Repeat { first_row } => {
            let duplicate = DuplicateRow {
                row_index,
                record,
                key,
                first_row_index: first_row,
                flags: validation.flags,
            };
            log::debug!("{}", duplicate.message());
            report.duplicates.push(duplicate);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use rust_xlsxwriter::Workbook;
    use tempfile::{TempDir, tempdir};
    use tokio::sync::mpsc;

    use super::*;
    use crate::import::progress::{Progress, ProgressReporter};
    use crate::import::records::{ClusterSchema, IdentityGroupSchema, PackagingSchema, PersonnelSchema};

    /// Write `rows` to a single-sheet workbook; empty strings leave the cell unwritten
    fn fixture(rows: &[&[&str]]) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("import.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Tracker").unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                if !text.is_empty() {
                    sheet.write_string(r as u32, c as u16, *text).unwrap();
                }
            }
        }
        workbook.save(&path).unwrap();

        (dir, path)
    }

    fn packaging_rows(count: usize) -> Vec<Vec<String>> {
        let mut rows = vec![
            vec!["Packaging tracker".to_string()],
            vec!["=== DATA STARTS BELOW ===".to_string()],
            vec!["Application".to_string(), "Status".to_string()],
        ];
        for i in 0..count {
            rows.push(vec![format!("App {}", i), "ready".to_string()]);
        }
        rows
    }

    fn fixture_owned(rows: &[Vec<String>]) -> (TempDir, PathBuf) {
        let borrowed: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
        let slices: Vec<&[&str]> = borrowed.iter().map(Vec::as_slice).collect();
        fixture(&slices)
    }

    #[tokio::test]
    async fn test_identity_scrambled_headers_with_duplicate() {
        let (_dir, path) = fixture(&[
            &["Identity group export"],
            &[],
            &["=== DATA STARTS BELOW ==="],
            &["OTAP", "Critical", "App", "Account", "Suite", "Group"],
            &["P", "Yes", "CRM", "jdoe", "Sales", "APP-CRM-Users"],
            &["A", "No", "CRM Web", "jdoe", "Sales", "APP-CRM-Users"],
        ]);

        let report = run_import::<IdentityGroupSchema>(&path, &ImportOptions::default(), &ImportContext::detached())
            .await
            .unwrap();

        assert_eq!(report.outcome, ImportOutcome::Completed);
        assert_eq!(report.sentinel_row, Some(2));
        assert_eq!(report.header_row, Some(3));
        assert_eq!(report.valid.len(), 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.invalid.len(), 0);

        let valid = &report.valid[0];
        assert_eq!(valid.row_index, 4);
        assert_eq!(valid.record.environment.as_deref(), Some("P"));
        assert_eq!(valid.record.critical, Some(true));
        assert_eq!(valid.record.application.as_deref(), Some("CRM"));

        let duplicate = &report.duplicates[0];
        assert_eq!(duplicate.row_index, 5);
        assert_eq!(duplicate.first_row_index, 4);
        assert_eq!(duplicate.message(), "row 6 duplicates row 5 on key \"APP-CRM-Users / jdoe\"");
    }

    #[tokio::test]
    async fn test_identity_keys_with_separator_characters_stay_distinct() {
        let (_dir, path) = fixture(&[
            &["=== DATA STARTS BELOW ==="],
            &["Group", "Account"],
            &["a|b", "c"],
            &["a", "b|c"],
        ]);

        let report = run_import::<IdentityGroupSchema>(&path, &ImportOptions::default(), &ImportContext::detached())
            .await
            .unwrap();

        assert_eq!(report.valid.len(), 2);
        assert!(report.duplicates.is_empty());
    }

    #[tokio::test]
    async fn test_personnel_missing_account_is_invalid() {
        let (_dir, path) = fixture(&[
            &["data starts below"],
            &["Account", "Department", "Leave Date"],
            &["", "Finance", "31/12/2024"],
        ]);

        let report = run_import::<PersonnelSchema>(&path, &ImportOptions::default(), &ImportContext::detached())
            .await
            .unwrap();

        assert_eq!(report.valid.len(), 0);
        assert_eq!(report.invalid.len(), 1);
        let invalid = &report.invalid[0];
        assert!(invalid.violations.iter().any(|v| v == "account is required"));
        assert_eq!(invalid.record.department.as_deref(), Some("Finance"));
    }

    #[tokio::test]
    async fn test_missing_sentinel_is_fatal() {
        let (_dir, path) = fixture(&[&["Account", "Department"], &["jdoe", "Finance"]]);

        let err = run_import::<PersonnelSchema>(&path, &ImportOptions::default(), &ImportContext::detached())
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::MissingSentinel { .. }));
    }

    #[tokio::test]
    async fn test_blank_rows_are_not_classified() {
        let (_dir, path) = fixture(&[
            &["=== DATA STARTS BELOW ==="],
            &["Department", "Domain"],
            &["Finance", "Corporate"],
            &["", ""],
            &["N/A", "n/a"],
            &["Finance", "Corporate"],
        ]);

        let report = run_import::<ClusterSchema>(&path, &ImportOptions::default(), &ImportContext::detached())
            .await
            .unwrap();

        // Cluster rows have no key, so both Finance rows stay valid
        assert_eq!(report.valid.len(), 2);
        assert_eq!(report.classified_count(), 2);
        assert_eq!(report.valid[1].row_index, 5);
    }

    #[tokio::test]
    async fn test_unknown_status_is_flagged() {
        let (_dir, path) = fixture(&[
            &["=== DATA STARTS BELOW ==="],
            &["Application Name", "Package Status", "Readiness Date"],
            &["CRM", "waiting on vendor", "soon"],
            &[" crm ", "ready", "2024-01-15"],
        ]);

        let report = run_import::<PackagingSchema>(&path, &ImportOptions::default(), &ImportContext::detached())
            .await
            .unwrap();

        assert_eq!(report.valid.len(), 1);
        assert_eq!(report.valid[0].flags.len(), 2);
        assert_eq!(report.valid[0].record.readiness_date, None);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].key, "crm");
        assert!(report.duplicates[0].flags.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_rows_keep_their_flags() {
        let (_dir, path) = fixture(&[
            &["=== DATA STARTS BELOW ==="],
            &["Application Name", "Package Status"],
            &["CRM", "ready"],
            &["crm", "waiting on vendor"],
        ]);

        let report = run_import::<PackagingSchema>(&path, &ImportOptions::default(), &ImportContext::detached())
            .await
            .unwrap();

        assert_eq!(report.valid.len(), 1);
        assert_eq!(report.duplicates.len(), 1);
        let duplicate = &report.duplicates[0];
        assert_eq!(duplicate.row_index, 3);
        assert_eq!(duplicate.flags, vec!["package status 'waiting on vendor' is not a recognised value"]);
    }

    #[tokio::test]
    async fn test_cancel_before_start_returns_empty_report() {
        let (_dir, path) = fixture_owned(&packaging_rows(5));
        let ctx = ImportContext::detached();
        ctx.cancel();

        let report = run_import::<PackagingSchema>(&path, &ImportOptions::default(), &ctx)
            .await
            .unwrap();

        assert_eq!(report.outcome, ImportOutcome::Cancelled { rows_decoded: 0 });
        assert_eq!(report.classified_count(), 0);
        assert_eq!(report.sheet_name, None);
    }

    #[tokio::test]
    async fn test_cancel_after_n_rows_keeps_exactly_those_rows() {
        let (_dir, path) = fixture_owned(&packaging_rows(10));
        let (tx, mut rx) = mpsc::channel::<Progress>(256);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let ctx = ImportContext::new(ProgressReporter::new(tx), cancel_flag.clone());

        // Request cancellation once the driver announces the fourth data row
        let watcher = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                if update.description.starts_with("Decoding row 4 of") {
                    cancel_flag.store(true, std::sync::atomic::Ordering::Relaxed);
                }
            }
        });

        let options = ImportOptions {
            progress_interval: 1,
            ..ImportOptions::default()
        };
        let report = run_import::<PackagingSchema>(&path, &options, &ctx).await.unwrap();
        drop(ctx);
        watcher.await.unwrap();

        let ImportOutcome::Cancelled { rows_decoded } = report.outcome else {
            panic!("expected a cancelled import, got {:?}", report.outcome);
        };
        assert_eq!(rows_decoded, 4);
        assert_eq!(report.valid.len(), 4);
        let apps: Vec<_> = report
            .valid
            .iter()
            .map(|row| row.record.application.clone().unwrap())
            .collect();
        assert_eq!(apps, vec!["App 0", "App 1", "App 2", "App 3"]);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_completes() {
        let (_dir, path) = fixture_owned(&packaging_rows(120));
        let (tx, mut rx) = mpsc::channel::<Progress>(1024);
        let ctx = ImportContext::new(ProgressReporter::new(tx), Arc::new(AtomicBool::new(false)));

        let report = run_import::<PackagingSchema>(&path, &ImportOptions::default(), &ctx)
            .await
            .unwrap();
        drop(ctx);
        assert_eq!(report.valid.len(), 120);

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }

        assert!(updates.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        assert_eq!(updates.first().unwrap().stage, ImportStage::Initializing);
        assert_eq!(updates.last().unwrap().fraction, 1.0);
        assert!(updates.iter().any(|u| u.description == "Decoding row 51 of 120"));
        assert!(updates.iter().any(|u| u.description == "Decoding row 101 of 120"));
        assert!(!updates.iter().any(|u| u.description == "Decoding row 2 of 120"));
    }
}

//! Fatal import errors
//!
//! Only structural problems abort an import. Row-level problems are
//! classification outcomes and cancellation is a terminal state, neither is
//! represented here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot open workbook {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("no data-start marker found in sheet '{sheet}' (expected a row such as '=== DATA STARTS BELOW ===')")]
    MissingSentinel { sheet: String },

    #[error("no header row containing {expected} found after the data-start marker on row {sentinel_row}")]
    MissingHeader {
        expected: String,
        sentinel_row: usize,
    },

    #[error("invalid column reference '{0}'")]
    InvalidColumn(String),

    #[error("import task failed: {0}")]
    Task(String),
}

impl ImportError {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ImportError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the errors that mean the workbook layout is unusable
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ImportError::MissingSentinel { .. } | ImportError::MissingHeader { .. }
        )
    }
}

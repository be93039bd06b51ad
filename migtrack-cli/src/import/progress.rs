//! Progress reporting and cancellation for an import run

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

/// Fixed stages of an import, each owning a slice of the 0..=1 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Initializing,
    Opening,
    Locating,
    Decoding,
    Finalizing,
}

impl ImportStage {
    /// Start and end fraction of the stage
    pub fn range(self) -> (f64, f64) {
        match self {
            ImportStage::Initializing => (0.0, 0.10),
            ImportStage::Opening => (0.10, 0.40),
            ImportStage::Locating => (0.40, 0.72),
            ImportStage::Decoding => (0.72, 0.90),
            ImportStage::Finalizing => (0.90, 1.0),
        }
    }

    /// Linear position inside the stage, `done` out of `total`
    pub fn interpolate(self, done: usize, total: usize) -> f64 {
        let (start, end) = self.range();
        if total == 0 {
            return end;
        }
        let ratio = (done as f64 / total as f64).clamp(0.0, 1.0);
        start + (end - start) * ratio
    }

    pub fn label(self) -> &'static str {
        match self {
            ImportStage::Initializing => "Initializing",
            ImportStage::Opening => "Opening workbook",
            ImportStage::Locating => "Locating structure",
            ImportStage::Decoding => "Decoding rows",
            ImportStage::Finalizing => "Finalizing",
        }
    }
}

/// One progress update as seen by the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub fraction: f64,
    pub stage: ImportStage,
    pub description: String,
}

/// Sends progress updates without ever blocking the producer
///
/// Fractions are clamped to 0..=1 and never go backwards: a value lower than
/// one already reported is raised to the previous maximum.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<Progress>>,
    // f64 bits; non-negative floats order the same as their bit patterns
    high_water: Arc<AtomicU64>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::Sender<Progress>) -> Self {
        Self {
            tx: Some(tx),
            high_water: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reporter that drops every update
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, fraction: f64, stage: ImportStage, description: impl Into<String>) {
        let clamped = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let previous = self.high_water.fetch_max(clamped.to_bits(), Ordering::AcqRel);
        let fraction = f64::from_bits(previous).max(clamped);

        if let Some(tx) = &self.tx {
            // try_send so a slow consumer never stalls the import
            let _ = tx.try_send(Progress {
                fraction,
                stage,
                description: description.into(),
            });
        }
    }

    /// Report the start of a stage
    pub fn enter(&self, stage: ImportStage, description: impl Into<String>) {
        self.report(stage.range().0, stage, description);
    }

    /// Highest fraction reported so far
    pub fn current(&self) -> f64 {
        f64::from_bits(self.high_water.load(Ordering::Acquire))
    }
}

/// Context for one import run
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub progress: ProgressReporter,
    /// Flag to signal cancellation
    pub cancel_flag: Arc<AtomicBool>,
}

impl ImportContext {
    pub fn new(progress: ProgressReporter, cancel_flag: Arc<AtomicBool>) -> Self {
        ImportContext { progress, cancel_flag }
    }

    /// Context with no listener and a fresh cancellation flag
    pub fn detached() -> Self {
        Self::new(ProgressReporter::silent(), Arc::new(AtomicBool::new(false)))
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }
}

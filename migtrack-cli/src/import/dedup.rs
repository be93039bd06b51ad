//! Natural-key duplicate detection within one import

use std::collections::HashMap;

/// Result of checking a key against the seen-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// Key not seen before in this import
    First,
    /// Key already taken by an earlier row
    Repeat { first_row: usize },
}

/// Seen-set of natural keys for one import run
///
/// Only rows that passed validation are offered here, so an invalid row can
/// never claim a key.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashMap<String, usize>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` for `row_index`, or report the row that already holds it
    pub fn check(&mut self, key: &str, row_index: usize) -> DedupOutcome {
        match self.seen.get(key) {
            Some(&first_row) => DedupOutcome::Repeat { first_row },
            None => {
                self.seen.insert(key.to_string(), row_index);
                DedupOutcome::First
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

//! Spreadsheet column labels <-> zero-based column indices
//!
//! Column labels are bijective base-26: "A".."Z" are 0..25, "AA" is 26.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::ImportError;

static CELL_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$?([A-Za-z]+)\$?([0-9]+)$").expect("cell reference pattern is valid")
});

/// Convert a column label ("A", "Z", "AA", "xfd") to a zero-based index
pub fn column_index(label: &str) -> Result<usize, ImportError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(ImportError::InvalidColumn(label.to_string()));
    }

    let mut value: usize = 0;
    for ch in label.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(ImportError::InvalidColumn(label.to_string()));
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        value = value
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| ImportError::InvalidColumn(label.to_string()))?;
    }

    Ok(value - 1)
}

/// Convert a zero-based column index back to its label
pub fn column_label(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Split an A1-style reference into zero-based (column, row)
/// e.g. "AB12" -> (27, 11). Absolute markers ("$B$3") are accepted.
pub fn split_cell_reference(reference: &str) -> Result<(usize, usize), ImportError> {
    let caps = CELL_REFERENCE
        .captures(reference.trim())
        .ok_or_else(|| ImportError::InvalidColumn(reference.to_string()))?;

    let column = column_index(&caps[1])?;
    let row: usize = caps[2]
        .parse()
        .map_err(|_| ImportError::InvalidColumn(reference.to_string()))?;
    if row == 0 {
        return Err(ImportError::InvalidColumn(reference.to_string()));
    }

    Ok((column, row - 1))
}

//! Data-start marker and header row detection
//!
//! Workbooks carry arbitrary preamble rows (titles, instructions, legends).
//! Importable data begins after a marker row such as `=== DATA STARTS BELOW ===`;
//! the first row after it that names the schema's primary field is the header.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::ImportError;
use super::grid::{Grid, GridRow};
use super::schema::FieldSpec;

/// Accepted marker spellings after [`normalize_marker`]
const START_MARKERS: &[&str] = &[
    "data starts below",
    "data starts here",
    "data begins below",
    "start of data",
    "begin data",
];

static MARKER_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s=_\-*#>:]+").expect("marker pattern is valid"));

/// Lower-case, strip `=`/punctuation runs, collapse whitespace
pub fn normalize_marker(text: &str) -> String {
    MARKER_NOISE
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Lower-case alphanumerics only: "Application Name" and "application_name"
/// both become "applicationname"
pub fn normalize_header(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// True when the row's text contains a data-start marker
pub fn is_start_marker(row: &GridRow) -> bool {
    if row.is_blank() {
        return false;
    }
    let text = row.cells().map(|(_, s)| s).collect::<Vec<_>>().join(" ");
    let normalized = normalize_marker(&text);
    START_MARKERS.iter().any(|marker| normalized.contains(marker))
}

/// Canonical field for a header cell, if any variant matches
pub fn canonical_field(header: &str, fields: &[FieldSpec]) -> Option<&'static str> {
    let normalized = normalize_header(header);
    if normalized.is_empty() {
        return None;
    }
    fields
        .iter()
        .find(|f| f.name == normalized || f.variants.contains(&normalized.as_str()))
        .map(|f| f.name)
}

/// Canonical field name -> zero-based column index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<String, usize>,
}

impl ColumnMap {
    pub fn get(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.columns.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Build the column map from a header row
///
/// Unknown headers are kept under their own normalized text. When two columns
/// resolve to the same name the left-most one wins.
pub fn build_column_map(header: &GridRow, fields: &[FieldSpec]) -> ColumnMap {
    let mut columns = HashMap::new();

    for (column, text) in header.cells() {
        let key = match canonical_field(text, fields) {
            Some(name) => name.to_string(),
            None => normalize_header(text),
        };
        if key.is_empty() {
            continue;
        }

        if let Some(existing) = columns.get(&key) {
            log::warn!(
                "Header '{}' in column {} maps to '{}' which is already taken by column {}; ignoring it",
                text,
                column + 1,
                key,
                existing + 1
            );
            continue;
        }
        columns.insert(key, column);
    }

    ColumnMap { columns }
}

/// Where the data lives in a grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub sentinel_row: usize,
    pub header_row: usize,
    pub columns: ColumnMap,
}

impl Layout {
    /// First row that may hold data
    pub fn first_data_row(&self) -> usize {
        self.header_row + 1
    }
}

pub fn find_start_marker(grid: &Grid) -> Option<usize> {
    grid.rows().iter().position(is_start_marker)
}

/// Locate marker, header row and column map for a schema
pub fn locate(grid: &Grid, fields: &[FieldSpec], primary_field: &str) -> Result<Layout, ImportError> {
    let sentinel_row = find_start_marker(grid).ok_or_else(|| ImportError::MissingSentinel {
        sheet: grid.sheet_name.clone(),
    })?;
    log::debug!("Data-start marker found on row {}", sentinel_row + 1);

    let header_row = grid
        .rows()
        .iter()
        .enumerate()
        .skip(sentinel_row + 1)
        .find(|(_, row)| {
            row.cells()
                .any(|(_, text)| canonical_field(text, fields) == Some(primary_field))
        })
        .map(|(idx, _)| idx)
        .ok_or_else(|| ImportError::MissingHeader {
            expected: describe_primary(fields, primary_field),
            sentinel_row: sentinel_row + 1,
        })?;

    let columns = grid
        .row(header_row)
        .map(|row| build_column_map(row, fields))
        .unwrap_or_default();

    log::debug!(
        "Header row {} mapped {} column(s): {:?}",
        header_row + 1,
        columns.len(),
        columns.columns
    );

    Ok(Layout {
        sentinel_row,
        header_row,
        columns,
    })
}

fn describe_primary(fields: &[FieldSpec], primary_field: &str) -> String {
    match fields.iter().find(|f| f.name == primary_field) {
        Some(field) => format!("a '{}' column", field.label),
        None => format!("a '{}' column", primary_field),
    }
}

//! Cell grid extraction
//!
//! Turns a worksheet's raw row/cell stream plus its shared-string table into
//! a row-major grid of trimmed strings. Rows are sparse: only cells with
//! content are stored, every other column reads as [`ABSENT`].

use std::collections::BTreeMap;

/// Placeholder for blank or missing cell content
pub const ABSENT: &str = "N/A";

/// True when a cell's text carries no data
pub fn is_absent(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ABSENT)
}

/// Content of a single cell as it appears in the worksheet stream
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// Index into the workbook's shared-string table
    Shared(usize),
    /// Literal value (inline strings, numbers, formula results)
    Inline(String),
    Bool(bool),
    /// Error values such as #N/A or #REF!
    Error(String),
    Empty,
}

/// A cell positioned by zero-based column
#[derive(Debug, Clone, PartialEq)]
pub struct RawCell {
    pub column: usize,
    pub content: CellContent,
}

/// A worksheet row as read from the file, positioned by zero-based row index
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    pub index: usize,
    pub cells: Vec<RawCell>,
}

/// Raw contents of one worksheet
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub name: String,
    /// `None` when the workbook has no shared-string part
    pub shared_strings: Option<Vec<String>>,
    pub rows: Vec<RawRow>,
}

/// One grid row: column index -> trimmed text, absent cells omitted
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridRow {
    cells: BTreeMap<usize, String>,
}

impl GridRow {
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: AsRef<str>,
    {
        let mut row = GridRow::default();
        for (column, text) in cells {
            row.set(column, text.as_ref());
        }
        row
    }

    /// Store a cell, normalizing blanks to absent
    pub fn set(&mut self, column: usize, text: &str) {
        if is_absent(text) {
            self.cells.remove(&column);
        } else {
            self.cells.insert(column, text.trim().to_string());
        }
    }

    /// Cell text, or [`ABSENT`] when the column holds nothing
    pub fn get(&self, column: usize) -> &str {
        self.cells.get(&column).map(|s| s.as_str()).unwrap_or(ABSENT)
    }

    /// Number of columns needed to hold every stored cell
    pub fn width(&self) -> usize {
        self.cells.keys().next_back().map(|c| c + 1).unwrap_or(0)
    }

    /// True when every cell is absent
    pub fn is_blank(&self) -> bool {
        self.cells.is_empty()
    }

    /// Stored (non-absent) cells in column order
    pub fn cells(&self) -> impl Iterator<Item = (usize, &str)> {
        self.cells.iter().map(|(c, s)| (*c, s.as_str()))
    }
}

/// Row-major grid indexed by zero-based sheet row
#[derive(Debug, Clone, Default)]
pub struct Grid {
    pub sheet_name: String,
    rows: Vec<GridRow>,
}

impl Grid {
    pub fn new(sheet_name: impl Into<String>, rows: Vec<GridRow>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            rows,
        }
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&GridRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row in the grid
    pub fn width(&self) -> usize {
        self.rows.iter().map(GridRow::width).max().unwrap_or(0)
    }
}

/// Build a grid from a raw sheet
///
/// Shared-string references are resolved against the sheet's table; a missing
/// table or an out-of-range index yields an absent cell. Rows missing from the
/// stream become blank rows so grid indices match sheet rows.
pub fn extract_grid(sheet: &RawSheet) -> Grid {
    let height = sheet.rows.iter().map(|r| r.index + 1).max().unwrap_or(0);
    let mut rows = vec![GridRow::default(); height];
    let mut dropped_refs = 0usize;

    for raw in &sheet.rows {
        let row = &mut rows[raw.index];
        for cell in &raw.cells {
            let text = match &cell.content {
                CellContent::Shared(idx) => {
                    match sheet.shared_strings.as_ref().and_then(|t| t.get(*idx)) {
                        Some(s) => s.as_str(),
                        None => {
                            dropped_refs += 1;
                            ABSENT
                        }
                    }
                }
                CellContent::Inline(s) => s.as_str(),
                CellContent::Bool(true) => "TRUE",
                CellContent::Bool(false) => "FALSE",
                CellContent::Error(_) | CellContent::Empty => ABSENT,
            };
            row.set(cell.column, text);
        }
    }

    if dropped_refs > 0 {
        log::warn!(
            "Sheet '{}': {} shared-string reference(s) could not be resolved and were treated as blank",
            sheet.name,
            dropped_refs
        );
    }

    Grid::new(sheet.name.clone(), rows)
}

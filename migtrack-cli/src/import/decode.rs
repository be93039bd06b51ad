//! Row decoding: grid row + column map -> field values

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::date::decode_date;
use super::grid::{ABSENT, GridRow, is_absent};
use super::locator::ColumnMap;
use super::schema::{FieldKind, FieldSpec};

/// A decoded cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    /// Column missing, out of range, or blank
    Absent,
    Text(String),
    Date(NaiveDate),
    /// Content in a date column that no date layout accepted
    BadDate(String),
    Flag(bool),
    /// Content in a flag column that is not a recognised yes/no value
    BadFlag(String),
}

static ABSENT_VALUE: FieldValue = FieldValue::Absent;

/// One row's field values keyed by canonical field name
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    /// Zero-based sheet row
    pub row_index: usize,
    values: HashMap<&'static str, FieldValue>,
}

impl DecodedRow {
    pub fn new(row_index: usize) -> Self {
        Self {
            row_index,
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, field: &'static str, value: FieldValue) -> Self {
        self.values.insert(field, value);
        self
    }

    pub fn value(&self, field: &str) -> &FieldValue {
        self.values.get(field).unwrap_or(&ABSENT_VALUE)
    }

    /// Text of a field, `None` when absent. Unreadable dates and flags keep
    /// their original text here.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.value(field) {
            FieldValue::Text(s) | FieldValue::BadDate(s) | FieldValue::BadFlag(s) => Some(s.clone()),
            FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            FieldValue::Flag(b) => Some(if *b { "Yes" } else { "No" }.to_string()),
            FieldValue::Absent => None,
        }
    }

    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        match self.value(field) {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn flag(&self, field: &str) -> Option<bool> {
        match self.value(field) {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_absent(&self, field: &str) -> bool {
        matches!(self.value(field), FieldValue::Absent)
    }
}

/// Interpret yes/no style cell text
pub fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" | "x" | "ja" => Some(true),
        "no" | "n" | "false" | "0" | "nee" => Some(false),
        _ => None,
    }
}

/// Cell text for a field, defaulting to [`ABSENT`] when unmapped or out of range
pub fn cell_for<'a>(row: &'a GridRow, columns: &ColumnMap, field: &str) -> &'a str {
    match columns.get(field) {
        Some(column) => row.get(column),
        None => ABSENT,
    }
}

/// Decode every field of the schema from one grid row
pub fn decode_row(row_index: usize, row: &GridRow, columns: &ColumnMap, fields: &[FieldSpec]) -> DecodedRow {
    let mut decoded = DecodedRow::new(row_index);

    for field in fields {
        let raw = cell_for(row, columns, field.name);
        let value = if is_absent(raw) {
            FieldValue::Absent
        } else {
            match field.kind {
                FieldKind::Text => FieldValue::Text(raw.to_string()),
                FieldKind::Date | FieldKind::StrictDate => match decode_date(raw).date() {
                    Some(date) => FieldValue::Date(date),
                    None => FieldValue::BadDate(raw.to_string()),
                },
                FieldKind::Flag => match parse_flag(raw) {
                    Some(flag) => FieldValue::Flag(flag),
                    None => FieldValue::BadFlag(raw.to_string()),
                },
            }
        };
        decoded.values.insert(field.name, value);
    }

    decoded
}

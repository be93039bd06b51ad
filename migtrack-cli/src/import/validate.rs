//! Per-row validation against a schema's field table

use serde::Serialize;

use super::decode::{DecodedRow, FieldValue};
use super::schema::{FieldKind, FieldSpec};

/// Outcome of validating a single row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    /// Broken rules; any entry makes the row invalid
    pub violations: Vec<String>,
    /// Review notes that do not fail the row
    pub flags: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check a decoded row field by field, in field-table order
pub fn validate_row(row: &DecodedRow, fields: &[FieldSpec]) -> Validation {
    let mut result = Validation::default();

    for field in fields {
        match row.value(field.name) {
            FieldValue::Absent => {
                if let Some(message) = field.required {
                    result.violations.push(message.to_string());
                }
            }
            FieldValue::BadDate(raw) => {
                if field.kind == FieldKind::StrictDate {
                    result
                        .violations
                        .push(format!("{} '{}' is not a recognised date", field.label, raw));
                } else {
                    result.flags.push(format!(
                        "{} '{}' is not a recognised date and was left empty",
                        field.label, raw
                    ));
                }
            }
            FieldValue::BadFlag(raw) => {
                result.flags.push(format!(
                    "{} '{}' is not a recognised yes/no value and was left empty",
                    field.label, raw
                ));
            }
            FieldValue::Text(text) => {
                if !field.known_values.is_empty() && !is_known(text, field.known_values) {
                    result
                        .flags
                        .push(format!("{} '{}' is not a recognised value", field.label, text));
                }
            }
            FieldValue::Date(_) | FieldValue::Flag(_) => {}
        }
    }

    result
}

fn is_known(value: &str, known: &[&str]) -> bool {
    let folded = value.split_whitespace().collect::<Vec<_>>().join(" ");
    known.iter().any(|k| k.eq_ignore_ascii_case(&folded))
}

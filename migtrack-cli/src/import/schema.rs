//! Record schema descriptors
//!
//! Every importable schema is described by a static field table plus a typed
//! record constructor. The pipeline, locator, decoder and validator are all
//! generic over [`Schema`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::decode::DecodedRow;
use super::kind::ImportKind;

/// How a column's cell text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text
    Text,
    /// Optional date; unreadable values are dropped and flagged
    Date,
    /// Date that must be readable when present; unreadable values fail the row
    StrictDate,
    /// Yes/no style flag
    Flag,
}

/// One canonical field of a schema
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical field name used in the column map
    pub name: &'static str,
    /// Label used in review messages
    pub label: &'static str,
    /// Accepted header spellings, already normalized (lower-case alphanumerics)
    pub variants: &'static [&'static str],
    pub kind: FieldKind,
    /// Violation message when the field is missing; `None` for optional fields
    pub required: Option<&'static str>,
    /// Recognised values for status-like fields; empty accepts anything
    pub known_values: &'static [&'static str],
}

impl FieldSpec {
    pub const fn text(name: &'static str, label: &'static str, variants: &'static [&'static str]) -> Self {
        Self {
            name,
            label,
            variants,
            kind: FieldKind::Text,
            required: None,
            known_values: &[],
        }
    }

    pub const fn date(name: &'static str, label: &'static str, variants: &'static [&'static str]) -> Self {
        Self {
            kind: FieldKind::Date,
            ..Self::text(name, label, variants)
        }
    }

    pub const fn strict_date(name: &'static str, label: &'static str, variants: &'static [&'static str]) -> Self {
        Self {
            kind: FieldKind::StrictDate,
            ..Self::text(name, label, variants)
        }
    }

    pub const fn flag(name: &'static str, label: &'static str, variants: &'static [&'static str]) -> Self {
        Self {
            kind: FieldKind::Flag,
            ..Self::text(name, label, variants)
        }
    }

    pub const fn required(self, message: &'static str) -> Self {
        Self {
            required: Some(message),
            ..self
        }
    }

    pub const fn known(self, values: &'static [&'static str]) -> Self {
        Self {
            known_values: values,
            ..self
        }
    }
}

/// Creation stamp shared by every record of one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStamp {
    pub imported_at: DateTime<Utc>,
    pub import_set: String,
}

impl ImportStamp {
    pub fn at(imported_at: DateTime<Utc>) -> Self {
        Self {
            import_set: format!("IMP-{}", imported_at.format("%Y%m%d-%H%M%S")),
            imported_at,
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

/// Behaviour shared by every typed record
pub trait ImportRecord: Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ImportKind;

    /// Key that must be unique within one import; `None` disables duplicate detection
    fn natural_key(&self) -> Option<String>;

    fn import_date(&self) -> DateTime<Utc>;

    fn import_set(&self) -> &str;
}

/// Descriptor tying a field table to its record type
pub trait Schema: Send + Sync + 'static {
    type Record: ImportRecord;

    /// Field table, in the order violations are reported
    const FIELDS: &'static [FieldSpec];

    /// Field whose header identifies the header row
    const PRIMARY_FIELD: &'static str;

    fn build(row: &DecodedRow, stamp: &ImportStamp) -> Self::Record;

    fn kind() -> ImportKind {
        <Self::Record as ImportRecord>::KIND
    }

    fn field(name: &str) -> Option<&'static FieldSpec> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }
}

/// Separates the parts of a composite natural key. Cell text never carries
/// the unit-separator control character, so distinct parts cannot join to
/// the same key.
pub const KEY_SEPARATOR: &str = "\u{1f}";

pub fn composite_key(parts: &[&str]) -> String {
    parts.join(KEY_SEPARATOR)
}

/// Natural key as shown in review output
pub fn display_key(key: &str) -> String {
    key.replace(KEY_SEPARATOR, " / ")
}

/// Case and whitespace folding used by the application-keyed schemas
pub fn fold_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_key() {
        assert_eq!(fold_key("  Office   365 "), "office 365");
        assert_eq!(fold_key("SAP\tGUI"), "sap gui");
    }

    #[test]
    fn test_composite_key_display() {
        let key = composite_key(&["a|b", "c"]);
        assert_eq!(key, "a|b\u{1f}c");
        assert_eq!(display_key(&key), "a|b / c");
        assert_eq!(display_key("office 365"), "office 365");
    }

    #[test]
    fn test_import_set_from_timestamp() {
        let at = DateTime::parse_from_rfc3339("2024-03-05T14:07:09Z")
            .unwrap()
            .with_timezone(&Utc);
        let stamp = ImportStamp::at(at);
        assert_eq!(stamp.import_set, "IMP-20240305-140709");
        assert_eq!(stamp.imported_at, at);
    }

    #[test]
    fn test_field_builders() {
        const FIELD: FieldSpec = FieldSpec::strict_date("test_date", "test date", &["testdate"])
            .required("test date is required")
            .known(&["x"]);
        assert_eq!(FIELD.kind, FieldKind::StrictDate);
        assert_eq!(FIELD.required, Some("test date is required"));
        assert_eq!(FIELD.known_values, &["x"]);
    }
}

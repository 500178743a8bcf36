//! Field annotation grammar shared by runtime derivation and source scanning.
//!
//! # Responsibility
//! - Parse `column-name[,attr=value,...]` annotation strings.
//!
//! # Invariants
//! - A column part of `-` means "not a column" and parses to an empty column.
//! - Attributes without `=` are kept with an empty value.

use std::collections::BTreeMap;

/// Column placeholder that excludes a field from mapping.
pub const NOT_A_COLUMN: &str = "-";
/// Attribute naming the parent table of a composed field.
pub const TABLE_ATTR: &str = "table";

/// Parsed form of one `#[db = "..."]` annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Mapped column name, empty when the field is not a column.
    pub column: String,
    /// Attributes following the column part.
    pub attrs: BTreeMap<String, String>,
}

impl Annotation {
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split(',');
        let column = parts.next().map(str::trim).unwrap_or_default();
        let column = if column == NOT_A_COLUMN { "" } else { column };

        let mut attrs = BTreeMap::new();
        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.split_once('=') {
                Some((key, value)) => {
                    attrs.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => {
                    attrs.insert(part.to_string(), String::new());
                }
            }
        }

        Self {
            column: column.to_string(),
            attrs,
        }
    }

    /// Returns whether the annotation maps its field to a column.
    pub fn is_column(&self) -> bool {
        !self.column.is_empty()
    }

    /// Returns the `table=` attribute, if declared.
    pub fn table(&self) -> Option<&str> {
        self.attrs.get(TABLE_ATTR).map(String::as_str)
    }
}

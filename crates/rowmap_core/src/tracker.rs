//! Change tracking contract for partial updates.
//!
//! # Responsibility
//! - Let a record report which columns of which table were set since load.
//! - Provide `ChangeSet`, the two-level table -> columns store used by
//!   generated tracking wrappers.
//!
//! # Invariants
//! - Change sets are kept per table so a wrapper spanning an inheritance
//!   chain reports each level independently.
//! - `columns_changed(None)` reports the record's own (most-derived) table.

use std::collections::{BTreeMap, BTreeSet};

/// Capability reporting mutated columns per table.
pub trait ChangeTracker {
    /// Returns the changed columns of `table`, or of the record's own table
    /// when `table` is `None`.
    fn columns_changed(&self, table: Option<&str>) -> Vec<String>;
}

/// Recorded column changes grouped by table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `column` of `table` was set.
    pub fn register_change(&mut self, table: &str, column: &str) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string());
    }

    /// Returns changed columns of `table`, sorted by name.
    pub fn columns_changed(&self, table: &str) -> Vec<String> {
        self.tables
            .get(table)
            .map(|columns| columns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_changed(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|columns| columns.contains(column))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Returns tables with at least one recorded change.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Forgets every recorded change, e.g. after a successful update.
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

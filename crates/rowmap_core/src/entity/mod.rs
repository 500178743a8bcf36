//! Record shape descriptors and field visitors.
//!
//! # Responsibility
//! - Describe a record's declared fields once per type (`Shape`).
//! - Give the engine type-erased read/write access to field values.
//!
//! # Invariants
//! - One static `Shape` exists per record type; its address is its identity.
//! - `field`/`field_mut` expose every composed field and every field whose
//!   annotation maps a non-empty column.
//!
//! # See also
//! - `#[derive(Entity)]` in `rowmap_derive`, which implements this contract.

use crate::tracker::ChangeTracker;
use rusqlite::types::{FromSql, FromSqlResult, ValueRef};
use rusqlite::ToSql;

pub mod annotation;

/// How a declared field participates in mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain field, mapped when it carries a column annotation.
    Column,
    /// Field declared with `#[extends]`: its record extends a parent table.
    Composed,
}

/// Static description of one declared field.
#[derive(Debug)]
pub struct FieldShape {
    pub name: &'static str,
    /// Raw `#[db = "..."]` annotation text.
    pub annotation: Option<&'static str>,
    pub kind: FieldKind,
}

/// Static description of one record type.
#[derive(Debug)]
pub struct Shape {
    pub name: &'static str,
    pub fields: &'static [FieldShape],
}

impl Shape {
    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub(crate) fn identity(&'static self) -> usize {
        self as *const Shape as usize
    }
}

/// Read access to one field value.
pub enum FieldRef<'a> {
    Column(&'a dyn ToSql),
    Composed(&'a dyn Entity),
}

/// Write access to one field value.
pub enum FieldMut<'a> {
    Column(&'a mut dyn ColumnSlot),
    Composed(&'a mut dyn Entity),
}

/// Destination for one scanned result column.
pub trait ColumnSlot {
    fn assign(&mut self, value: ValueRef<'_>) -> FromSqlResult<()>;
}

impl<T: FromSql> ColumnSlot for T {
    fn assign(&mut self, value: ValueRef<'_>) -> FromSqlResult<()> {
        *self = T::column_result(value)?;
        Ok(())
    }
}

/// A record whose fields map to the columns of one or more tables.
///
/// Implemented with `#[derive(Entity)]`. The trait is object safe so the
/// engine can walk composed records without knowing their concrete types.
pub trait Entity: 'static {
    /// Returns the cached shape descriptor of this record type.
    fn shape(&self) -> &'static Shape;

    fn field(&self, name: &str) -> Option<FieldRef<'_>>;

    fn field_mut(&mut self, name: &str) -> Option<FieldMut<'_>>;

    /// Returns an independent copy of this record.
    fn clone_entity(&self) -> Box<dyn Entity>;

    /// Returns the change-tracking capability when the record carries one.
    fn change_tracker(&self) -> Option<&dyn ChangeTracker> {
        None
    }
}

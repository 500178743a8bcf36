//! Relational entity mapping for SQLite.
//! Records derive `Entity`, and the `Accessor` turns them into single- or
//! multi-table CRUD statements following their inheritance chain.

extern crate self as rowmap_core;

pub mod accessor;
pub mod db;
pub mod entity;
pub mod logging;
pub mod query;
pub mod schema;
pub mod tracker;
pub mod value;

pub use accessor::tx::exec_tx;
pub use accessor::{Accessor, AccessorError, AccessorResult, NamedArgs, SqlResult, UpdatePolicy};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use entity::{ColumnSlot, Entity, FieldKind, FieldMut, FieldRef, FieldShape, Shape};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use query::{Equals, QueryError, QueryResult, Sqlizer, StatementBuilder};
pub use rowmap_derive::Entity;
pub use schema::{derive_schema, MappingSchema, SchemaError, SchemaResult};
pub use tracker::{ChangeSet, ChangeTracker};
pub use value::{column, columns, get_mapping, ColumnValues, DEFAULT_ID_FIELD};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

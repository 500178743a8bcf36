//! Table mapping schemas derived from record shapes.
//!
//! # Responsibility
//! - Derive a `MappingSchema` tree from a live record and a table name.
//! - Validate composed-field annotations with specific error conditions.
//! - Render the select/join fragments used by composite reads.
//!
//! # Invariants
//! - A composed field declares `table=<parent>` with an empty column part,
//!   and the parent table differs from the child's table.
//! - Only composed fields may declare `table=`.
//! - `schemas()`/`tables()` are ordered root-most base first, self last.
//! - Schemas are built fresh per call and never cached; only parsed shape
//!   layouts are cached.

use crate::entity::{Entity, FieldKind, FieldRef, Shape};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

mod layout;

pub(crate) use layout::layout_of;

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Shape-derivation failure, always fatal to the current derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptyTableName {
        type_name: String,
    },
    NotEntity {
        type_name: String,
    },
    EmbeddedColumnName {
        embedded: String,
        container: String,
    },
    EmbeddedSameTable {
        embedded: String,
        container: String,
    },
    EmbeddedMissingTable {
        embedded: String,
        container: String,
    },
    /// A `table=` mapping on a field that is not marked `#[extends]`.
    TableOnColumnField {
        field: String,
        container: String,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTableName { type_name } => {
                write!(f, "table name for type {type_name} should not be empty")
            }
            Self::NotEntity { type_name } => {
                write!(f, "type {type_name} should be in compliance with entity type")
            }
            Self::EmbeddedColumnName {
                embedded,
                container,
            } => write!(
                f,
                "embedded type {embedded} in type {container} should have empty column name"
            ),
            Self::EmbeddedSameTable {
                embedded,
                container,
            } => write!(
                f,
                "embedded type {embedded} in type {container} should not have the same table mapping"
            ),
            Self::EmbeddedMissingTable {
                embedded,
                container,
            } => write!(
                f,
                "embedded type {embedded} in type {container} should have table attribute"
            ),
            Self::TableOnColumnField { field, container } => write!(
                f,
                "field {field} in type {container} declares a table mapping without being embedded"
            ),
        }
    }
}

impl Error for SchemaError {}

/// Mapping of one table level in an inheritance chain.
pub struct MappingSchema {
    pub table_name: String,
    /// Field name -> column name, excluding fields of parent mappings.
    pub columns: Vec<(String, String)>,
    pub base_mappings: Vec<MappingSchema>,
    /// Copy of the record value this level was derived from.
    pub record: Box<dyn Entity>,
    pub shape: &'static Shape,
}

impl MappingSchema {
    /// Returns every level, root-most base first and `self` last.
    pub fn schemas(&self) -> Vec<&MappingSchema> {
        let mut schemas = Vec::new();
        for base in &self.base_mappings {
            schemas.extend(base.schemas());
        }
        schemas.push(self);
        schemas
    }

    /// Returns table names in `schemas()` order.
    pub fn tables(&self) -> Vec<&str> {
        self.schemas()
            .into_iter()
            .map(|schema| schema.table_name.as_str())
            .collect()
    }

    pub fn is_composite(&self) -> bool {
        !self.base_mappings.is_empty()
    }

    /// Returns whether `column` belongs to this level (not its parents).
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|(_, mapped)| mapped == column)
    }

    /// Renders `base.*, child.*, ...` over every level.
    pub fn column_select_string(&self) -> String {
        self.tables()
            .iter()
            .map(|table| format!("{table}.*"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders the join chain linking each level to the next by id columns,
    /// e.g. `child ON base.id=child.id JOIN grand_child ON child.id=grand_child.id`.
    pub fn table_join_string<S: AsRef<str>>(&self, id_columns: &[S]) -> String {
        let tables = self.tables();
        tables
            .windows(2)
            .map(|pair| {
                format!(
                    "{} ON {}",
                    pair[1],
                    join_on_string(pair[0], pair[1], id_columns)
                )
            })
            .collect::<Vec<_>>()
            .join(" JOIN ")
    }
}

impl Debug for MappingSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingSchema")
            .field("table_name", &self.table_name)
            .field("columns", &self.columns)
            .field("base_mappings", &self.base_mappings)
            .field("shape", &self.shape.name)
            .finish()
    }
}

fn join_on_string<S: AsRef<str>>(left: &str, right: &str, id_columns: &[S]) -> String {
    id_columns
        .iter()
        .map(|id| {
            let id = id.as_ref();
            format!("{left}.{id}={right}.{id}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Derives the mapping schema of `record` rooted at `table`.
///
/// # Errors
/// - `EmptyTableName` when `table` is blank.
/// - `NotEntity` when no annotated field is found, even after descending
///   into leading composed fields.
/// - `EmbeddedColumnName`, `EmbeddedSameTable`, `EmbeddedMissingTable` for
///   malformed composed-field annotations.
pub fn derive_schema(record: &dyn Entity, table: &str) -> SchemaResult<MappingSchema> {
    let type_name = record.shape().name;
    if table.trim().is_empty() {
        return Err(SchemaError::EmptyTableName {
            type_name: type_name.to_string(),
        });
    }

    let entity = resolve_entity(record).ok_or_else(|| SchemaError::NotEntity {
        type_name: type_name.to_string(),
    })?;
    let shape = entity.shape();
    let layout = layout_of(shape);

    let mut schema = MappingSchema {
        table_name: table.to_string(),
        columns: Vec::new(),
        base_mappings: Vec::new(),
        record: entity.clone_entity(),
        shape,
    };

    for field in &layout.fields {
        match field.kind {
            FieldKind::Column => {
                if field.annotation.as_ref().and_then(|a| a.table()).is_some() {
                    return Err(SchemaError::TableOnColumnField {
                        field: field.name.to_string(),
                        container: shape.name.to_string(),
                    });
                }
                if let Some(column) = field.column() {
                    schema
                        .columns
                        .push((field.name.to_string(), column.to_string()));
                }
            }
            FieldKind::Composed => {
                let Some(FieldRef::Composed(base)) = entity.field(field.name) else {
                    continue;
                };
                let embedded = base.shape().name.to_string();
                let container = shape.name.to_string();

                let Some(annotation) = field.annotation.as_ref() else {
                    return Err(SchemaError::EmbeddedMissingTable {
                        embedded,
                        container,
                    });
                };
                if annotation.is_column() {
                    return Err(SchemaError::EmbeddedColumnName {
                        embedded,
                        container,
                    });
                }
                match annotation.table() {
                    None => {
                        return Err(SchemaError::EmbeddedMissingTable {
                            embedded,
                            container,
                        })
                    }
                    Some(base_table) if base_table == table => {
                        return Err(SchemaError::EmbeddedSameTable {
                            embedded,
                            container,
                        })
                    }
                    Some(base_table) => {
                        schema.base_mappings.push(derive_schema(base, base_table)?);
                    }
                }
            }
        }
    }

    Ok(schema)
}

/// Finds the record level where annotated fields begin.
///
/// A record with no directly annotated plain field is a transparent wrapper;
/// resolution descends into its first field when that field is composed.
pub(crate) fn resolve_entity(record: &dyn Entity) -> Option<&dyn Entity> {
    let layout = layout_of(record.shape());
    if layout.has_direct_annotation() {
        return Some(record);
    }

    let first = layout.fields.first()?;
    if first.kind != FieldKind::Composed {
        return None;
    }
    match record.field(first.name)? {
        FieldRef::Composed(inner) => resolve_entity(inner),
        FieldRef::Column(_) => None,
    }
}

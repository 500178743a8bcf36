//! Column value extraction and row assignment.
//!
//! # Responsibility
//! - Resolve field names to mapped columns (`column`, `columns`).
//! - Produce column -> driver value maps for statements (`get_mapping`).
//! - Copy result rows back into records, ignoring unmatched columns.
//!
//! # Invariants
//! - Values are produced through `ToSql`; `None` and the `<nil>` sentinel
//!   both become SQL `NULL`.
//! - Own fields are visited before composed fields; a column already seen is
//!   stored again only under its dotted `<field-path>.<column>` name.

use crate::accessor::{AccessorError, AccessorResult};
use crate::entity::{Entity, FieldKind, FieldMut, FieldRef};
use crate::schema::layout_of;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Row, ToSql};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Field conventionally holding the primary identifier.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Text produced by custom value conversions to request `NULL`.
const NIL_SENTINEL: &str = "<nil>";

/// Ordered column -> value map of one record.
pub type ColumnValues = BTreeMap<String, Value>;

/// Returns the column mapped by `field_name`, searching own fields first and
/// then composed fields.
///
/// An own field with a matching name but no column mapping ends the search.
pub fn column(record: &dyn Entity, field_name: &str) -> Option<String> {
    let layout = layout_of(record.shape());

    if let Some(field) = layout.fields.iter().find(|field| field.name == field_name) {
        return field.column().map(str::to_string);
    }

    for field in layout.composed() {
        if let Some(FieldRef::Composed(inner)) = record.field(field.name) {
            if let Some(column) = column(inner, field_name) {
                return Some(column);
            }
        }
    }

    None
}

/// Returns every mapped column in declaration order, composed fields
/// flattened in place, without duplicates.
pub fn columns(record: &dyn Entity) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    collect_columns(record, &mut names);
    names.retain(|name| seen.insert(name.clone()));
    names
}

fn collect_columns(record: &dyn Entity, names: &mut Vec<String>) {
    let layout = layout_of(record.shape());
    for field in &layout.fields {
        match field.kind {
            FieldKind::Column => {
                if let Some(column) = field.column() {
                    names.push(column.to_string());
                }
            }
            FieldKind::Composed => {
                if let Some(FieldRef::Composed(inner)) = record.field(field.name) {
                    collect_columns(inner, names);
                }
            }
        }
    }
}

/// Resolves identifying columns and extracts every column value of `record`.
///
/// # Errors
/// - `MissingIdColumns` when any of `id_fields` has no column mapping.
/// - `Sqlite` when a field value cannot be converted.
pub fn get_mapping(
    record: &dyn Entity,
    id_fields: &[&str],
) -> AccessorResult<(Vec<String>, ColumnValues)> {
    let id_columns = id_fields
        .iter()
        .filter_map(|field| column(record, field))
        .collect::<Vec<_>>();
    if id_columns.len() != id_fields.len() {
        return Err(AccessorError::MissingIdColumns);
    }

    Ok((id_columns, field_map(record)?))
}

/// Extracts column values breadth-first through composed fields.
pub fn field_map(record: &dyn Entity) -> rusqlite::Result<ColumnValues> {
    let mut values = ColumnValues::new();
    let mut pending: VecDeque<(String, &dyn Entity)> = VecDeque::new();
    pending.push_back((String::new(), record));

    while let Some((path, current)) = pending.pop_front() {
        let layout = layout_of(current.shape());
        for field in &layout.fields {
            match field.kind {
                FieldKind::Column => {
                    let Some(column) = field.column() else {
                        continue;
                    };
                    let Some(FieldRef::Column(value)) = current.field(field.name) else {
                        continue;
                    };
                    let key = if values.contains_key(column) {
                        qualify(&path, column)
                    } else {
                        column.to_string()
                    };
                    let value = driver_value(value)?;
                    values.entry(key).or_insert(value);
                }
                FieldKind::Composed => {
                    if let Some(FieldRef::Composed(inner)) = current.field(field.name) {
                        pending.push_back((qualify(&path, field.name), inner));
                    }
                }
            }
        }
    }

    Ok(values)
}

/// Drops dotted (conflicting) column names before single-table statements.
pub fn remove_nested_cols(values: ColumnValues) -> ColumnValues {
    values
        .into_iter()
        .filter(|(column, _)| !column.contains('.'))
        .collect()
}

/// Converts one field value into the value bound to a statement.
pub fn driver_value(value: &dyn ToSql) -> rusqlite::Result<Value> {
    let value = match value.to_sql()? {
        ToSqlOutput::Borrowed(borrowed) => Value::from(borrowed),
        ToSqlOutput::Owned(owned) => owned,
        _ => {
            return Err(rusqlite::Error::ToSqlConversionFailure(
                "unsupported driver value output".into(),
            ))
        }
    };

    Ok(match value {
        Value::Text(text) if text == NIL_SENTINEL => Value::Null,
        other => other,
    })
}

/// Returns whether `value` is the zero value of its storage class.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Integer(number) => *number == 0,
        Value::Real(number) => *number == 0.0,
        Value::Text(text) => text.is_empty(),
        Value::Blob(bytes) => bytes.is_empty(),
    }
}

/// Copies every result column whose name matches a mapped column into
/// `record`. Unmatched columns are ignored.
pub fn assign_row(
    record: &mut dyn Entity,
    column_names: &[String],
    row: &Row<'_>,
) -> rusqlite::Result<()> {
    for (index, name) in column_names.iter().enumerate() {
        let value = row.get_ref(index)?;
        assign_column(record, index, name, value)?;
    }
    Ok(())
}

fn assign_column(
    record: &mut dyn Entity,
    index: usize,
    column: &str,
    value: ValueRef<'_>,
) -> rusqlite::Result<()> {
    let layout = layout_of(record.shape());
    for field in &layout.fields {
        match field.kind {
            FieldKind::Column => {
                if field.column() != Some(column) {
                    continue;
                }
                if let Some(FieldMut::Column(slot)) = record.field_mut(field.name) {
                    slot.assign(value).map_err(|err| {
                        rusqlite::Error::FromSqlConversionFailure(
                            index,
                            value.data_type(),
                            Box::new(err),
                        )
                    })?;
                }
            }
            FieldKind::Composed => {
                if let Some(FieldMut::Composed(inner)) = record.field_mut(field.name) {
                    assign_column(inner, index, column, value)?;
                }
            }
        }
    }
    Ok(())
}

fn qualify(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

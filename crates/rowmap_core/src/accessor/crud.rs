//! Composite CRUD along an entity's inheritance chain.
//!
//! # Responsibility
//! - Create: insert root level first, propagate the generated id downwards.
//! - Read: single select joining every level on the id columns.
//! - Update: one statement per level, filtered by change tracking.
//! - Delete: most-derived level first, down to the root.
//!
//! # Invariants
//! - Empty `id_fields` means the conventional `id` field.
//! - Intermediate levels run against independent copies; only the
//!   caller's record receives returned or read values.
//! - Multi-level operations are atomic only inside `exec_tx`.

use super::{Accessor, AccessorError, AccessorResult, SqlResult, UpdatePolicy};
use crate::entity::Entity;
use crate::query::Equals;
use crate::schema::{derive_schema, MappingSchema};
use crate::tracker::ChangeTracker;
use crate::value::{
    field_map, get_mapping, is_zero, remove_nested_cols, ColumnValues, DEFAULT_ID_FIELD,
};
use log::debug;
use rusqlite::types::Value;

impl<'conn> Accessor<'conn> {
    /// Inserts `entity` into `table` and every parent table it extends.
    ///
    /// Id columns are inserted only when non-zero; otherwise the database
    /// assigns them. Returned row values are written back into `entity`.
    ///
    /// With empty `id_fields` the `id` field is used when mapped; when it is
    /// not, the insert proceeds without id handling.
    pub fn create(
        &self,
        entity: &mut dyn Entity,
        table: &str,
        id_fields: &[&str],
    ) -> AccessorResult<()> {
        let schema = derive_schema(entity, table)?;
        debug!(
            "event=entity_create module=accessor status=start table={table} levels={}",
            schema.schemas().len()
        );

        if !schema.is_composite() {
            return self.create_level(entity, &schema, None, id_fields);
        }

        let levels = schema.schemas();
        let last = levels.len() - 1;
        let mut base_values: Option<ColumnValues> = None;
        for (index, level) in levels.iter().enumerate() {
            if index < last {
                let mut copy = level.record.clone_entity();
                self.create_level(copy.as_mut(), level, base_values.as_ref(), id_fields)?;
                if index == 0 {
                    // root row now carries database-assigned ids
                    base_values = Some(remove_nested_cols(field_map(copy.as_ref())?));
                }
            } else {
                self.create_level(entity, level, base_values.as_ref(), id_fields)?;
            }
        }
        Ok(())
    }

    fn create_level(
        &self,
        target: &mut dyn Entity,
        level: &MappingSchema,
        base_values: Option<&ColumnValues>,
        id_fields: &[&str],
    ) -> AccessorResult<()> {
        let (id_columns, values) = if id_fields.is_empty() {
            match get_mapping(target, &[DEFAULT_ID_FIELD]) {
                Err(AccessorError::MissingIdColumns) => get_mapping(target, &[])?,
                other => other?,
            }
        } else {
            get_mapping(target, id_fields)?
        };
        let values = remove_nested_cols(values);
        let base_values = base_values.unwrap_or(&values);

        let mut columns = Vec::new();
        let mut args = Vec::new();
        for (column, value) in base_values {
            if id_columns.contains(column) && !is_zero(value) {
                columns.push(column.clone());
                args.push(value.clone());
            }
        }
        for (column, value) in &values {
            if !id_columns.contains(column) && level.has_column(column) {
                columns.push(column.clone());
                args.push(value.clone());
            }
        }

        self.sqlizer_get(target, |builder| {
            builder
                .insert(&level.table_name)
                .columns(columns)
                .values(args)
                .suffix("RETURNING *")
        })
    }

    /// Loads `entity` by its id values, joining every inherited table.
    ///
    /// # Errors
    /// - `MissingIdColumns` when an id field has no column mapping.
    /// - `NotFound` when no row matches.
    pub fn read(
        &self,
        entity: &mut dyn Entity,
        table: &str,
        id_fields: &[&str],
    ) -> AccessorResult<()> {
        let id_fields = id_fields_or_default(id_fields);
        let schema = derive_schema(entity, table)?;
        let (id_columns, values) = get_mapping(entity, id_fields)?;
        let values = remove_nested_cols(values);

        if !schema.is_composite() {
            let predicate = id_predicate(&id_columns, &values, None);
            return self.sqlizer_get(entity, |builder| {
                builder.select(["*"]).from(table).where_eq(predicate)
            });
        }

        let tables = schema.tables();
        let root = tables[0];
        let predicate = id_predicate(&id_columns, &values, Some(root));
        let join = schema.table_join_string(id_columns.as_slice());
        self.sqlizer_get(entity, |builder| {
            builder
                .select([schema.column_select_string()])
                .from(root)
                .join(&join)
                .where_eq(predicate)
        })
    }

    /// Updates every level of `entity`, base to derived.
    ///
    /// Levels are skipped per the accessor's `UpdatePolicy`. A tracked level
    /// sets exactly its changed columns; an untracked level sets every
    /// non-id column it owns. Every level is matched on the root level's id
    /// values.
    ///
    /// Returns the result of the most-derived level, or `SqlResult::noop()`
    /// when that level issued no statement.
    pub fn update(
        &self,
        entity: &dyn Entity,
        table: &str,
        id_fields: &[&str],
    ) -> AccessorResult<SqlResult> {
        let id_fields = id_fields_or_default(id_fields);
        let schema = derive_schema(entity, table)?;
        let tracker = entity.change_tracker();
        let levels = schema.schemas();
        let last = levels.len() - 1;

        let (id_columns, root_values) = get_mapping(levels[0].record.as_ref(), id_fields)?;
        let root_values = remove_nested_cols(root_values);

        let mut result = SqlResult::noop();
        for (index, level) in levels.iter().enumerate() {
            if self.skips_level(tracker, &level.table_name) {
                debug!(
                    "event=entity_update module=accessor status=skipped table={}",
                    level.table_name
                );
                continue;
            }

            let (_, values) = get_mapping(level.record.as_ref(), id_fields)?;
            let values = remove_nested_cols(values);
            let changed =
                tracker.map(|tracker| tracker.columns_changed(Some(level.table_name.as_str())));
            let outcome = self.update_level(
                level,
                &id_columns,
                &root_values,
                &values,
                changed.as_deref(),
            )?;
            if index == last {
                result = outcome;
            }
        }
        Ok(result)
    }

    fn skips_level(&self, tracker: Option<&dyn ChangeTracker>, table: &str) -> bool {
        match (tracker, self.update_policy) {
            (Some(tracker), _) => tracker.columns_changed(Some(table)).is_empty(),
            (None, UpdatePolicy::SkipTrackedUnchanged) => false,
            (None, UpdatePolicy::SkipUnlessTracked) => true,
        }
    }

    fn update_level(
        &self,
        level: &MappingSchema,
        id_columns: &[String],
        root_values: &ColumnValues,
        values: &ColumnValues,
        changed: Option<&[String]>,
    ) -> AccessorResult<SqlResult> {
        let predicate = id_predicate(id_columns, root_values, None);
        let sets = values
            .iter()
            .filter(|(column, _)| !id_columns.contains(column) && level.has_column(column))
            .filter(|(column, _)| changed.map_or(true, |changed| changed.contains(column)))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect::<Vec<(String, Value)>>();

        self.sqlizer_exec(|builder| {
            sets.into_iter()
                .fold(builder.update(&level.table_name), |update, (column, value)| {
                    update.set(column, value)
                })
                .where_eq(predicate)
        })
    }

    /// Deletes every level of `entity`, most-derived table first.
    ///
    /// Returns the result of the final (root) statement.
    pub fn delete(
        &self,
        entity: &dyn Entity,
        table: &str,
        id_fields: &[&str],
    ) -> AccessorResult<SqlResult> {
        let id_fields = id_fields_or_default(id_fields);
        let schema = derive_schema(entity, table)?;

        let mut result = SqlResult::noop();
        for level in schema.schemas().into_iter().rev() {
            let (id_columns, values) = get_mapping(level.record.as_ref(), id_fields)?;
            let predicate = id_predicate(&id_columns, &remove_nested_cols(values), None);
            result = self.sqlizer_exec(|builder| {
                builder.delete(&level.table_name).where_eq(predicate)
            })?;
        }
        Ok(result)
    }

    /// Reads `entity` back (ignoring failures) and then deletes it, so the
    /// caller keeps the values of the removed rows.
    pub fn read_and_delete(
        &self,
        entity: &mut dyn Entity,
        table: &str,
        id_fields: &[&str],
    ) -> AccessorResult<SqlResult> {
        if let Err(err) = self.read(entity, table, id_fields) {
            debug!(
                "event=entity_read_before_delete module=accessor status=skipped table={table} error={err}"
            );
        }
        self.delete(entity, table, id_fields)
    }
}

fn id_fields_or_default<'a>(id_fields: &'a [&'a str]) -> &'a [&'a str] {
    if id_fields.is_empty() {
        &[DEFAULT_ID_FIELD]
    } else {
        id_fields
    }
}

fn id_predicate(id_columns: &[String], values: &ColumnValues, qualifier: Option<&str>) -> Equals {
    let mut predicate = Equals::new();
    for column in id_columns {
        if let Some(value) = values.get(column) {
            let key = match qualifier {
                Some(table) => format!("{table}.{column}"),
                None => column.clone(),
            };
            predicate.insert(key, value.clone());
        }
    }
    predicate
}

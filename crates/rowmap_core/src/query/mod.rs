//! Minimal SQL statement builder for generated CRUD statements.
//!
//! # Responsibility
//! - Render INSERT/SELECT/UPDATE/DELETE statements with positional `?`
//!   placeholders and their ordered argument lists.
//! - Reject malformed table and column identifiers at build time.
//!
//! # Invariants
//! - Arguments are returned in placeholder order.
//! - Raw select-column and join fragments are passed through untouched.
//! - `Equals` renders its columns sorted by name, so output is stable.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid identifier regex")
});

pub type QueryResult<T> = Result<T, QueryError>;

/// Statement build failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidIdentifier(String),
    MissingSetClause,
    MissingTable,
    ValueCountMismatch { columns: usize, values: usize },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(name) => write!(f, "invalid sql identifier `{name}`"),
            Self::MissingSetClause => {
                write!(f, "update statements must have at least one Set clause")
            }
            Self::MissingTable => write!(f, "statement has no table"),
            Self::ValueCountMismatch { columns, values } => write!(
                f,
                "insert has {columns} columns but {values} values"
            ),
        }
    }
}

impl Error for QueryError {}

/// Anything that renders to SQL plus positional arguments.
pub trait Sqlizer {
    fn to_sql(&self) -> QueryResult<(String, Vec<Value>)>;
}

/// Entry point for building statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementBuilder;

impl StatementBuilder {
    pub fn insert(&self, table: &str) -> InsertBuilder {
        InsertBuilder {
            table: table.to_string(),
            ..InsertBuilder::default()
        }
    }

    pub fn select<I, S>(&self, columns: I) -> SelectBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SelectBuilder {
            columns: columns.into_iter().map(Into::into).collect(),
            ..SelectBuilder::default()
        }
    }

    pub fn update(&self, table: &str) -> UpdateBuilder {
        UpdateBuilder {
            table: table.to_string(),
            ..UpdateBuilder::default()
        }
    }

    pub fn delete(&self, table: &str) -> DeleteBuilder {
        DeleteBuilder {
            table: table.to_string(),
            ..DeleteBuilder::default()
        }
    }
}

/// Column equality predicate: `a = ? AND b IS NULL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Equals(BTreeMap<String, Value>);

impl Equals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for Equals {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self(values)
    }
}

impl Sqlizer for Equals {
    fn to_sql(&self) -> QueryResult<(String, Vec<Value>)> {
        let mut parts = Vec::with_capacity(self.0.len());
        let mut args = Vec::new();
        for (column, value) in &self.0 {
            check_identifier(column)?;
            if *value == Value::Null {
                parts.push(format!("{column} IS NULL"));
            } else {
                parts.push(format!("{column} = ?"));
                args.push(value.clone());
            }
        }
        Ok((parts.join(" AND "), args))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
    suffix: Option<String>,
}

impl InsertBuilder {
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.values.extend(values);
        self
    }

    /// Adds every column/value pair of `values`.
    pub fn set_map(mut self, values: BTreeMap<String, Value>) -> Self {
        for (column, value) in values {
            self.columns.push(column);
            self.values.push(value);
        }
        self
    }

    pub fn suffix(mut self, suffix: &str) -> Self {
        self.suffix = Some(suffix.to_string());
        self
    }
}

impl Sqlizer for InsertBuilder {
    fn to_sql(&self) -> QueryResult<(String, Vec<Value>)> {
        check_table(&self.table)?;
        if self.columns.len() != self.values.len() {
            return Err(QueryError::ValueCountMismatch {
                columns: self.columns.len(),
                values: self.values.len(),
            });
        }

        let mut sql = format!("INSERT INTO {}", self.table);
        if self.columns.is_empty() {
            sql.push_str(" DEFAULT VALUES");
        } else {
            for column in &self.columns {
                check_identifier(column)?;
            }
            let placeholders = vec!["?"; self.columns.len()].join(",");
            sql.push_str(&format!(
                " ({}) VALUES ({placeholders})",
                self.columns.join(",")
            ));
        }
        if let Some(suffix) = &self.suffix {
            sql.push(' ');
            sql.push_str(suffix);
        }

        Ok((sql, self.values.clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    columns: Vec<String>,
    from: Option<String>,
    joins: Vec<String>,
    wheres: Vec<Equals>,
}

impl SelectBuilder {
    pub fn from(mut self, table: &str) -> Self {
        self.from = Some(table.to_string());
        self
    }

    /// Adds a raw `JOIN <fragment>` clause.
    pub fn join(mut self, fragment: &str) -> Self {
        self.joins.push(fragment.to_string());
        self
    }

    pub fn where_eq(mut self, predicate: impl Into<Equals>) -> Self {
        self.wheres.push(predicate.into());
        self
    }
}

impl Sqlizer for SelectBuilder {
    fn to_sql(&self) -> QueryResult<(String, Vec<Value>)> {
        let table = self.from.as_deref().ok_or(QueryError::MissingTable)?;
        check_table(table)?;

        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {table}");
        for join in &self.joins {
            sql.push_str(" JOIN ");
            sql.push_str(join);
        }
        let args = push_where(&mut sql, &self.wheres)?;
        Ok((sql, args))
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateBuilder {
    table: String,
    sets: Vec<(String, Value)>,
    wheres: Vec<Equals>,
}

impl UpdateBuilder {
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((column.into(), value.into()));
        self
    }

    pub fn where_eq(mut self, predicate: impl Into<Equals>) -> Self {
        self.wheres.push(predicate.into());
        self
    }
}

impl Sqlizer for UpdateBuilder {
    fn to_sql(&self) -> QueryResult<(String, Vec<Value>)> {
        check_table(&self.table)?;
        if self.sets.is_empty() {
            return Err(QueryError::MissingSetClause);
        }

        let mut assignments = Vec::with_capacity(self.sets.len());
        let mut args = Vec::with_capacity(self.sets.len());
        for (column, value) in &self.sets {
            check_identifier(column)?;
            assignments.push(format!("{column} = ?"));
            args.push(value.clone());
        }

        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        args.extend(push_where(&mut sql, &self.wheres)?);
        Ok((sql, args))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteBuilder {
    table: String,
    wheres: Vec<Equals>,
}

impl DeleteBuilder {
    pub fn where_eq(mut self, predicate: impl Into<Equals>) -> Self {
        self.wheres.push(predicate.into());
        self
    }
}

impl Sqlizer for DeleteBuilder {
    fn to_sql(&self) -> QueryResult<(String, Vec<Value>)> {
        check_table(&self.table)?;
        let mut sql = format!("DELETE FROM {}", self.table);
        let args = push_where(&mut sql, &self.wheres)?;
        Ok((sql, args))
    }
}

fn push_where(sql: &mut String, wheres: &[Equals]) -> QueryResult<Vec<Value>> {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    for predicate in wheres.iter().filter(|predicate| !predicate.is_empty()) {
        let (clause, values) = predicate.to_sql()?;
        clauses.push(clause);
        args.extend(values);
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok(args)
}

fn check_table(table: &str) -> QueryResult<()> {
    if table.is_empty() {
        return Err(QueryError::MissingTable);
    }
    check_identifier(table)
}

fn check_identifier(name: &str) -> QueryResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Equals, QueryError, Sqlizer, StatementBuilder};
    use rusqlite::types::Value;

    #[test]
    fn insert_renders_columns_and_suffix() {
        let (sql, args) = StatementBuilder
            .insert("person")
            .columns(["first_name", "last_name"])
            .values([Value::from("Ada".to_string()), Value::from("Lovelace".to_string())])
            .suffix("RETURNING *")
            .to_sql()
            .unwrap();

        assert_eq!(
            sql,
            "INSERT INTO person (first_name,last_name) VALUES (?,?) RETURNING *"
        );
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn insert_without_columns_uses_default_values() {
        let (sql, args) = StatementBuilder
            .insert("person")
            .suffix("RETURNING *")
            .to_sql()
            .unwrap();

        assert_eq!(sql, "INSERT INTO person DEFAULT VALUES RETURNING *");
        assert!(args.is_empty());
    }

    #[test]
    fn select_with_join_and_where() {
        let (sql, args) = StatementBuilder
            .select(["person.*", "employee.*"])
            .from("person")
            .join("employee ON person.id=employee.id")
            .where_eq(Equals::new().with("person.id", 7_i64))
            .to_sql()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT person.*, employee.* FROM person JOIN employee ON person.id=employee.id WHERE person.id = ?"
        );
        assert_eq!(args, vec![Value::Integer(7)]);
    }

    #[test]
    fn equals_renders_null_as_is_null() {
        let (sql, args) = Equals::new()
            .with("id", 1_i64)
            .with("email", Value::Null)
            .to_sql()
            .unwrap();

        assert_eq!(sql, "email IS NULL AND id = ?");
        assert_eq!(args, vec![Value::Integer(1)]);
    }

    #[test]
    fn update_requires_set_clause() {
        let err = StatementBuilder
            .update("person")
            .where_eq(Equals::new().with("id", 1_i64))
            .to_sql()
            .unwrap_err();

        assert_eq!(err, QueryError::MissingSetClause);
        assert_eq!(
            err.to_string(),
            "update statements must have at least one Set clause"
        );
    }

    #[test]
    fn update_orders_set_args_before_where_args() {
        let (sql, args) = StatementBuilder
            .update("person")
            .set("email", "a@b.c".to_string())
            .where_eq(Equals::new().with("id", 3_i64))
            .to_sql()
            .unwrap();

        assert_eq!(sql, "UPDATE person SET email = ? WHERE id = ?");
        assert_eq!(
            args,
            vec![Value::Text("a@b.c".to_string()), Value::Integer(3)]
        );
    }

    #[test]
    fn invalid_identifiers_are_rejected() {
        let err = StatementBuilder
            .delete("person; DROP TABLE person")
            .to_sql()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier(_)));

        let err = StatementBuilder.select(["*"]).to_sql().unwrap_err();
        assert_eq!(err, QueryError::MissingTable);
    }
}

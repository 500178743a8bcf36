//! Entity accessor: ad-hoc queries and composite CRUD over SQLite.
//!
//! # Responsibility
//! - Scan query results into entities by column name.
//! - Offer positional, named and builder-based query entry points.
//! - Orchestrate multi-table CRUD along an entity's inheritance chain
//!   (see `crud`).
//!
//! # Invariants
//! - The accessor holds no state besides its connection borrow and update
//!   policy; every call derives its schema afresh.
//! - Unmatched result columns are ignored while scanning.
//! - `QueryReturnedNoRows` is reported as `AccessorError::NotFound`.
//!
//! # See also
//! - `tx::exec_tx` for running composite operations atomically.

use crate::entity::Entity;
use crate::query::{QueryError, Sqlizer, StatementBuilder};
use crate::schema::SchemaError;
use crate::value::{assign_row, field_map, remove_nested_cols};
use log::{debug, warn};
use rusqlite::types::{FromSql, Value};
use rusqlite::{params_from_iter, Connection, Params, Statement, ToSql};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod crud;
pub mod tx;

pub type AccessorResult<T> = Result<T, AccessorError>;

/// Accessor failure.
#[derive(Debug)]
pub enum AccessorError {
    Schema(SchemaError),
    Query(QueryError),
    /// A requested id field has no column mapping.
    MissingIdColumns,
    /// A single-row read matched nothing.
    NotFound,
    Sqlite(rusqlite::Error),
    /// The transaction body panicked; the transaction was rolled back.
    TxPanicked(String),
}

impl Display for AccessorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::MissingIdColumns => write!(f, "missing ID columns"),
            Self::NotFound => write!(f, "no rows in result set"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::TxPanicked(message) => {
                write!(f, "panic error in executing transaction: {message}")
            }
        }
    }
}

impl Error for AccessorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Query(err) => Some(err),
            Self::Sqlite(err) => Some(err),
            Self::MissingIdColumns | Self::NotFound | Self::TxPanicked(_) => None,
        }
    }
}

impl From<SchemaError> for AccessorError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<QueryError> for AccessorError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<rusqlite::Error> for AccessorError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            other => Self::Sqlite(other),
        }
    }
}

/// Outcome of a data-modifying statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlResult {
    pub rows_affected: usize,
    pub last_insert_id: i64,
}

impl SqlResult {
    /// Result reported when no statement had to be issued.
    pub fn noop() -> Self {
        Self::default()
    }
}

/// Decides which levels of an update are skipped when nothing is tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Skip a level only when the record tracks changes and reports none
    /// for that level's table. Untracked records are updated in full.
    #[default]
    SkipTrackedUnchanged,
    /// Skip a level whenever no change is reported for its table, including
    /// when the record tracks nothing at all.
    SkipUnlessTracked,
}

/// Named statement arguments keyed by placeholder name (without `:`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArgs {
    values: Vec<(String, Value)>,
}

impl NamedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// Builds arguments from every mapped column of `example`, for
    /// query-by-example.
    pub fn from_entity(example: &dyn Entity) -> rusqlite::Result<Self> {
        let values = remove_nested_cols(field_map(example)?)
            .into_iter()
            .collect();
        Ok(Self { values })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the arguments whose `:name` placeholder occurs in `stmt`.
    fn bind<'a>(&'a self, stmt: &Statement<'_>) -> rusqlite::Result<Vec<(String, &'a dyn ToSql)>> {
        let mut bound = Vec::new();
        for (name, value) in &self.values {
            let placeholder = format!(":{name}");
            if stmt.parameter_index(&placeholder)?.is_some() {
                bound.push((placeholder, value as &dyn ToSql));
            }
        }
        Ok(bound)
    }
}

/// Entity accessor bound to one connection or transaction.
///
/// `Transaction` derefs to `Connection`, so `Accessor::new(&tx)` runs every
/// statement inside that transaction.
pub struct Accessor<'conn> {
    conn: &'conn Connection,
    update_policy: UpdatePolicy,
}

impl<'conn> Accessor<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            update_policy: UpdatePolicy::default(),
        }
    }

    pub fn with_update_policy(mut self, update_policy: UpdatePolicy) -> Self {
        self.update_policy = update_policy;
        self
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        self.update_policy
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Reads the first result row into `dest`.
    ///
    /// Wildcard selection is fine: result columns without a mapped field are
    /// ignored.
    ///
    /// # Errors
    /// - `NotFound` when the query yields no rows.
    pub fn get<P: Params>(&self, dest: &mut dyn Entity, sql: &str, params: P) -> AccessorResult<()> {
        debug!("event=sql_get module=accessor status=start sql={sql}");
        let mut stmt = self.prepare(sql)?;
        scan_one(&mut stmt, params, dest)
    }

    /// Reads the first column of the first result row.
    pub fn get_value<T: FromSql, P: Params>(&self, sql: &str, params: P) -> AccessorResult<T> {
        debug!("event=sql_get_value module=accessor status=start sql={sql}");
        let mut stmt = self.prepare(sql)?;
        Ok(stmt.query_row(params, |row| row.get(0))?)
    }

    /// Reads every result row into a fresh `E`.
    pub fn select<E, P>(&self, sql: &str, params: P) -> AccessorResult<Vec<E>>
    where
        E: Entity + Default,
        P: Params,
    {
        debug!("event=sql_select module=accessor status=start sql={sql}");
        let mut stmt = self.prepare(sql)?;
        scan_all(&mut stmt, params)
    }

    pub fn exec<P: Params>(&self, sql: &str, params: P) -> AccessorResult<SqlResult> {
        debug!("event=sql_exec module=accessor status=start sql={sql}");
        let mut stmt = self.prepare(sql)?;
        let rows_affected = stmt.execute(params).map_err(|err| {
            warn!("event=sql_exec module=accessor status=error sql={sql} error={err}");
            err
        })?;
        Ok(SqlResult {
            rows_affected,
            last_insert_id: self.conn.last_insert_rowid(),
        })
    }

    /// Like `get`, binding `:name` placeholders from `args`.
    ///
    /// Arguments without a matching placeholder are skipped, so an example
    /// entity can carry more columns than the query uses.
    pub fn named_get(&self, dest: &mut dyn Entity, sql: &str, args: &NamedArgs) -> AccessorResult<()> {
        debug!("event=sql_named_get module=accessor status=start sql={sql}");
        let mut stmt = self.prepare(sql)?;
        let bound = args.bind(&stmt)?;
        scan_one(&mut stmt, named_params(&bound).as_slice(), dest)
    }

    pub fn named_select<E: Entity + Default>(&self, sql: &str, args: &NamedArgs) -> AccessorResult<Vec<E>> {
        debug!("event=sql_named_select module=accessor status=start sql={sql}");
        let mut stmt = self.prepare(sql)?;
        let bound = args.bind(&stmt)?;
        scan_all(&mut stmt, named_params(&bound).as_slice())
    }

    pub fn named_exec(&self, sql: &str, args: &NamedArgs) -> AccessorResult<SqlResult> {
        debug!("event=sql_named_exec module=accessor status=start sql={sql}");
        let mut stmt = self.prepare(sql)?;
        let bound = args.bind(&stmt)?;
        let rows_affected = stmt.execute(named_params(&bound).as_slice())?;
        Ok(SqlResult {
            rows_affected,
            last_insert_id: self.conn.last_insert_rowid(),
        })
    }

    /// Builds a statement with `build` and reads its first row into `dest`.
    pub fn sqlizer_get<F, Q>(&self, dest: &mut dyn Entity, build: F) -> AccessorResult<()>
    where
        F: FnOnce(StatementBuilder) -> Q,
        Q: Sqlizer,
    {
        let (sql, args) = build(StatementBuilder).to_sql()?;
        self.get(dest, &sql, params_from_iter(args))
    }

    pub fn sqlizer_select<E, F, Q>(&self, build: F) -> AccessorResult<Vec<E>>
    where
        E: Entity + Default,
        F: FnOnce(StatementBuilder) -> Q,
        Q: Sqlizer,
    {
        let (sql, args) = build(StatementBuilder).to_sql()?;
        self.select(&sql, params_from_iter(args))
    }

    pub fn sqlizer_exec<F, Q>(&self, build: F) -> AccessorResult<SqlResult>
    where
        F: FnOnce(StatementBuilder) -> Q,
        Q: Sqlizer,
    {
        let (sql, args) = build(StatementBuilder).to_sql()?;
        self.exec(&sql, params_from_iter(args))
    }

    fn prepare(&self, sql: &str) -> AccessorResult<Statement<'conn>> {
        self.conn.prepare(sql).map_err(|err| {
            warn!("event=sql_prepare module=accessor status=error sql={sql} error={err}");
            AccessorError::from(err)
        })
    }
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn scan_one<P: Params>(stmt: &mut Statement<'_>, params: P, dest: &mut dyn Entity) -> AccessorResult<()> {
    let names = column_names(stmt);
    let mut rows = stmt.query(params)?;
    let row = rows.next()?.ok_or(AccessorError::NotFound)?;
    assign_row(dest, &names, row)?;
    Ok(())
}

fn scan_all<E, P>(stmt: &mut Statement<'_>, params: P) -> AccessorResult<Vec<E>>
where
    E: Entity + Default,
    P: Params,
{
    let names = column_names(stmt);
    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = E::default();
        assign_row(&mut record, &names, row)?;
        records.push(record);
    }
    Ok(records)
}

fn named_params<'a>(bound: &'a [(String, &'a dyn ToSql)]) -> Vec<(&'a str, &'a dyn ToSql)> {
    bound
        .iter()
        .map(|(name, value)| (name.as_str(), *value))
        .collect()
}

//! Unified `Database` trait — the row-oriented persistence collaborator.
//!
//! Rows are JSON objects keyed by column name. Filters are conjunctions of
//! equality tests. Every call is per-statement except [`Database::apply`],
//! which runs a batch of writes as one transaction.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::DatabaseError;
use crate::store::schema::Table;

/// A single row, keyed by column name.
pub type Row = Map<String, Value>;

/// Equality filter: every clause must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(&'static str, Value)>,
}

impl Filter {
    /// Match every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match rows owned by `user_id`.
    pub fn user(user_id: &str) -> Self {
        Self::all().eq("user_id", user_id)
    }

    /// Builder: add an equality clause.
    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push((column, value.into()));
        self
    }

    pub fn clauses(&self) -> &[(&'static str, Value)] {
        &self.clauses
    }
}

/// A pending write against one table.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Append a row. A missing `id` is generated for id-keyed tables.
    Insert { table: Table, fields: Row },
    /// Insert, or on conflict over `key` update only the supplied fields.
    Upsert {
        table: Table,
        key: Vec<&'static str>,
        fields: Row,
    },
    /// Delete every row matching the filter.
    DeleteWhere { table: Table, filter: Filter },
}

impl Write {
    pub fn insert(table: Table, fields: Row) -> Self {
        Self::Insert { table, fields }
    }

    pub fn upsert(table: Table, key: &[&'static str], fields: Row) -> Self {
        Self::Upsert {
            table,
            key: key.to_vec(),
            fields,
        }
    }

    pub fn delete_where(table: Table, filter: Filter) -> Self {
        Self::DeleteWhere { table, filter }
    }

    /// The table this write targets.
    pub fn table(&self) -> Table {
        match self {
            Self::Insert { table, .. }
            | Self::Upsert { table, .. }
            | Self::DeleteWhere { table, .. } => *table,
        }
    }
}

/// Backend-agnostic persistence interface used by the wizard.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Fetch matching rows in insertion order.
    async fn get(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, DatabaseError>;

    /// Insert a row. Returns its `id`, or its `user_id` for user-keyed tables.
    async fn insert(&self, table: Table, fields: &Row) -> Result<String, DatabaseError>;

    /// Insert or merge a row keyed by the `key` columns.
    async fn upsert(&self, table: Table, key: &[&str], fields: &Row)
    -> Result<(), DatabaseError>;

    /// Delete matching rows. Returns the number removed.
    async fn delete_where(&self, table: Table, filter: &Filter) -> Result<u64, DatabaseError>;

    /// Count matching rows.
    async fn count(&self, table: Table, filter: &Filter) -> Result<i64, DatabaseError>;

    /// Apply a batch of writes all-or-nothing.
    async fn apply(&self, writes: &[Write]) -> Result<(), DatabaseError>;

    /// Whether any row matches.
    async fn exists(&self, table: Table, filter: &Filter) -> Result<bool, DatabaseError> {
        Ok(self.count(table, filter).await? > 0)
    }
}

/// Build a [`Row`] from `column => value` pairs.
#[macro_export]
macro_rules! row {
    ($($col:expr => $val:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::store::Row::new();
        $( map.insert(($col).to_string(), ::serde_json::json!($val)); )*
        map
    }};
}

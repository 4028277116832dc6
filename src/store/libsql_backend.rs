//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Every statement is built from
//! the table catalogue in [`crate::store::schema`]; values are always bound as
//! parameters.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::params::Params;
use libsql::{Connection, Database as LibSqlDatabase};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::schema::{Column, ColumnKind, Table};
use crate::store::traits::{Database, Filter, Row, Write};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations. Writes go
/// through `write_gate` so a single-statement write can never interleave with
/// an open batch transaction on the same connection.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_gate: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            write_gate: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn lookup_column(table: Table, name: &str) -> Result<&'static Column, DatabaseError> {
    table.column(name).ok_or_else(|| DatabaseError::UnknownColumn {
        table: table.name().to_string(),
        column: name.to_string(),
    })
}

/// Convert a JSON value into the libsql value stored for `column`.
fn to_sql_value(table: Table, column: &Column, value: &Value) -> Result<libsql::Value, DatabaseError> {
    use libsql::Value as Sql;

    let converted = match (column.kind, value) {
        // JSON columns keep a literal `null` so the value round-trips.
        (ColumnKind::Json, v) => Some(Sql::Text(v.to_string())),
        (_, Value::Null) => Some(Sql::Null),
        (ColumnKind::Bool, Value::Bool(b)) => Some(Sql::Integer(i64::from(*b))),
        (ColumnKind::Bool, Value::Number(n)) => n.as_i64().map(|i| Sql::Integer(i64::from(i != 0))),
        (ColumnKind::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(Sql::Integer),
        (ColumnKind::Integer, Value::Bool(b)) => Some(Sql::Integer(i64::from(*b))),
        (ColumnKind::Real, Value::Number(n)) => n.as_f64().map(Sql::Real),
        (ColumnKind::Text, Value::String(s)) => Some(Sql::Text(s.clone())),
        (ColumnKind::Text, Value::Number(n)) => Some(Sql::Text(n.to_string())),
        (ColumnKind::Text, Value::Bool(b)) => Some(Sql::Text(b.to_string())),
        _ => None,
    };

    converted.ok_or_else(|| {
        DatabaseError::Serialization(format!(
            "{table}.{}: cannot store {value} as {:?}",
            column.name, column.kind
        ))
    })
}

/// Convert a stored libsql value back to JSON according to the column kind.
fn from_sql_value(column: &Column, value: libsql::Value) -> Value {
    use libsql::Value as Sql;

    match (column.kind, value) {
        (_, Sql::Null) => Value::Null,
        (ColumnKind::Bool, Sql::Integer(i)) => Value::Bool(i != 0),
        (ColumnKind::Json, Sql::Text(s)) => {
            serde_json::from_str(&s).unwrap_or_else(|_| Value::String(s))
        }
        (_, Sql::Integer(i)) => Value::from(i),
        (_, Sql::Real(f)) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        (_, Sql::Text(s)) => Value::String(s),
        (_, Sql::Blob(b)) => Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Validate and convert the fields of a row into (columns, bound values).
fn bind_fields(
    table: Table,
    fields: &Row,
) -> Result<(Vec<&'static str>, Vec<libsql::Value>), DatabaseError> {
    let mut columns = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let column = lookup_column(table, name)?;
        columns.push(column.name);
        values.push(to_sql_value(table, column, value)?);
    }
    Ok((columns, values))
}

/// Render a WHERE clause with numbered placeholders and its bound values.
fn where_clause(
    table: Table,
    filter: &Filter,
) -> Result<(String, Vec<libsql::Value>), DatabaseError> {
    if filter.clauses().is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut parts = Vec::with_capacity(filter.clauses().len());
    let mut values = Vec::new();
    for (name, value) in filter.clauses() {
        let column = lookup_column(table, name)?;
        if value.is_null() {
            parts.push(format!("{} IS NULL", column.name));
        } else {
            values.push(to_sql_value(table, column, value)?);
            parts.push(format!("{} = ?{}", column.name, values.len()));
        }
    }
    Ok((format!(" WHERE {}", parts.join(" AND ")), values))
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn select_list(table: Table) -> String {
    table
        .columns()
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_error(op: &str, table: Table, e: libsql::Error) -> DatabaseError {
    let message = format!("{op} {table}: {e}");
    if message.to_ascii_lowercase().contains("constraint") {
        DatabaseError::Constraint(message)
    } else {
        DatabaseError::Query(message)
    }
}

fn row_to_json(table: Table, row: &libsql::Row) -> Result<Row, DatabaseError> {
    let mut out = Row::new();
    for (idx, column) in table.columns().iter().enumerate() {
        let value = row
            .get_value(idx as i32)
            .map_err(|e| DatabaseError::Query(format!("read {table}.{}: {e}", column.name)))?;
        out.insert(column.name.to_string(), from_sql_value(column, value));
    }
    Ok(out)
}

// ── Statement execution ─────────────────────────────────────────────
//
// Free functions over `&Connection` so the same code runs directly and
// inside a batch transaction.

async fn exec_insert(conn: &Connection, table: Table, fields: &Row) -> Result<String, DatabaseError> {
    let mut fields = fields.clone();
    let id = if table.has_id() {
        match fields.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                fields.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        }
    } else {
        fields
            .get("user_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let (columns, values) = bind_fields(table, &fields)?;
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders(columns.len())
    );
    conn.execute(&sql, Params::Positional(values))
        .await
        .map_err(|e| write_error("insert", table, e))?;

    debug!(table = %table, id = %id, "Row inserted");
    Ok(id)
}

async fn exec_upsert(
    conn: &Connection,
    table: Table,
    key: &[&str],
    fields: &Row,
) -> Result<(), DatabaseError> {
    if key.is_empty() {
        return Err(DatabaseError::Query(format!("upsert {table}: empty conflict key")));
    }
    for k in key {
        lookup_column(table, k)?;
        if fields.get(*k).is_none_or(Value::is_null) {
            return Err(DatabaseError::Constraint(format!(
                "upsert {table}: key column {k} has no value"
            )));
        }
    }

    let (columns, values) = bind_fields(table, fields)?;
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !key.contains(*c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({}) {on_conflict}",
        columns.join(", "),
        placeholders(columns.len()),
        key.join(", "),
    );
    conn.execute(&sql, Params::Positional(values))
        .await
        .map_err(|e| write_error("upsert", table, e))?;

    debug!(table = %table, fields = columns.len(), "Row upserted");
    Ok(())
}

async fn exec_delete(conn: &Connection, table: Table, filter: &Filter) -> Result<u64, DatabaseError> {
    let (clause, values) = where_clause(table, filter)?;
    let removed = conn
        .execute(&format!("DELETE FROM {table}{clause}"), Params::Positional(values))
        .await
        .map_err(|e| write_error("delete", table, e))?;

    debug!(table = %table, removed, "Rows deleted");
    Ok(removed)
}

async fn exec_write(conn: &Connection, write: &Write) -> Result<(), DatabaseError> {
    match write {
        Write::Insert { table, fields } => exec_insert(conn, *table, fields).await.map(|_| ()),
        Write::Upsert { table, key, fields } => exec_upsert(conn, *table, key, fields).await,
        Write::DeleteWhere { table, filter } => exec_delete(conn, *table, filter).await.map(|_| ()),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn get(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        let (clause, values) = where_clause(table, filter)?;
        let sql = format!("SELECT {} FROM {table}{clause} ORDER BY rowid", select_list(table));
        let mut rows = self
            .conn()
            .query(&sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("get {table}: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get {table} row: {e}")))?
        {
            out.push(row_to_json(table, &row)?);
        }
        Ok(out)
    }

    async fn insert(&self, table: Table, fields: &Row) -> Result<String, DatabaseError> {
        let _gate = self.write_gate.lock().await;
        exec_insert(self.conn(), table, fields).await
    }

    async fn upsert(
        &self,
        table: Table,
        key: &[&str],
        fields: &Row,
    ) -> Result<(), DatabaseError> {
        let _gate = self.write_gate.lock().await;
        exec_upsert(self.conn(), table, key, fields).await
    }

    async fn delete_where(&self, table: Table, filter: &Filter) -> Result<u64, DatabaseError> {
        let _gate = self.write_gate.lock().await;
        exec_delete(self.conn(), table, filter).await
    }

    async fn count(&self, table: Table, filter: &Filter) -> Result<i64, DatabaseError> {
        let (clause, values) = where_clause(table, filter)?;
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*) FROM {table}{clause}"),
                Params::Positional(values),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count {table}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("count {table}: {e}"))),
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count {table}: {e}"))),
        }
    }

    async fn apply(&self, writes: &[Write]) -> Result<(), DatabaseError> {
        if writes.is_empty() {
            return Ok(());
        }

        let _gate = self.write_gate.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("begin transaction: {e}")))?;

        for write in writes {
            let result = exec_write(&tx, write).await;
            if let Err(e) = result {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback failed after write error");
                }
                return Err(e);
            }
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit transaction: {e}")))?;
        debug!(writes = writes.len(), "Write batch committed");
        Ok(())
    }
}

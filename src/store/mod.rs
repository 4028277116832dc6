//! Persistence layer — libSQL-backed row store for drafts and domain tables.

pub mod libsql_backend;
pub mod migrations;
pub mod schema;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use schema::{Column, ColumnKind, Table};
pub use traits::{Database, Filter, Row, Write};

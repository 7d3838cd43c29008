//! Persistence Sink: derived tables into a relational store.
//!
//! Each table is written in its own transaction: created on first sight,
//! truncated, then bulk-inserted. A failure on one table rolls that table
//! back and leaves the others alone. Only failing to connect is fatal, and
//! only for persistence.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stockpulse_core::domain::{DerivedTable, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("unsupported connection string '{0}': expected sqlite://<path>, sqlite::memory: or a file path")]
    UnsupportedScheme(String),

    #[error("failed to open database {target}: {source}")]
    Open {
        target: String,
        source: rusqlite::Error,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create table {table}: {source}")]
    CreateTable {
        table: String,
        source: rusqlite::Error,
    },

    #[error("table {table} exists with columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("failed to write table {table}: {source}")]
    Write {
        table: String,
        source: rusqlite::Error,
    },

    #[error("query on {table} failed: {source}")]
    Query {
        table: String,
        source: rusqlite::Error,
    },

    #[error("cannot read artifact directory {path}: {source}")]
    Directory {
        path: String,
        source: std::io::Error,
    },
}

/// Where a connection string points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    File(PathBuf),
}

impl SqliteTarget {
    pub fn parse(connection_string: &str) -> Result<Self, ConnectionError> {
        let s = connection_string.trim();
        if s == "sqlite::memory:" || s == "sqlite://:memory:" {
            return Ok(Self::Memory);
        }
        if let Some(path) = s.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(ConnectionError::UnsupportedScheme(s.to_string()));
            }
            return Ok(Self::File(PathBuf::from(path)));
        }
        // Any other `scheme://` (mysql://, postgres://, ...) is not ours.
        if s.is_empty() || s.contains("://") {
            return Err(ConnectionError::UnsupportedScheme(s.to_string()));
        }
        Ok(Self::File(PathBuf::from(s)))
    }
}

/// Outcome of persisting one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistStatus {
    Written { rows: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistOutcome {
    pub table: String,
    #[serde(flatten)]
    pub status: PersistStatus,
}

/// A destination for derived tables.
pub trait TableSink {
    /// Replace the stored contents of `table`. Returns rows written.
    fn write_table(&mut self, table: &DerivedTable) -> Result<usize, PersistenceError>;

    /// Stored row count, `None` if the table does not exist.
    fn row_count(&self, table_name: &str) -> Result<Option<usize>, PersistenceError>;
}

/// Write every table, continuing past failures.
///
/// An empty table still replaces the stored one, leaving it with zero rows.
pub fn persist_all(sink: &mut dyn TableSink, tables: &[DerivedTable]) -> Vec<PersistOutcome> {
    tables
        .iter()
        .map(|table| {
            let name = table.sql_table_name();
            if table.is_empty() {
                log::warn!("{name} is empty, stored rows will be cleared");
            }
            let status = match sink.write_table(table) {
                Ok(rows) => {
                    log::info!("persisted {rows} row(s) into {name}");
                    PersistStatus::Written { rows }
                }
                Err(e) => {
                    log::error!("{e}");
                    PersistStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            PersistOutcome {
                table: name,
                status,
            }
        })
        .collect()
}

/// Persist every `*.csv` artifact in `dir`, independent of a pipeline run.
///
/// Table names come from file stems. Unreadable files are reported as failed
/// outcomes.
pub fn load_csv_dir(
    sink: &mut dyn TableSink,
    dir: &Path,
) -> Result<Vec<PersistOutcome>, PersistenceError> {
    let dir_err = |source| PersistenceError::Directory {
        path: dir.display().to_string(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(dir_err)? {
        let path = entry.map_err(dir_err)?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        log::warn!("no CSV artifacts found in {}", dir.display());
    }

    let mut tables = Vec::new();
    let mut unreadable = Vec::new();
    for path in files {
        match DerivedTable::read_csv(&path) {
            Ok(table) => tables.push(table),
            Err(e) => {
                log::error!("cannot read {}: {e}", path.display());
                let table = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                unreadable.push(PersistOutcome {
                    table,
                    status: PersistStatus::Failed {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }

    let mut outcomes = persist_all(sink, &tables);
    outcomes.extend(unreadable);
    Ok(outcomes)
}

/// SQLite-backed sink.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn connect(connection_string: &str) -> Result<Self, ConnectionError> {
        let target = SqliteTarget::parse(connection_string)?;
        let opened = match &target {
            SqliteTarget::Memory => Connection::open_in_memory(),
            SqliteTarget::File(path) => Connection::open(path),
        };
        let conn = opened.map_err(|source| ConnectionError::Open {
            target: connection_string.to_string(),
            source,
        })?;
        log::info!("connected to {target:?}");
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn existing_columns(&self, table: &str) -> Result<Option<Vec<String>>, PersistenceError> {
        let query_err = |source| PersistenceError::Query {
            table: table.to_string(),
            source,
        };
        let exists: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
            .map_err(query_err)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;
        Ok(Some(columns))
    }
}

impl TableSink for SqliteSink {
    fn write_table(&mut self, table: &DerivedTable) -> Result<usize, PersistenceError> {
        let name = table.sql_table_name();
        let columns = table.sql_column_names();

        match self.existing_columns(&name)? {
            Some(found) if found != columns => {
                return Err(PersistenceError::SchemaMismatch {
                    table: name,
                    expected: columns,
                    found,
                });
            }
            Some(_) => {}
            None => {
                let defs: Vec<String> = columns
                    .iter()
                    .zip(table.column_types())
                    .map(|(c, t)| format!("{} {}", quote_ident(c), t.sql_type()))
                    .collect();
                let sql = format!("CREATE TABLE {} ({})", quote_ident(&name), defs.join(", "));
                self.conn
                    .execute(&sql, [])
                    .map_err(|source| PersistenceError::CreateTable {
                        table: name.clone(),
                        source,
                    })?;
                log::info!("created table {name}");
            }
        }

        let write_err = |source| PersistenceError::Write {
            table: name.clone(),
            source,
        };
        let tx = self.conn.transaction().map_err(write_err)?;
        tx.execute(&format!("DELETE FROM {}", quote_ident(&name)), [])
            .map_err(write_err)?;
        {
            let placeholders = vec!["?"; columns.len()].join(", ");
            let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                quote_ident(&name),
                quoted.join(", ")
            );
            let mut stmt = tx.prepare(&sql).map_err(write_err)?;
            for row in table.rows() {
                stmt.execute(params_from_iter(row.into_iter().map(to_sql)))
                    .map_err(write_err)?;
            }
        }
        tx.commit().map_err(write_err)?;
        Ok(table.row_count())
    }

    fn row_count(&self, table_name: &str) -> Result<Option<usize>, PersistenceError> {
        if self.existing_columns(table_name)?.is_none() {
            return Ok(None);
        }
        let count: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(table_name)),
                [],
                |row| row.get(0),
            )
            .map_err(|source| PersistenceError::Query {
                table: table_name.to_string(),
                source,
            })?;
        Ok(Some(count as usize))
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

/// Double-quoted SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::errors::{Result, ShabakaError};

/// The embedded SQL schema applied when initializing a new database.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// SQLite database backing the word graph.
///
/// The connection sits behind a mutex so one `Database` can serve
/// concurrent searches from several threads.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Creates a new database at `db_path`, creating parent directories if needed.
    pub fn initialize(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ShabakaError::Store {
                message: format!("failed to create database directory: {e}"),
                operation: "initialize".to_string(),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| ShabakaError::Store {
            message: format!("failed to open database: {e}"),
            operation: "initialize".to_string(),
        })?;

        Self::prepare(conn, "initialize")
    }

    /// Opens an existing database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(ShabakaError::Store {
                message: format!("no database found at '{}'", db_path.display()),
                operation: "open".to_string(),
            });
        }

        let conn = Connection::open(db_path).map_err(|e| ShabakaError::Store {
            message: format!("failed to open database: {e}"),
            operation: "open".to_string(),
        })?;

        Self::prepare(conn, "open")
    }

    /// Opens a private in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| ShabakaError::Store {
            message: format!("failed to open in-memory database: {e}"),
            operation: "open_in_memory".to_string(),
        })?;

        Self::prepare(conn, "open_in_memory")
    }

    /// Locks and returns the underlying SQLite connection.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ShabakaError::Store {
            message: "database connection lock poisoned".to_string(),
            operation: "lock".to_string(),
        })
    }

    fn prepare(conn: Connection, operation: &str) -> Result<Self> {
        Self::apply_pragmas(&conn, operation)?;

        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| ShabakaError::Store {
                message: format!("failed to apply schema: {e}"),
                operation: operation.to_string(),
            })?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn apply_pragmas(conn: &Connection, operation: &str) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 30000;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(|e| ShabakaError::Store {
            message: format!("failed to apply pragmas: {e}"),
            operation: operation.to_string(),
        })
    }
}

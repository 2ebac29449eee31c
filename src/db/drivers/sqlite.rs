// SQLite Driver
// Implements DatabaseDriver and ScriptConnection for SQLite using rusqlite

use crate::db::traits::{
    DatabaseConfig, DatabaseDriver, DatabaseError, DatabaseType, ScriptConnection,
};
use rusqlite::{Connection as RusqliteConnection, OpenFlags};
use std::path::Path;

/// SQLite specific connection wrapper
pub struct SqliteConnection {
    conn: RusqliteConnection,
}

impl SqliteConnection {
    /// Wrap an already opened rusqlite connection
    pub fn new(conn: RusqliteConnection) -> Self {
        Self { conn }
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        RusqliteConnection::open_in_memory()
            .map(Self::new)
            .map_err(|e| {
                DatabaseError::ConnectionFailed(format!("Failed to open SQLite database: {}", e))
            })
    }

    /// Borrow the underlying rusqlite connection (e.g. to inspect results after a run)
    pub fn inner(&self) -> &RusqliteConnection {
        &self.conn
    }
}

#[async_trait::async_trait]
impl ScriptConnection for SqliteConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn is_embedded(&self) -> bool {
        true
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        // changes() keeps the last DML count across DDL, so diff the running total instead
        let before = self.conn.total_changes();
        // execute_batch accepts row-returning statements (PRAGMA, SELECT) as well as DDL/DML
        self.conn.execute_batch(sql).map_err(map_sqlite_error)?;
        Ok(self.conn.total_changes().saturating_sub(before))
    }
}

fn map_sqlite_error(err: rusqlite::Error) -> DatabaseError {
    match &err {
        rusqlite::Error::SqliteFailure(code, message) => DatabaseError::StatementFailed {
            code: Some(format!("{:?}", code.code)),
            message: message.clone().unwrap_or_else(|| err.to_string()),
        },
        _ => DatabaseError::statement(err.to_string()),
    }
}

/// SQLite driver implementation
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver
    pub fn new() -> Self {
        Self
    }

    /// Extract database path from config
    fn get_database_path(config: &DatabaseConfig) -> Result<String, DatabaseError> {
        if config.database.is_empty() {
            return Err(DatabaseError::InvalidConfig(
                "SQLite database path is required".to_string(),
            ));
        }

        // Expand ~ to home directory if present
        let path = if let Some(rest) = config.database.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                Path::new(&home).join(rest).to_string_lossy().to_string()
            } else {
                config.database.clone()
            }
        } else {
            config.database.clone()
        };

        Ok(path)
    }

    /// Open SQLite connection
    fn open_connection(path: &str) -> Result<RusqliteConnection, DatabaseError> {
        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory()
        } else {
            RusqliteConnection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
            )
        };
        conn.map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open SQLite database: {}", e))
        })
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DatabaseDriver for SqliteDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    async fn test_connection(&self, config: &DatabaseConfig) -> Result<bool, DatabaseError> {
        let path = Self::get_database_path(config)?;
        let test_conn = Self::open_connection(&path);
        Ok(test_conn.is_ok())
    }

    async fn connect(
        &self,
        config: &DatabaseConfig,
    ) -> Result<Box<dyn ScriptConnection>, DatabaseError> {
        let path = Self::get_database_path(config)?;
        let sqlite_conn = Self::open_connection(&path)?;

        // Enable foreign keys so FK constraints in DDL scripts are enforced
        sqlite_conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(Box::new(SqliteConnection::new(sqlite_conn)))
    }
}

// Database Driver Traits
// Defines the connection capability the initializer executes statements against

use serde::{Deserialize, Serialize};

/// Supported database types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Sqlite,
    Mssql,
    Postgresql,
}

impl DatabaseType {
    /// Display name for logs and error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "SQLite",
            DatabaseType::Mssql => "Microsoft SQL Server",
            DatabaseType::Postgresql => "PostgreSQL",
        }
    }

    /// Platform name used in default script locations (`schema-{platform}.sql`)
    pub fn platform(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Mssql => "sqlserver",
            DatabaseType::Postgresql => "postgresql",
        }
    }

    /// Default port for the database type
    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseType::Sqlite => 0, // File-based, no port
            DatabaseType::Mssql => 1433,
            DatabaseType::Postgresql => 5432,
        }
    }
}

/// Common database error type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Driver not found for database type: {0:?}")]
    DriverNotFound(DatabaseType),

    #[error("Statement failed{}: {message}", code_suffix(.code))]
    StatementFailed {
        code: Option<String>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Timeout error")]
    Timeout,
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default()
}

impl DatabaseError {
    /// Statement failure without a vendor error code
    pub fn statement(message: impl Into<String>) -> Self {
        DatabaseError::StatementFailed {
            code: None,
            message: message.into(),
        }
    }
}

/// Connection capability - a live, exclusively held database session.
///
/// The initializer awaits one `execute` at a time and never shares the
/// connection, so implementations need `Send` but not `Sync`.
#[async_trait::async_trait]
pub trait ScriptConnection: Send {
    /// Database type behind this connection
    fn database_type(&self) -> DatabaseType;

    /// Whether the database lives inside this process (consulted by `InitializationMode::Embedded`)
    fn is_embedded(&self) -> bool {
        false
    }

    /// Execute one statement, returning the number of affected rows when the driver reports it
    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError>;
}

/// Database driver trait - opens connections for a database type
#[async_trait::async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Get the database type this driver supports
    fn database_type(&self) -> DatabaseType;

    /// Get the display name for this driver
    fn driver_name(&self) -> &'static str {
        self.database_type().display_name()
    }

    /// Test a connection configuration without keeping the connection
    async fn test_connection(&self, config: &DatabaseConfig) -> Result<bool, DatabaseError>;

    /// Create a new connection from configuration
    async fn connect(
        &self,
        config: &DatabaseConfig,
    ) -> Result<Box<dyn ScriptConnection>, DatabaseError>;
}

/// Unified database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub database_type: DatabaseType,

    pub host: Option<String>,
    pub port: Option<u16>,
    /// Database name, or the file path for SQLite (`:memory:` allowed)
    pub database: String,
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password: String,

    // MS-SQL specific
    pub mssql_encrypt: Option<bool>,
    pub mssql_trust_cert: Option<bool>,

    // PostgreSQL specific
    pub postgres_sslmode: Option<String>, // "disable", "prefer", "require"
}

impl DatabaseConfig {
    pub fn new(database_type: DatabaseType, database: impl Into<String>) -> Self {
        Self {
            database_type,
            host: None,
            port: None,
            database: database.into(),
            username: None,
            password: String::new(),
            mssql_encrypt: None,
            mssql_trust_cert: None,
            postgres_sslmode: None,
        }
    }

    /// In-memory SQLite configuration
    pub fn sqlite_in_memory() -> Self {
        Self::new(DatabaseType::Sqlite, ":memory:")
    }

    pub fn validate(&self) -> Result<(), DatabaseError> {
        match self.database_type {
            DatabaseType::Sqlite => {
                if self.database.is_empty() {
                    return Err(DatabaseError::InvalidConfig(
                        "SQLite database path is required".to_string(),
                    ));
                }
            }
            DatabaseType::Mssql | DatabaseType::Postgresql => {
                if self.host.as_ref().map(|h| h.is_empty()).unwrap_or(true) {
                    return Err(DatabaseError::InvalidConfig("Host is required".to_string()));
                }
                if self.username.as_ref().map(|u| u.is_empty()).unwrap_or(true) {
                    return Err(DatabaseError::InvalidConfig("Username is required".to_string()));
                }
                if self.database.is_empty() {
                    return Err(DatabaseError::InvalidConfig(
                        "Database name is required".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn get_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.database_type.default_port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sqlite_requires_path() {
        let config = DatabaseConfig::new(DatabaseType::Sqlite, "");
        assert!(matches!(config.validate(), Err(DatabaseError::InvalidConfig(_))));
        assert!(DatabaseConfig::sqlite_in_memory().validate().is_ok());
    }

    #[test]
    fn test_validate_server_requires_host_and_user() {
        let mut config = DatabaseConfig::new(DatabaseType::Postgresql, "app");
        assert!(config.validate().is_err());

        config.host = Some("localhost".to_string());
        assert!(config.validate().is_err());

        config.username = Some("postgres".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.get_port(), 5432);
    }

    #[test]
    fn test_statement_error_display() {
        let err = DatabaseError::StatementFailed {
            code: Some("42P01".to_string()),
            message: "relation \"t\" does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Statement failed [42P01]: relation \"t\" does not exist"
        );
        assert_eq!(
            DatabaseError::statement("boom").to_string(),
            "Statement failed: boom"
        );
    }

    #[test]
    fn test_password_not_serialized() {
        let mut config = DatabaseConfig::new(DatabaseType::Mssql, "app");
        config.password = "secret".to_string();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}

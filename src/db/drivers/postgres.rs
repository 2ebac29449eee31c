// PostgreSQL Driver
// Implements DatabaseDriver and ScriptConnection for PostgreSQL using tokio-postgres

use crate::db::traits::{
    DatabaseConfig, DatabaseDriver, DatabaseError, DatabaseType, ScriptConnection,
};
use tokio::task::JoinHandle;
use tokio_postgres::config::SslMode;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};

/// PostgreSQL specific connection wrapper
pub struct PostgresConnection {
    client: Client,
    // Drives the socket; aborted when the connection is dropped
    driver_task: JoinHandle<()>,
}

impl Drop for PostgresConnection {
    fn drop(&mut self) {
        self.driver_task.abort();
    }
}

#[async_trait::async_trait]
impl ScriptConnection for PostgresConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgresql
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        // Simple query protocol: no parameters, any statement kind (DDL, DO blocks, COPY-less DML)
        let messages = self.client.simple_query(sql).await.map_err(map_pg_error)?;

        let affected = messages
            .iter()
            .map(|msg| match msg {
                SimpleQueryMessage::CommandComplete(rows) => *rows,
                _ => 0,
            })
            .sum();
        Ok(affected)
    }
}

fn map_pg_error(err: tokio_postgres::Error) -> DatabaseError {
    match err.as_db_error() {
        Some(db_err) => DatabaseError::StatementFailed {
            code: Some(db_err.code().code().to_string()),
            message: db_err.message().to_string(),
        },
        None if err.is_closed() => DatabaseError::ConnectionFailed(err.to_string()),
        None => DatabaseError::statement(err.to_string()),
    }
}

/// PostgreSQL driver implementation
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create a new PostgreSQL driver
    pub fn new() -> Self {
        Self
    }

    /// Build the tokio-postgres config; values are passed as-is, never spliced into a string
    fn build_config(config: &DatabaseConfig) -> Result<Config, DatabaseError> {
        config.validate()?;

        let mut pg_config = Config::new();
        pg_config
            .host(config.host.as_deref().unwrap_or_default())
            .port(config.get_port())
            .dbname(&config.database)
            .user(config.username.as_deref().unwrap_or_default())
            .password(config.password.as_bytes())
            .ssl_mode(ssl_mode(config.postgres_sslmode.as_deref())?);
        Ok(pg_config)
    }
}

/// Only plaintext transports are available (`NoTls`), so `require` is refused
fn ssl_mode(sslmode: Option<&str>) -> Result<SslMode, DatabaseError> {
    match sslmode.unwrap_or("prefer") {
        "disable" => Ok(SslMode::Disable),
        "prefer" => Ok(SslMode::Prefer),
        "require" => Err(DatabaseError::InvalidConfig(
            "sslmode 'require' is not supported: PostgreSQL connections are made without TLS"
                .to_string(),
        )),
        other => Err(DatabaseError::InvalidConfig(format!(
            "Unknown PostgreSQL sslmode '{}'",
            other
        ))),
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DatabaseDriver for PostgresDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgresql
    }

    async fn test_connection(&self, config: &DatabaseConfig) -> Result<bool, DatabaseError> {
        let pg_config = Self::build_config(config)?;

        pg_config
            .connect(NoTls)
            .await
            .map(|_| true)
            .map_err(|e| {
                DatabaseError::ConnectionFailed(format!(
                    "PostgreSQL connection test failed: {}",
                    e
                ))
            })
    }

    async fn connect(
        &self,
        config: &DatabaseConfig,
    ) -> Result<Box<dyn ScriptConnection>, DatabaseError> {
        let pg_config = Self::build_config(config)?;

        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let driver_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        Ok(Box::new(PostgresConnection {
            client,
            driver_task,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::config::Host;

    fn config() -> DatabaseConfig {
        let mut config = DatabaseConfig::new(DatabaseType::Postgresql, "app");
        config.host = Some("db.internal".to_string());
        config.username = Some("init".to_string());
        config.password = "pw".to_string();
        config
    }

    #[test]
    fn test_build_config() {
        let pg_config = PostgresDriver::build_config(&config()).unwrap();
        assert_eq!(pg_config.get_hosts(), [Host::Tcp("db.internal".to_string())]);
        assert_eq!(pg_config.get_ports(), [5432]);
        assert_eq!(pg_config.get_dbname(), Some("app"));
        assert_eq!(pg_config.get_user(), Some("init"));
        assert_eq!(pg_config.get_ssl_mode(), SslMode::Prefer);
    }

    #[test]
    fn test_build_config_keeps_special_characters() {
        let mut config = config();
        config.password = "p w'\\x".to_string();
        config.username = Some("app user".to_string());
        config.database = "my db".to_string();

        let pg_config = PostgresDriver::build_config(&config).unwrap();
        assert_eq!(pg_config.get_password(), Some("p w'\\x".as_bytes()));
        assert_eq!(pg_config.get_user(), Some("app user"));
        assert_eq!(pg_config.get_dbname(), Some("my db"));
    }

    #[test]
    fn test_build_config_requires_host() {
        let mut config = config();
        config.host = None;
        assert!(matches!(
            PostgresDriver::build_config(&config),
            Err(DatabaseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sslmode() {
        assert_eq!(ssl_mode(Some("disable")).unwrap(), SslMode::Disable);
        assert_eq!(ssl_mode(None).unwrap(), SslMode::Prefer);
        assert!(matches!(ssl_mode(Some("require")), Err(DatabaseError::InvalidConfig(_))));
        assert!(matches!(ssl_mode(Some("verify-full")), Err(DatabaseError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_require_before_dialing() {
        let mut config = config();
        config.postgres_sslmode = Some("require".to_string());
        assert!(matches!(
            PostgresDriver::new().connect(&config).await,
            Err(DatabaseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_driver_type() {
        let driver = PostgresDriver::new();
        assert_eq!(driver.database_type(), DatabaseType::Postgresql);
        assert_eq!(driver.driver_name(), "PostgreSQL");
    }
}

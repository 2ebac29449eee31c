// MS-SQL Driver
// Implements DatabaseDriver and ScriptConnection for SQL Server using tiberius

use crate::db::traits::{
    DatabaseConfig, DatabaseDriver, DatabaseError, DatabaseType, ScriptConnection,
};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// Login failed because the password expired
const PASSWORD_EXPIRED: u32 = 18488;

/// MS-SQL specific connection wrapper (one dedicated, non-pooled client)
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
}

#[async_trait::async_trait]
impl ScriptConnection for MssqlConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Mssql
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        let result = self.client.execute(sql, &[]).await.map_err(map_tiberius_error)?;
        Ok(result.total())
    }
}

fn map_tiberius_error(err: tiberius::error::Error) -> DatabaseError {
    match &err {
        tiberius::error::Error::Server(token) if token.code() == PASSWORD_EXPIRED => {
            DatabaseError::ConnectionFailed(
                "Password expired. Please change your password using another tool.".to_string(),
            )
        }
        tiberius::error::Error::Server(token) => DatabaseError::StatementFailed {
            code: Some(token.code().to_string()),
            message: token.message().to_string(),
        },
        tiberius::error::Error::Io { .. } => DatabaseError::ConnectionFailed(err.to_string()),
        _ => DatabaseError::statement(err.to_string()),
    }
}

/// MS-SQL driver implementation
pub struct MssqlDriver;

impl MssqlDriver {
    /// Create a new MS-SQL driver
    pub fn new() -> Self {
        Self
    }

    /// Create a tiberius Config from the unified config
    fn to_tiberius_config(config: &DatabaseConfig) -> Result<Config, DatabaseError> {
        config.validate()?;

        let mut tiberius_config = Config::new();
        tiberius_config.host(config.host.as_deref().unwrap_or_default());
        tiberius_config.port(config.get_port());
        tiberius_config.database(&config.database);
        tiberius_config.authentication(AuthMethod::sql_server(
            config.username.as_deref().unwrap_or_default(),
            &config.password,
        ));

        if config.mssql_trust_cert.unwrap_or(true) {
            tiberius_config.trust_cert();
        }

        tiberius_config.encryption(if config.mssql_encrypt.unwrap_or(false) {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::Off
        });

        Ok(tiberius_config)
    }

    async fn open_client(config: &DatabaseConfig) -> Result<Client<Compat<TcpStream>>, DatabaseError> {
        let tiberius_config = Self::to_tiberius_config(config)?;

        let tcp = TcpStream::connect(tiberius_config.get_addr())
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(format!("TCP connection failed: {}", e)))?;

        tcp.set_nodelay(true).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
        })?;

        Client::connect(tiberius_config, tcp.compat_write())
            .await
            .map_err(|e| match map_tiberius_error(e) {
                DatabaseError::StatementFailed { message, .. } => {
                    DatabaseError::ConnectionFailed(message)
                }
                other => other,
            })
    }
}

impl Default for MssqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DatabaseDriver for MssqlDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Mssql
    }

    async fn test_connection(&self, config: &DatabaseConfig) -> Result<bool, DatabaseError> {
        Self::open_client(config).await.map(|_| true)
    }

    async fn connect(
        &self,
        config: &DatabaseConfig,
    ) -> Result<Box<dyn ScriptConnection>, DatabaseError> {
        let client = Self::open_client(config).await?;
        Ok(Box::new(MssqlConnection { client }))
    }
}

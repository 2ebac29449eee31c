// Driver Registry
// Maps database types to drivers and opens connections for initialization runs

use crate::db::drivers::{MssqlDriver, PostgresDriver, SqliteDriver};
use crate::db::traits::{
    DatabaseConfig, DatabaseDriver, DatabaseError, DatabaseType, ScriptConnection,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry for managing database drivers
pub struct DriverRegistry {
    drivers: RwLock<HashMap<DatabaseType, Arc<dyn DatabaseDriver>>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
        }
    }

    /// Registry pre-populated with the SQLite, PostgreSQL and MS-SQL drivers
    pub fn with_default_drivers() -> Self {
        let mut drivers: HashMap<DatabaseType, Arc<dyn DatabaseDriver>> = HashMap::new();
        drivers.insert(DatabaseType::Sqlite, Arc::new(SqliteDriver::new()));
        drivers.insert(DatabaseType::Postgresql, Arc::new(PostgresDriver::new()));
        drivers.insert(DatabaseType::Mssql, Arc::new(MssqlDriver::new()));
        Self {
            drivers: RwLock::new(drivers),
        }
    }

    /// Register a database driver, replacing any driver for the same type
    pub async fn register(&self, driver: Arc<dyn DatabaseDriver>) {
        let db_type = driver.database_type();
        let mut drivers = self.drivers.write().await;
        drivers.insert(db_type, driver);
        tracing::debug!(?db_type, "registered driver");
    }

    /// Get a driver by database type
    pub async fn get_driver(
        &self,
        db_type: DatabaseType,
    ) -> Result<Arc<dyn DatabaseDriver>, DatabaseError> {
        let drivers = self.drivers.read().await;
        drivers
            .get(&db_type)
            .cloned()
            .ok_or(DatabaseError::DriverNotFound(db_type))
    }

    /// Validate the config and open a connection with the matching driver
    pub async fn connect(
        &self,
        config: &DatabaseConfig,
    ) -> Result<Box<dyn ScriptConnection>, DatabaseError> {
        config.validate()?;
        let driver = self.get_driver(config.database_type).await?;
        tracing::debug!(driver = driver.driver_name(), "opening connection");
        driver.connect(config).await
    }

    /// Get all registered database types
    pub async fn get_supported_types(&self) -> Vec<DatabaseType> {
        let drivers = self.drivers.read().await;
        drivers.keys().copied().collect()
    }

    /// Check if a driver is registered for a given database type
    pub async fn has_driver(&self, db_type: DatabaseType) -> bool {
        let drivers = self.drivers.read().await;
        drivers.contains_key(&db_type)
    }

    /// Remove a driver
    pub async fn unregister(&self, db_type: DatabaseType) {
        let mut drivers = self.drivers.write().await;
        drivers.remove(&db_type);
        tracing::debug!(?db_type, "unregistered driver");
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mock driver for testing
    struct MockDriver;

    #[async_trait::async_trait]
    impl DatabaseDriver for MockDriver {
        fn database_type(&self) -> DatabaseType {
            DatabaseType::Mssql
        }

        async fn test_connection(&self, _config: &DatabaseConfig) -> Result<bool, DatabaseError> {
            Ok(false)
        }

        async fn connect(
            &self,
            _config: &DatabaseConfig,
        ) -> Result<Box<dyn ScriptConnection>, DatabaseError> {
            Err(DatabaseError::ConnectionFailed("Mock".to_string()))
        }
    }

    #[tokio::test]
    async fn test_register_driver() {
        let registry = DriverRegistry::new();
        registry.register(Arc::new(MockDriver)).await;

        assert!(registry.has_driver(DatabaseType::Mssql).await);
        assert!(registry.get_driver(DatabaseType::Postgresql).await.is_err());
    }

    #[tokio::test]
    async fn test_unregister_driver() {
        let registry = DriverRegistry::new();
        registry.register(Arc::new(MockDriver)).await;
        assert!(registry.has_driver(DatabaseType::Mssql).await);

        registry.unregister(DatabaseType::Mssql).await;
        assert!(!registry.has_driver(DatabaseType::Mssql).await);
        assert!(registry.get_supported_types().await.is_empty());
    }

    #[tokio::test]
    async fn test_default_drivers() {
        let registry = DriverRegistry::with_default_drivers();

        let mut types = registry.get_supported_types().await;
        types.sort_by_key(|t| t.display_name());
        assert_eq!(
            types,
            vec![
                DatabaseType::Mssql,
                DatabaseType::Postgresql,
                DatabaseType::Sqlite
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_sqlite_in_memory() {
        let registry = DriverRegistry::with_default_drivers();
        let mut conn = registry
            .connect(&DatabaseConfig::sqlite_in_memory())
            .await
            .unwrap();
        assert!(conn.is_embedded());
        conn.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_missing_driver() {
        let registry = DriverRegistry::new();
        let result = registry.connect(&DatabaseConfig::sqlite_in_memory()).await;
        assert!(matches!(
            result,
            Err(DatabaseError::DriverNotFound(DatabaseType::Sqlite))
        ));
    }

    #[tokio::test]
    async fn test_connect_propagates_driver_error() {
        let registry = DriverRegistry::new();
        registry.register(Arc::new(MockDriver)).await;

        let mut config = DatabaseConfig::new(DatabaseType::Mssql, "master");
        config.host = Some("localhost".to_string());
        config.username = Some("sa".to_string());

        assert!(matches!(
            registry.connect(&config).await,
            Err(DatabaseError::ConnectionFailed(_))
        ));
    }
}

// Database Module
// Connection capability, drivers for each supported database and the driver registry

pub mod drivers;
pub mod registry;
pub mod traits;

pub use drivers::{
    MssqlConnection, MssqlDriver, PostgresConnection, PostgresDriver, SqliteConnection,
    SqliteDriver,
};
pub use registry::DriverRegistry;
pub use traits::{DatabaseConfig, DatabaseDriver, DatabaseError, DatabaseType, ScriptConnection};

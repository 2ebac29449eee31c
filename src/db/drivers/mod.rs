// Database Drivers
// Contains implementations for each supported database type

pub mod mssql;
pub mod postgres;
pub mod sqlite;

// Re-export drivers
pub use mssql::{MssqlConnection, MssqlDriver};
pub use postgres::{PostgresConnection, PostgresDriver};
pub use sqlite::{SqliteConnection, SqliteDriver};

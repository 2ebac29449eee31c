// Larik DB Init
// Applies DDL (schema) and DML (data) SQL scripts to a database connection, in order

// Module declarations
pub mod db;
pub mod error;
pub mod executor;
pub mod initializer;
pub mod resource;
pub mod script;
pub mod settings;

pub use db::{DatabaseConfig, DatabaseError, DatabaseType, DriverRegistry, ScriptConnection};
pub use error::{InitError, InitResult};
pub use executor::{ExecutionOutcome, StatementExecutor, StatementFailure, StatementRef};
pub use initializer::{DatabaseInitializer, InitPhase, RunAborted, RunResult, RunStatus};
pub use resource::{
    FileSystemLoader, InMemoryLoader, LocationResolver, OptionalMarker, ResourceLoader,
    ScriptHandle, ScriptLocation,
};
pub use script::{ScriptEncoding, ScriptSplitter, Statement};
pub use settings::{InitializationMode, InitializationSettings, InitializationSettingsBuilder};

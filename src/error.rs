// Initialization Errors
// Structural script problems and statement failures raised by an initialization run

use crate::db::traits::DatabaseError;
use crate::executor::StatementFailure;
use crate::script::{ScriptEncoding, Unterminated};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitError {
    /// A required location matched no scripts
    #[error("No SQL script found at required location '{location}'")]
    LocationNotFound { location: String },

    #[error("Invalid script location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Script '{script}' cannot be decoded as {encoding}: {detail}")]
    ScriptEncoding {
        script: String,
        encoding: ScriptEncoding,
        detail: String,
    },

    #[error("Script '{script}' ends inside an unterminated {construct} opened on line {line}")]
    UnterminatedScript {
        script: String,
        construct: Unterminated,
        line: usize,
    },

    #[error("{0}")]
    StatementExecution(Box<StatementFailure>),

    /// `run_blocking` was called on a thread already driving an async runtime
    #[error("Blocking initialization cannot run inside an async runtime; await `run` instead")]
    NestedRuntime,

    #[error("Invalid initialization settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to read '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl InitError {
    /// Structural errors abort a run regardless of `continue_on_error`
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            InitError::LocationNotFound { .. }
                | InitError::InvalidLocation { .. }
                | InitError::ScriptEncoding { .. }
                | InitError::UnterminatedScript { .. }
                | InitError::Io { .. }
        )
    }
}

impl From<StatementFailure> for InitError {
    fn from(failure: StatementFailure) -> Self {
        InitError::StatementExecution(Box::new(failure))
    }
}

pub type InitResult<T> = Result<T, InitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = InitError::LocationNotFound {
            location: "classpath:/schema.sql".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No SQL script found at required location 'classpath:/schema.sql'"
        );

        let err = InitError::UnterminatedScript {
            script: "data.sql".to_string(),
            construct: Unterminated::DoubleQuote,
            line: 4,
        };
        assert_eq!(
            err.to_string(),
            "Script 'data.sql' ends inside an unterminated double-quoted literal opened on line 4"
        );

        let err = InitError::ScriptEncoding {
            script: "data.sql".to_string(),
            encoding: ScriptEncoding::Utf8,
            detail: "invalid byte sequence at offset 3".to_string(),
        };
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_structural_classification() {
        assert!(InitError::LocationNotFound {
            location: "x".to_string()
        }
        .is_structural());
        assert!(!InitError::InvalidSettings("x".to_string()).is_structural());
        assert!(!InitError::NestedRuntime.is_structural());
        assert!(!InitError::Database(DatabaseError::Timeout).is_structural());
    }
}

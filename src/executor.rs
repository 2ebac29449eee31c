// Statement Executor
// Applies one statement to a connection and classifies the outcome

use crate::db::traits::{DatabaseError, ScriptConnection};
use crate::script::Statement;
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Default maximum length of the statement excerpt kept for diagnostics
pub const DEFAULT_EXCERPT_CHARS: usize = 200;

/// Identifies a statement within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementRef {
    pub script: String,
    /// 0-based statement index within the script
    pub index: usize,
    pub line: usize,
}

impl From<&Statement> for StatementRef {
    fn from(statement: &Statement) -> Self {
        Self {
            script: statement.script.to_string(),
            index: statement.index,
            line: statement.line,
        }
    }
}

/// A statement that failed against the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementFailure {
    pub statement: StatementRef,
    /// Statement text, truncated
    pub excerpt: String,
    pub cause: DatabaseError,
}

impl fmt::Display for StatementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to execute SQL script statement #{} of {} (line {}): {}: {}",
            self.statement.index + 1,
            self.statement.script,
            self.statement.line,
            self.excerpt,
            self.cause
        )
    }
}

impl std::error::Error for StatementFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Result of executing a single statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success {
        statement: StatementRef,
        rows_affected: u64,
    },
    Failure(StatementFailure),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}

/// Executes statements exactly once; never retries
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    excerpt_chars: usize,
}

impl StatementExecutor {
    pub fn new() -> Self {
        Self {
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars;
        self
    }

    /// Execute the statement. Database errors become a failure outcome.
    pub async fn execute(
        &self,
        conn: &mut dyn ScriptConnection,
        statement: &Statement,
    ) -> ExecutionOutcome {
        let start = Instant::now();
        let result = conn.execute(&statement.sql).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(rows_affected) => {
                tracing::debug!(
                    script = %statement.script,
                    index = statement.index,
                    rows_affected,
                    elapsed_ms,
                    "statement executed"
                );
                ExecutionOutcome::Success {
                    statement: StatementRef::from(statement),
                    rows_affected,
                }
            }
            Err(cause) => ExecutionOutcome::Failure(StatementFailure {
                statement: StatementRef::from(statement),
                excerpt: excerpt(&statement.sql, self.excerpt_chars),
                cause,
            }),
        }
    }
}

impl Default for StatementExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-line, char-bounded excerpt of a statement
pub fn excerpt(sql: &str, max_chars: usize) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::drivers::SqliteConnection;
    use std::sync::Arc;

    fn statement(sql: &str) -> Statement {
        Statement {
            script: Arc::from("test.sql"),
            index: 2,
            line: 7,
            sql: sql.to_string(),
        }
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("SELECT\n   1", 50), "SELECT 1");
        assert_eq!(excerpt("INSERT INTO é VALUES (1)", 13), "INSERT INTO é...");
    }

    #[tokio::test]
    async fn test_success_outcome() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let outcome = StatementExecutor::new()
            .execute(&mut conn, &statement("CREATE TABLE t (id INTEGER)"))
            .await;

        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_failure_outcome_carries_context() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        let outcome = StatementExecutor::new()
            .with_excerpt_chars(20)
            .execute(
                &mut conn,
                &statement("INSERT INTO missing_table VALUES (1, 2, 3)"),
            )
            .await;

        match outcome {
            ExecutionOutcome::Failure(failure) => {
                assert_eq!(failure.statement.script, "test.sql");
                assert_eq!(failure.statement.index, 2);
                assert_eq!(failure.statement.line, 7);
                assert_eq!(failure.excerpt, "INSERT INTO missing_...");
                assert!(matches!(failure.cause, DatabaseError::StatementFailed { .. }));

                let message = failure.to_string();
                assert!(message.starts_with("Failed to execute SQL script statement #3 of test.sql (line 7)"));
                assert!(message.contains("missing_table"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}

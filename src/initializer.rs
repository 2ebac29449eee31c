// Database Initializer
// Runs DDL then DML scripts against one connection, applying the continue-on-error policy

use crate::db::registry::DriverRegistry;
use crate::db::traits::{DatabaseConfig, ScriptConnection};
use crate::error::{InitError, InitResult};
use crate::executor::{ExecutionOutcome, StatementExecutor, StatementFailure, StatementRef};
use crate::resource::{LocationResolver, OptionalMarker, ResourceLoader, ScriptLocation};
use crate::script::ScriptSplitter;
use crate::settings::{InitializationMode, InitializationSettings};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Phase of an initialization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPhase {
    Idle,
    ResolvingDdl,
    ExecutingDdl,
    ResolvingDml,
    ExecutingDml,
    Done,
    Aborted,
}

impl InitPhase {
    /// Allowed transitions: the happy path in order, or `Aborted` from any resolving/executing phase
    pub fn can_transition_to(self, next: InitPhase) -> bool {
        use InitPhase::*;
        match (self, next) {
            (Idle, ResolvingDdl)
            | (ResolvingDdl, ExecutingDdl)
            | (ExecutingDdl, ResolvingDml)
            | (ResolvingDml, ExecutingDml)
            | (ExecutingDml, Done) => true,
            (ResolvingDdl | ExecutingDdl | ResolvingDml | ExecutingDml, Aborted) => true,
            _ => false,
        }
    }
}

/// Kind of script a phase applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptKind {
    Ddl,
    Dml,
}

impl ScriptKind {
    fn resolving(self) -> InitPhase {
        match self {
            ScriptKind::Ddl => InitPhase::ResolvingDdl,
            ScriptKind::Dml => InitPhase::ResolvingDml,
        }
    }

    fn executing(self) -> InitPhase {
        match self {
            ScriptKind::Ddl => InitPhase::ExecutingDdl,
            ScriptKind::Dml => InitPhase::ExecutingDml,
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScriptKind::Ddl => "DDL",
            ScriptKind::Dml => "DML",
        })
    }
}

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every statement succeeded
    Succeeded,
    /// Ran to the end with tolerated failures
    Failed,
    /// Stopped at the first failed statement
    Aborted,
    /// Not run because of the initialization mode
    Skipped,
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Phases entered, in order
    pub phases: Vec<InitPhase>,
    /// Scripts processed, in execution order
    pub scripts: Vec<String>,
    /// Statements that succeeded, in execution order
    pub succeeded: Vec<StatementRef>,
    pub failures: Vec<StatementFailure>,
    /// Failed `DROP` statements tolerated by `ignore_failed_drops`
    pub ignored_drop_failures: usize,
}

impl RunResult {
    fn new(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            status: RunStatus::Succeeded,
            started_at: now,
            finished_at: now,
            phases: vec![InitPhase::Idle],
            scripts: Vec::new(),
            succeeded: Vec::new(),
            failures: Vec::new(),
            ignored_drop_failures: 0,
        }
    }

    /// Number of statements submitted to the database
    pub fn statements_executed(&self) -> usize {
        self.succeeded.len() + self.failures.len() + self.ignored_drop_failures
    }

    /// True when the run succeeded or was skipped by mode
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded | RunStatus::Skipped)
    }

    /// Turn a failed run into its first statement failure
    pub fn into_result(self) -> InitResult<RunResult> {
        if self.is_success() {
            return Ok(self);
        }
        match self.failures.into_iter().next() {
            Some(failure) => Err(InitError::from(failure)),
            None => Err(InitError::InvalidSettings(
                "run failed without a recorded statement failure".to_string(),
            )),
        }
    }
}

/// A run stopped by a structural error, with the work done before it
#[derive(Debug)]
pub struct RunAborted {
    pub error: InitError,
    /// Statements and scripts applied before the error; status is `Aborted`
    pub partial: RunResult,
}

enum Flow {
    Continue,
    Abort,
}

/// Drives an initialization run.
///
/// DDL locations are resolved and executed before any DML location is
/// resolved. Statements run one at a time on the borrowed connection.
pub struct DatabaseInitializer {
    settings: InitializationSettings,
    loader: Arc<dyn ResourceLoader>,
    marker: OptionalMarker,
    splitter: ScriptSplitter,
    executor: StatementExecutor,
}

impl DatabaseInitializer {
    pub fn new(
        settings: InitializationSettings,
        loader: Arc<dyn ResourceLoader>,
    ) -> InitResult<Self> {
        settings.validate()?;
        let splitter = ScriptSplitter::new(settings.separator(), settings.encoding());
        Ok(Self {
            settings,
            loader,
            marker: OptionalMarker::default(),
            splitter,
            executor: StatementExecutor::new(),
        })
    }

    /// Replace the `optional:` marker policy
    pub fn with_optional_marker(mut self, marker: OptionalMarker) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_executor(mut self, executor: StatementExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn settings(&self) -> &InitializationSettings {
        &self.settings
    }

    /// Run initialization on a current-thread runtime, blocking the caller.
    ///
    /// Must not be called from async code: returns `InitError::NestedRuntime`
    /// when the current thread is already inside a tokio runtime.
    pub fn run_blocking(&self, conn: &mut dyn ScriptConnection) -> InitResult<RunResult> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(InitError::NestedRuntime);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| InitError::Io {
                location: "runtime".to_string(),
                source,
            })?;
        runtime.block_on(self.run(conn))
    }

    /// Open a connection through the registry and run initialization on it
    pub async fn connect_and_run(
        &self,
        registry: &DriverRegistry,
        config: &DatabaseConfig,
    ) -> InitResult<RunResult> {
        let mut conn = registry.connect(config).await?;
        self.run(conn.as_mut()).await
    }

    /// Run initialization against an exclusively borrowed connection.
    ///
    /// Structural problems (missing required location, undecodable or
    /// unterminated script) return `Err`. Statement failures are reported in
    /// the returned `RunResult`.
    pub async fn run(&self, conn: &mut dyn ScriptConnection) -> InitResult<RunResult> {
        self.run_detailed(conn).await.map_err(|aborted| aborted.error)
    }

    /// Like `run`, but a structural error keeps the partial `RunResult`
    pub async fn run_detailed(
        &self,
        conn: &mut dyn ScriptConnection,
    ) -> Result<RunResult, RunAborted> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("db_init", %run_id);
        self.run_inner(run_id, conn).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        conn: &mut dyn ScriptConnection,
    ) -> Result<RunResult, RunAborted> {
        let mut result = RunResult::new(run_id);

        if !self.should_run(conn) {
            tracing::info!(mode = ?self.settings.mode(), "database initialization skipped");
            result.status = RunStatus::Skipped;
            result.finished_at = Utc::now();
            return Ok(result);
        }

        tracing::info!(
            database = conn.database_type().display_name(),
            ddl_locations = self.settings.ddl_locations().len(),
            dml_locations = self.settings.dml_locations().len(),
            continue_on_error = self.settings.continue_on_error(),
            "starting database initialization"
        );

        let resolver = LocationResolver::new(self.loader.as_ref(), &self.marker);

        // Required locations of both phases must exist before anything executes
        let preflight = resolver
            .check_required(self.settings.ddl_locations())
            .and_then(|_| resolver.check_required(self.settings.dml_locations()));
        if let Err(error) = preflight {
            tracing::error!(error = %error, "database initialization aborted before execution");
            result.status = RunStatus::Aborted;
            result.finished_at = Utc::now();
            return Err(RunAborted {
                error,
                partial: result,
            });
        }

        for (kind, patterns) in [
            (ScriptKind::Ddl, self.settings.ddl_locations()),
            (ScriptKind::Dml, self.settings.dml_locations()),
        ] {
            match self.run_phase(kind, patterns, &resolver, conn, &mut result).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Abort) => {
                    Self::transition(&mut result, InitPhase::Aborted);
                    result.status = RunStatus::Aborted;
                    result.finished_at = Utc::now();
                    if let Some(failure) = result.failures.first() {
                        tracing::error!(%failure, "database initialization aborted");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    Self::transition(&mut result, InitPhase::Aborted);
                    result.status = RunStatus::Aborted;
                    result.finished_at = Utc::now();
                    tracing::error!(
                        error = %error,
                        statements_executed = result.statements_executed(),
                        scripts_applied = ?result.scripts,
                        "database initialization aborted"
                    );
                    return Err(RunAborted {
                        error,
                        partial: result,
                    });
                }
            }
        }

        Self::transition(&mut result, InitPhase::Done);
        result.status = if result.failures.is_empty() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        result.finished_at = Utc::now();

        tracing::info!(
            status = ?result.status,
            scripts = result.scripts.len(),
            statements = result.statements_executed(),
            failures = result.failures.len(),
            "database initialization finished"
        );
        Ok(result)
    }

    fn should_run(&self, conn: &dyn ScriptConnection) -> bool {
        match self.settings.mode() {
            InitializationMode::Always => true,
            InitializationMode::Embedded => conn.is_embedded(),
            InitializationMode::Never => false,
        }
    }

    fn transition(result: &mut RunResult, next: InitPhase) {
        let current = result.phases.last().copied().unwrap_or(InitPhase::Idle);
        debug_assert!(
            current.can_transition_to(next),
            "invalid phase transition {:?} -> {:?}",
            current,
            next
        );
        tracing::info!(from = ?current, to = ?next, "phase transition");
        result.phases.push(next);
    }

    async fn run_phase(
        &self,
        kind: ScriptKind,
        patterns: &[String],
        resolver: &LocationResolver<'_>,
        conn: &mut dyn ScriptConnection,
        result: &mut RunResult,
    ) -> InitResult<Flow> {
        Self::transition(result, kind.resolving());
        let locations = resolver.resolve(patterns)?;

        Self::transition(result, kind.executing());
        for location in &locations {
            if let Flow::Abort = self.execute_location(kind, location, conn, result).await? {
                return Ok(Flow::Abort);
            }
        }
        Ok(Flow::Continue)
    }

    async fn execute_location(
        &self,
        kind: ScriptKind,
        location: &ScriptLocation,
        conn: &mut dyn ScriptConnection,
        result: &mut RunResult,
    ) -> InitResult<Flow> {
        for script in &location.scripts {
            result.scripts.push(script.name().to_string());
            let mut executed = 0usize;

            for statement in self.splitter.split(script)? {
                let statement = statement?;
                executed += 1;

                match self.executor.execute(conn, &statement).await {
                    ExecutionOutcome::Success { statement, .. } => result.succeeded.push(statement),
                    ExecutionOutcome::Failure(failure) => {
                        if self.settings.ignore_failed_drops() && is_drop(&statement.sql) {
                            tracing::warn!(%failure, "ignoring failed DROP statement");
                            result.ignored_drop_failures += 1;
                            continue;
                        }

                        if !self.settings.continue_on_error() {
                            result.failures.push(failure);
                            return Ok(Flow::Abort);
                        }

                        tracing::warn!(%failure, "statement failed, continuing");
                        result.failures.push(failure);
                    }
                }
            }

            tracing::info!(
                kind = %kind,
                script = script.name(),
                statements = executed,
                "applied SQL script"
            );
        }
        Ok(Flow::Continue)
    }
}

fn is_drop(sql: &str) -> bool {
    sql.get(..4)
        .map(|head| head.eq_ignore_ascii_case("drop"))
        .unwrap_or(false)
}

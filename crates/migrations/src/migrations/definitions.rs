//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the migration unit, the runner's states and the report a run
//! returns.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{ExecutedStatement, MigrationContext};
use crate::error::MigrationResult;
use crate::semver::SemVersion;

/// One upgrade step, expressed as builder calls on the context
#[async_trait]
pub trait Migration: Send + Sync {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()>;
}

/// A migration registered at a target version
#[derive(Clone)]
pub struct MigrationUnit {
    /// Version the database is at once this unit has run
    pub version: SemVersion,
    /// Human-readable name for logs and errors
    pub description: String,
    /// Downstream caches must be rebuilt after a successful commit
    pub rebuild_cache: bool,
    /// Issued access tokens must be revoked after a successful commit
    pub invalidate_user_sessions: bool,
    migration: Arc<dyn Migration>,
}

impl MigrationUnit {
    pub fn new<M>(version: SemVersion, description: &str, migration: M) -> Self
    where
        M: Migration + 'static,
    {
        Self {
            version,
            description: description.to_string(),
            rebuild_cache: false,
            invalidate_user_sessions: false,
            migration: Arc::new(migration),
        }
    }

    pub fn rebuild_cache(mut self) -> Self {
        self.rebuild_cache = true;
        self
    }

    pub fn invalidate_user_sessions(mut self) -> Self {
        self.invalidate_user_sessions = true;
        self
    }

    /// Run the unit's builder calls
    pub async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        self.migration.migrate(ctx).await
    }
}

impl fmt::Debug for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("rebuild_cache", &self.rebuild_cache)
            .field("invalidate_user_sessions", &self.invalidate_user_sessions)
            .finish()
    }
}

impl fmt::Display for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.version, self.description)
    }
}

/// Runner state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    PlanComputed,
    /// Executing the unit at this index of the plan
    Running(usize),
    Committed,
    RolledBack,
    Failed,
}

impl RunnerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunnerState::Committed | RunnerState::RolledBack | RunnerState::Failed)
    }
}

/// How a run that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Committed,
    /// Stopped between units by cancellation; nothing from the open
    /// transaction was kept
    RolledBack,
}

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationRunReport {
    pub outcome: RunOutcome,
    /// Recorded version before the run; `None` for a fresh database
    pub from_version: Option<SemVersion>,
    /// Recorded version after the run
    pub to_version: Option<SemVersion>,
    /// Versions whose changes were committed
    pub applied: Vec<SemVersion>,
    /// A cache rebuild was signalled
    pub rebuild_cache: bool,
    /// Session invalidation was signalled
    pub invalidate_user_sessions: bool,
    /// Statements executed, including those of rolled back units
    pub statements: Vec<ExecutedStatement>,
    /// Post-commit collaborators that failed
    pub signal_errors: Vec<String>,
    pub elapsed: Duration,
}

impl MigrationRunReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Nothing needed to run
    pub fn is_noop(&self) -> bool {
        self.outcome == RunOutcome::Committed && self.applied.is_empty()
    }
}

//! Migration Runner - Executes migrations against the database
//!
//! Reads the recorded version, computes the plan, runs each unit inside the
//! transactional scope, records the new version and commits, or rolls
//! everything back on the first error.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use super::catalog::MigrationCatalog;
use super::definitions::{MigrationRunReport, MigrationUnit, RunOutcome, RunnerState};
use super::plan::MigrationPlan;
use super::signals::{CacheInvalidation, PendingSignals, SessionInvalidation};
use super::version_store::{TableVersionStore, VersionStore};
use crate::backends::DatabasePool;
use crate::config::{MigratorConfig, TransactionScope};
use crate::context::MigrationContext;
use crate::error::{MigrationError, MigrationResult};
use crate::semver::SemVersion;
use crate::syntax::{Feature, SqlSyntaxProvider};

fn display_version(version: Option<&SemVersion>) -> String {
    version.map(ToString::to_string).unwrap_or_else(|| "none".to_string())
}

/// Migration runner that executes a catalog against a database
pub struct MigrationRunner {
    pool: Arc<dyn DatabasePool>,
    catalog: MigrationCatalog,
    config: MigratorConfig,
    syntax: Arc<dyn SqlSyntaxProvider>,
    version_store: Arc<dyn VersionStore>,
    cache_invalidation: Option<Arc<dyn CacheInvalidation>>,
    session_invalidation: Option<Arc<dyn SessionInvalidation>>,
    cancellation: CancellationToken,
    state: RunnerState,
}

impl MigrationRunner {
    pub fn builder() -> MigrationRunnerBuilder {
        MigrationRunnerBuilder::default()
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Token that stops the run between migration units
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Compute the plan without executing it
    pub async fn plan(&self) -> MigrationResult<MigrationPlan> {
        let current = self.version_store.current_version(self.pool.as_ref()).await?;
        Ok(MigrationPlan::compute(&self.catalog, current.as_ref()))
    }

    /// Run every pending migration
    pub async fn run(&mut self) -> MigrationResult<MigrationRunReport> {
        let started = Instant::now();
        self.state = RunnerState::Idle;

        let from_version = match self.version_store.current_version(self.pool.as_ref()).await {
            Ok(version) => version,
            Err(e) => {
                self.state = RunnerState::Failed;
                error!("Failed to read the recorded schema version: {}", e);
                return Err(e);
            }
        };

        let plan = MigrationPlan::compute(&self.catalog, from_version.as_ref());
        self.state = RunnerState::PlanComputed;

        if plan.is_empty() {
            self.state = RunnerState::Committed;
            info!(
                from = %display_version(from_version.as_ref()),
                "Database is up to date, no migrations to run"
            );
            return Ok(MigrationRunReport {
                outcome: RunOutcome::Committed,
                to_version: from_version.clone(),
                from_version,
                applied: Vec::new(),
                rebuild_cache: false,
                invalidate_user_sessions: false,
                statements: Vec::new(),
                signal_errors: Vec::new(),
                elapsed: started.elapsed(),
            });
        }

        info!(
            from = %display_version(from_version.as_ref()),
            to = %display_version(plan.target_version()),
            count = plan.len(),
            scope = ?self.config.transaction_scope,
            "Running migrations"
        );
        if !self.syntax.supports(Feature::TransactionalDdl) {
            warn!(
                "The {} dialect may not roll back DDL; a failed run can leave schema changes behind",
                self.syntax.kind()
            );
        }

        let result = match self.config.transaction_scope {
            TransactionScope::PerPlan => self.run_per_plan(&plan, from_version.clone()).await,
            TransactionScope::PerMigration => self.run_per_migration(&plan, from_version.clone()).await,
        };

        match result {
            Ok(mut report) => {
                report.elapsed = started.elapsed();
                info!(
                    outcome = ?report.outcome,
                    from = %display_version(report.from_version.as_ref()),
                    to = %display_version(report.to_version.as_ref()),
                    applied = report.applied.len(),
                    statements = report.statements.len(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Migration run finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.state = RunnerState::Failed;
                error!(
                    from = %display_version(from_version.as_ref()),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Migration run failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// One transaction around the whole plan
    async fn run_per_plan(
        &mut self,
        plan: &MigrationPlan,
        from_version: Option<SemVersion>,
    ) -> MigrationResult<MigrationRunReport> {
        let tx = self.pool.begin_transaction().await?;
        let mut ctx = MigrationContext::new(tx, self.syntax.clone());
        let mut pending = PendingSignals::default();

        for (index, unit) in plan.units().iter().enumerate() {
            if self.cancellation.is_cancelled() {
                warn!("Migration run cancelled before {}", unit);
                rollback(&mut ctx).await;
                self.state = RunnerState::RolledBack;
                return Ok(self.report(RunOutcome::RolledBack, from_version.clone(), from_version, Vec::new(), ctx));
            }

            self.state = RunnerState::Running(index);
            if let Err(e) = run_unit(&mut ctx, unit).await {
                rollback(&mut ctx).await;
                return Err(MigrationError::MigrationFailed {
                    version: unit.version.clone(),
                    description: unit.description.clone(),
                    applied: Vec::new(),
                    source: Box::new(e),
                });
            }
            pending.record(unit);
        }

        let target = match plan.target_version() {
            Some(version) => version.clone(),
            None => return Err(MigrationError::Configuration("Plan has no target version".to_string())),
        };
        ctx.set_current_version(None);
        if let Err(e) = self.record_version(&mut ctx, &target).await {
            rollback(&mut ctx).await;
            return Err(e);
        }
        commit(&mut ctx).await?;
        self.state = RunnerState::Committed;

        let mut report = self.report(
            RunOutcome::Committed,
            from_version,
            Some(target),
            plan.versions(),
            ctx,
        );
        self.signal(pending, &mut report).await;
        Ok(report)
    }

    /// A transaction per unit; each commit records that unit's version
    async fn run_per_migration(
        &mut self,
        plan: &MigrationPlan,
        from_version: Option<SemVersion>,
    ) -> MigrationResult<MigrationRunReport> {
        let mut ctx: Option<MigrationContext> = None;
        let mut pending = PendingSignals::default();
        let mut applied = Vec::new();
        let mut recorded = from_version.clone();

        for (index, unit) in plan.units().iter().enumerate() {
            if self.cancellation.is_cancelled() {
                warn!("Migration run cancelled before {}", unit);
                self.state = RunnerState::RolledBack;
                let mut report = self.report_from(
                    RunOutcome::RolledBack,
                    from_version,
                    recorded,
                    applied,
                    ctx.map(MigrationContext::into_log).unwrap_or_default(),
                );
                self.signal(pending, &mut report).await;
                return Ok(report);
            }

            self.state = RunnerState::Running(index);
            if let Err(e) = self.apply_in_transaction(&mut ctx, unit).await {
                // Units committed before the failure keep their effects
                if pending.any() {
                    let mut partial = self.report_from(
                        RunOutcome::Committed,
                        from_version.clone(),
                        recorded.clone(),
                        applied.clone(),
                        Vec::new(),
                    );
                    self.signal(pending, &mut partial).await;
                }
                return Err(MigrationError::MigrationFailed {
                    version: unit.version.clone(),
                    description: unit.description.clone(),
                    applied,
                    source: Box::new(e),
                });
            }

            applied.push(unit.version.clone());
            recorded = Some(unit.version.clone());
            pending.record(unit);
        }

        self.state = RunnerState::Committed;
        let mut report = self.report_from(
            RunOutcome::Committed,
            from_version,
            recorded,
            applied,
            ctx.map(MigrationContext::into_log).unwrap_or_default(),
        );
        self.signal(pending, &mut report).await;
        Ok(report)
    }

    /// Begin, apply, record and commit a single unit; rolls back on any error
    async fn apply_in_transaction(
        &self,
        ctx: &mut Option<MigrationContext>,
        unit: &MigrationUnit,
    ) -> MigrationResult<()> {
        let tx = self.pool.begin_transaction().await?;
        let context = match ctx.take() {
            Some(mut context) => {
                context.attach_transaction(tx);
                ctx.insert(context)
            }
            None => ctx.insert(MigrationContext::new(tx, self.syntax.clone())),
        };

        let outcome = match run_unit(context, unit).await {
            Ok(()) => {
                context.set_current_version(None);
                self.record_version(context, &unit.version).await
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => commit(context).await,
            Err(e) => {
                rollback(context).await;
                Err(e)
            }
        }
    }

    async fn record_version(&self, ctx: &mut MigrationContext, version: &SemVersion) -> MigrationResult<()> {
        let tx = ctx.transaction_mut()?;
        self.version_store.set_current_version(tx.as_mut(), version).await
    }

    /// Forward accumulated requests to the collaborators, once each
    async fn signal(&self, pending: PendingSignals, report: &mut MigrationRunReport) {
        if pending.rebuild_cache {
            report.rebuild_cache = true;
            match &self.cache_invalidation {
                Some(cache) => {
                    if let Err(e) = cache.rebuild_cache().await {
                        error!("Cache rebuild signal failed after commit: {}", e);
                        report.signal_errors.push(e.to_string());
                    }
                }
                None => warn!("Migrations requested a cache rebuild but no cache collaborator is registered"),
            }
        }
        if pending.invalidate_user_sessions {
            report.invalidate_user_sessions = true;
            match &self.session_invalidation {
                Some(sessions) => {
                    if let Err(e) = sessions.invalidate_all_sessions().await {
                        error!("Session invalidation signal failed after commit: {}", e);
                        report.signal_errors.push(e.to_string());
                    }
                }
                None => warn!("Migrations requested session invalidation but no session collaborator is registered"),
            }
        }
    }

    fn report(
        &self,
        outcome: RunOutcome,
        from_version: Option<SemVersion>,
        to_version: Option<SemVersion>,
        applied: Vec<SemVersion>,
        ctx: MigrationContext,
    ) -> MigrationRunReport {
        self.report_from(outcome, from_version, to_version, applied, ctx.into_log())
    }

    fn report_from(
        &self,
        outcome: RunOutcome,
        from_version: Option<SemVersion>,
        to_version: Option<SemVersion>,
        applied: Vec<SemVersion>,
        statements: Vec<crate::context::ExecutedStatement>,
    ) -> MigrationRunReport {
        MigrationRunReport {
            outcome,
            from_version,
            to_version,
            applied,
            rebuild_cache: false,
            invalidate_user_sessions: false,
            statements,
            signal_errors: Vec::new(),
            elapsed: Default::default(),
        }
    }
}

/// Run one unit in its own span and check it left no expression pending
async fn run_unit(ctx: &mut MigrationContext, unit: &MigrationUnit) -> MigrationResult<()> {
    let span = info_span!("migration", version = %unit.version, description = %unit.description);
    async {
        ctx.set_current_version(Some(unit.version.clone()));
        info!("Applying migration {}", unit);
        let started = Instant::now();

        unit.migrate(ctx).await?;

        if let Some(pending) = ctx.pending_expression() {
            return Err(MigrationError::IncompleteExpression(format!(
                "migration {} returned with a {} expression that was never executed",
                unit, pending
            )));
        }

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "Applied migration {}", unit);
        Ok(())
    }
    .instrument(span)
    .await
}

async fn commit(ctx: &mut MigrationContext) -> MigrationResult<()> {
    match ctx.take_transaction() {
        Some(tx) => tx.commit().await,
        None => Err(MigrationError::Transaction("No active transaction to commit".to_string())),
    }
}

async fn rollback(ctx: &mut MigrationContext) {
    if let Some(tx) = ctx.take_transaction() {
        match tx.rollback().await {
            Ok(()) => warn!("Rolled back migration transaction"),
            Err(e) => error!("Failed to roll back migration transaction: {}", e),
        }
    }
}

/// Builder for [`MigrationRunner`]
#[derive(Default)]
pub struct MigrationRunnerBuilder {
    pool: Option<Arc<dyn DatabasePool>>,
    catalog: Option<MigrationCatalog>,
    config: Option<MigratorConfig>,
    version_store: Option<Arc<dyn VersionStore>>,
    cache_invalidation: Option<Arc<dyn CacheInvalidation>>,
    session_invalidation: Option<Arc<dyn SessionInvalidation>>,
    cancellation: Option<CancellationToken>,
}

impl MigrationRunnerBuilder {
    pub fn pool<P: DatabasePool + 'static>(mut self, pool: P) -> Self {
        self.pool = Some(Arc::new(pool));
        self
    }

    pub fn shared_pool(mut self, pool: Arc<dyn DatabasePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn catalog(mut self, catalog: MigrationCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(mut self, config: MigratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Defaults to a [`TableVersionStore`] built from the config
    pub fn version_store(mut self, store: Arc<dyn VersionStore>) -> Self {
        self.version_store = Some(store);
        self
    }

    pub fn cache_invalidation(mut self, cache: Arc<dyn CacheInvalidation>) -> Self {
        self.cache_invalidation = Some(cache);
        self
    }

    pub fn session_invalidation(mut self, sessions: Arc<dyn SessionInvalidation>) -> Self {
        self.session_invalidation = Some(sessions);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(self) -> MigrationResult<MigrationRunner> {
        let pool = self
            .pool
            .ok_or_else(|| MigrationError::Configuration("A connection pool is required".to_string()))?;
        let catalog = self
            .catalog
            .ok_or_else(|| MigrationError::Configuration("A migration catalog is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let version_store = self
            .version_store
            .unwrap_or_else(|| Arc::new(TableVersionStore::from_config(&config)));

        Ok(MigrationRunner {
            pool,
            catalog,
            syntax: config.dialect.syntax_provider(),
            config,
            version_store,
            cache_invalidation: self.cache_invalidation,
            session_invalidation: self.session_invalidation,
            cancellation: self.cancellation.unwrap_or_default(),
            state: RunnerState::Idle,
        })
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;

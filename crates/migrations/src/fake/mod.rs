//! In-memory recording backend
//!
//! [`RecordingPool`] implements the connection traits without a database. It
//! records every statement, keeps track of which statements were committed
//! and which were rolled back, and can be told to fail statements matching a
//! pattern. Useful for testing migrations and the runner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::backends::{DatabasePool, DatabaseTransaction, DatabaseValue};
use crate::error::{MigrationError, MigrationResult};
use crate::migrations::{CacheInvalidation, SessionInvalidation};

#[derive(Debug, Default)]
struct RecordingState {
    statements: Vec<String>,
    committed: Vec<String>,
    rolled_back: Vec<String>,
    fail_on: Vec<String>,
    responses: HashMap<String, String>,
    transactions_begun: usize,
    fail_begin_after: Option<usize>,
    commits: usize,
    rollbacks: usize,
}

impl RecordingState {
    fn check(&self, sql: &str) -> MigrationResult<()> {
        match self.fail_on.iter().find(|pattern| sql.contains(pattern.as_str())) {
            Some(pattern) => Err(MigrationError::execution(
                sql,
                format!("simulated failure for statement matching '{}'", pattern),
            )),
            None => Ok(()),
        }
    }

    fn response(&self, sql: &str) -> Option<String> {
        self.responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, value)| value.clone())
    }
}

/// Connection provider that records statements instead of running them
#[derive(Debug, Clone, Default)]
pub struct RecordingPool {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement containing `pattern`
    pub fn fail_on(self, pattern: &str) -> Self {
        self.lock().fail_on.push(pattern.to_string());
        self
    }

    /// Refuse to open transactions once `count` have been opened
    pub fn fail_begin_after(self, count: usize) -> Self {
        self.lock().fail_begin_after = Some(count);
        self
    }

    /// Answer scalar queries containing `pattern` with `value`
    pub fn respond_to(self, pattern: &str, value: &str) -> Self {
        self.lock().responses.insert(pattern.to_string(), value.to_string());
        self
    }

    /// Every statement executed, in order, whatever its transaction's fate
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn committed_statements(&self) -> Vec<String> {
        self.lock().committed.clone()
    }

    pub fn rolled_back_statements(&self) -> Vec<String> {
        self.lock().rolled_back.clone()
    }

    pub fn transactions_begun(&self) -> usize {
        self.lock().transactions_begun
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DatabasePool for RecordingPool {
    async fn begin_transaction(&self) -> MigrationResult<Box<dyn DatabaseTransaction>> {
        {
            let mut state = self.lock();
            if state.fail_begin_after.is_some_and(|count| state.transactions_begun >= count) {
                return Err(MigrationError::Transaction(
                    "simulated failure opening a transaction".to_string(),
                ));
            }
            state.transactions_begun += 1;
        }
        Ok(Box::new(RecordingTransaction {
            pool: self.clone(),
            pending: Vec::new(),
            finished: false,
        }))
    }

    async fn execute(&self, sql: &str, _params: &[DatabaseValue]) -> MigrationResult<u64> {
        let mut state = self.lock();
        state.check(sql)?;
        state.statements.push(sql.to_string());
        state.committed.push(sql.to_string());
        Ok(0)
    }

    async fn fetch_optional_string(
        &self,
        sql: &str,
        _params: &[DatabaseValue],
    ) -> MigrationResult<Option<String>> {
        let state = self.lock();
        state.check(sql)?;
        Ok(state.response(sql))
    }

    async fn close(&self) -> MigrationResult<()> {
        Ok(())
    }
}

/// Transaction handed out by [`RecordingPool`]
#[derive(Debug)]
pub struct RecordingTransaction {
    pool: RecordingPool,
    pending: Vec<String>,
    finished: bool,
}

#[async_trait]
impl DatabaseTransaction for RecordingTransaction {
    async fn execute(&mut self, sql: &str, _params: &[DatabaseValue]) -> MigrationResult<u64> {
        {
            let mut state = self.pool.lock();
            state.check(sql)?;
            state.statements.push(sql.to_string());
        }
        self.pending.push(sql.to_string());
        Ok(1)
    }

    async fn fetch_optional_string(
        &mut self,
        sql: &str,
        _params: &[DatabaseValue],
    ) -> MigrationResult<Option<String>> {
        let state = self.pool.lock();
        state.check(sql)?;
        Ok(state.response(sql))
    }

    async fn commit(mut self: Box<Self>) -> MigrationResult<()> {
        let pending = std::mem::take(&mut self.pending);
        let mut state = self.pool.lock();
        state.committed.extend(pending);
        state.commits += 1;
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> MigrationResult<()> {
        let pending = std::mem::take(&mut self.pending);
        let mut state = self.pool.lock();
        state.rolled_back.extend(pending);
        state.rollbacks += 1;
        self.finished = true;
        Ok(())
    }
}

impl Drop for RecordingTransaction {
    /// An abandoned transaction rolls back, like a dropped sqlx transaction
    fn drop(&mut self) {
        if !self.finished {
            let pending = std::mem::take(&mut self.pending);
            let mut state = self.pool.lock();
            state.rolled_back.extend(pending);
            state.rollbacks += 1;
        }
    }
}

/// Signal collaborator that counts how often it was asked to act
#[derive(Debug, Default)]
pub struct CountingSignals {
    cache_rebuilds: AtomicUsize,
    session_invalidations: AtomicUsize,
    fail: bool,
}

impl CountingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count each request, then report it as failed
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn cache_rebuilds(&self) -> usize {
        self.cache_rebuilds.load(Ordering::SeqCst)
    }

    pub fn session_invalidations(&self) -> usize {
        self.session_invalidations.load(Ordering::SeqCst)
    }

    fn outcome(&self, what: &str) -> MigrationResult<()> {
        if self.fail {
            Err(MigrationError::Signal(format!("simulated {} failure", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheInvalidation for CountingSignals {
    async fn rebuild_cache(&self) -> MigrationResult<()> {
        self.cache_rebuilds.fetch_add(1, Ordering::SeqCst);
        self.outcome("cache rebuild")
    }
}

#[async_trait]
impl SessionInvalidation for CountingSignals {
    async fn invalidate_all_sessions(&self) -> MigrationResult<()> {
        self.session_invalidations.fetch_add(1, Ordering::SeqCst);
        self.outcome("session invalidation")
    }
}

//! Post-commit signals
//!
//! Migration units can declare that caches must be rebuilt or that user
//! sessions must be revoked once they are committed. The runner forwards those
//! requests to these collaborators; it never performs them itself.

use async_trait::async_trait;

use super::definitions::MigrationUnit;
use crate::error::MigrationResult;

#[async_trait]
pub trait CacheInvalidation: Send + Sync {
    async fn rebuild_cache(&self) -> MigrationResult<()>;
}

#[async_trait]
pub trait SessionInvalidation: Send + Sync {
    async fn invalidate_all_sessions(&self) -> MigrationResult<()>;
}

/// Requests accumulated from committed units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSignals {
    pub rebuild_cache: bool,
    pub invalidate_user_sessions: bool,
}

impl PendingSignals {
    pub fn record(&mut self, unit: &MigrationUnit) {
        self.rebuild_cache |= unit.rebuild_cache;
        self.invalidate_user_sessions |= unit.invalidate_user_sessions;
    }

    pub fn any(&self) -> bool {
        self.rebuild_cache || self.invalidate_user_sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MigrationContext;
    use crate::migrations::Migration;
    use crate::semver::SemVersion;

    struct Noop;

    #[async_trait]
    impl Migration for Noop {
        async fn migrate(&self, _ctx: &mut MigrationContext) -> MigrationResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_flags_accumulate() {
        let mut pending = PendingSignals::default();
        assert!(!pending.any());

        pending.record(&MigrationUnit::new(SemVersion::new(1, 0, 0), "a", Noop));
        assert!(!pending.any());

        pending.record(&MigrationUnit::new(SemVersion::new(1, 1, 0), "b", Noop).rebuild_cache());
        pending.record(&MigrationUnit::new(SemVersion::new(1, 2, 0), "c", Noop));
        assert!(pending.rebuild_cache);
        assert!(!pending.invalidate_user_sessions);
    }
}

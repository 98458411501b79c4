//! Plan computation

use std::cmp::Ordering;

use super::catalog::MigrationCatalog;
use super::definitions::MigrationUnit;
use crate::semver::SemVersion;

/// Ordered units to execute in one run; never changes once computed
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    units: Vec<MigrationUnit>,
}

impl MigrationPlan {
    /// Every unit whose version is strictly above `current` by precedence,
    /// in ascending order. A fresh database (`None`) gets every unit.
    pub fn compute(catalog: &MigrationCatalog, current: Option<&SemVersion>) -> Self {
        let units = catalog
            .iter()
            .filter(|unit| match current {
                Some(current) => unit.version.compare_by_precedence(current) == Ordering::Greater,
                None => true,
            })
            .cloned()
            .collect();
        Self { units }
    }

    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Version recorded once the whole plan has run
    pub fn target_version(&self) -> Option<&SemVersion> {
        self.units.last().map(|unit| &unit.version)
    }

    pub fn versions(&self) -> Vec<SemVersion> {
        self.units.iter().map(|unit| unit.version.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MigrationContext;
    use crate::error::MigrationResult;
    use crate::migrations::Migration;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Migration for Noop {
        async fn migrate(&self, _ctx: &mut MigrationContext) -> MigrationResult<()> {
            Ok(())
        }
    }

    fn catalog(versions: &[&str]) -> MigrationCatalog {
        MigrationCatalog::new(
            versions
                .iter()
                .map(|v| MigrationUnit::new(v.parse().unwrap(), v, Noop)),
        )
        .unwrap()
    }

    fn versions(plan: &MigrationPlan) -> Vec<String> {
        plan.units().iter().map(|u| u.version.to_string()).collect()
    }

    #[test]
    fn test_plan_selects_versions_above_current() {
        let catalog = catalog(&["1.0.0", "1.1.0", "2.0.0"]);
        let plan = MigrationPlan::compute(&catalog, Some(&SemVersion::new(1, 0, 0)));
        assert_eq!(versions(&plan), vec!["1.1.0", "2.0.0"]);
        assert_eq!(plan.target_version(), Some(&SemVersion::new(2, 0, 0)));
    }

    #[test]
    fn test_plan_is_empty_at_highest_version() {
        let catalog = catalog(&["1.0.0", "1.1.0", "2.0.0"]);
        let plan = MigrationPlan::compute(&catalog, Some(&SemVersion::new(2, 0, 0)));
        assert!(plan.is_empty());
        assert_eq!(plan.target_version(), None);
    }

    #[test]
    fn test_fresh_database_gets_everything() {
        let catalog = catalog(&["2.0.0", "1.0.0"]);
        let plan = MigrationPlan::compute(&catalog, None);
        assert_eq!(versions(&plan), vec!["1.0.0", "2.0.0"]);
    }

    #[test]
    fn test_gaps_and_prereleases() {
        let catalog = catalog(&["1.0.0", "1.5.0-beta", "1.5.0", "3.0.0"]);
        let plan = MigrationPlan::compute(&catalog, Some(&SemVersion::new(1, 2, 0)));
        assert_eq!(versions(&plan), vec!["1.5.0-beta", "1.5.0", "3.0.0"]);

        let current: SemVersion = "1.5.0-beta".parse().unwrap();
        let plan = MigrationPlan::compute(&catalog, Some(&current));
        assert_eq!(versions(&plan), vec!["1.5.0", "3.0.0"]);
    }

    #[test]
    fn test_build_metadata_does_not_make_a_version_newer() {
        let catalog = catalog(&["1.0.0+build.5"]);
        let plan = MigrationPlan::compute(&catalog, Some(&SemVersion::new(1, 0, 0)));
        assert!(plan.is_empty());
    }
}

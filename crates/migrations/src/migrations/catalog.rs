//! Migration catalog
//!
//! The set of known migration units keyed by target version, built from an
//! explicit registration list.

use std::collections::BTreeMap;

use super::definitions::MigrationUnit;
use crate::error::{MigrationError, MigrationResult};
use crate::semver::SemVersion;

#[derive(Debug, Clone, Default)]
pub struct MigrationCatalog {
    units: BTreeMap<SemVersion, MigrationUnit>,
}

impl MigrationCatalog {
    /// Build a catalog, rejecting two units with the same version
    pub fn new<I>(units: I) -> MigrationResult<Self>
    where
        I: IntoIterator<Item = MigrationUnit>,
    {
        let mut builder = Self::builder();
        for unit in units {
            builder = builder.add(unit);
        }
        builder.build()
    }

    pub fn builder() -> MigrationCatalogBuilder {
        MigrationCatalogBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn highest_version(&self) -> Option<&SemVersion> {
        self.units.keys().next_back()
    }

    pub fn get(&self, version: &SemVersion) -> Option<&MigrationUnit> {
        self.units.get(version)
    }

    /// Units in ascending version order
    pub fn iter(&self) -> impl Iterator<Item = &MigrationUnit> {
        self.units.values()
    }
}

impl<'a> IntoIterator for &'a MigrationCatalog {
    type Item = &'a MigrationUnit;
    type IntoIter = std::collections::btree_map::Values<'a, SemVersion, MigrationUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.values()
    }
}

/// Collects units; duplicates are reported by [`build`](Self::build)
#[derive(Debug, Default)]
pub struct MigrationCatalogBuilder {
    units: Vec<MigrationUnit>,
}

impl MigrationCatalogBuilder {
    pub fn add(mut self, unit: MigrationUnit) -> Self {
        self.units.push(unit);
        self
    }

    pub fn build(self) -> MigrationResult<MigrationCatalog> {
        let mut units = BTreeMap::new();
        for unit in self.units {
            if units.contains_key(&unit.version) {
                return Err(MigrationError::DuplicateVersion(unit.version));
            }
            units.insert(unit.version.clone(), unit);
        }
        Ok(MigrationCatalog { units })
    }
}

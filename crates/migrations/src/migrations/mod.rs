//! Migration System
//!
//! Catalog, planning, version bookkeeping and the transactional runner.

pub mod catalog;
pub mod definitions;
pub mod plan;
pub mod runner;
pub mod signals;
pub mod version_store;

pub use catalog::*;
pub use definitions::*;
pub use plan::*;
pub use runner::*;
pub use signals::*;
pub use version_store::*;

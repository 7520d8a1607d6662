//! Validation functionality
//!
//! Provides the hierarchy resolver that orders manifest rows into levels and
//! rejects orphaned or cyclic parent references.

pub mod hierarchy;

pub use hierarchy::{HierarchyLevel, HierarchyResolution, HierarchyResolver, OrphanRow};

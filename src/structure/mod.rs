//! Market structure: ladder groups assembled from metadata snapshots.

pub mod builder;
pub mod group;
pub mod overrides;

pub use builder::{BuildReport, StructureBuilder};
pub use group::{compute_coverage, derive_step, ladder_is_consistent, Coverage, RangeGroup};
pub use overrides::{OverrideKind, OverrideRule, OverrideTable};

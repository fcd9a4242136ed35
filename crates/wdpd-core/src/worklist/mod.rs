//! Worklists and progress reports built from the enriched dataset.

pub mod aggregator;
pub mod blocks;
pub mod categories;
pub mod namespaces;
pub mod progress;
pub mod reports;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{actor_rollup, ores_worklist, ActorClass, ActorRow, OresRow};
pub use blocks::BlockWindow;
pub use categories::{CategoryWorklists, EditFamily};
pub use namespaces::OtherNamespaceWorklists;
pub use progress::{compile_patrol_progress, DelayStats, PatrolProgressRow, PatrolSummary, ProgressPair};
pub use reports::WorklistWindow;

//! Patrol dashboard core library for Wikidata recent changes.
//!
//! This crate turns a 31-day snapshot of recent changes into patrol worklists.
//! It parses edit summaries and classifies them into broad categories. It
//! then joins quality-model scores and aggregates per-actor and per-category
//! tables, and reconciles the published TSV artifact set against the current
//! dataset.

pub mod artifacts;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod models;
pub mod publish;
pub mod source;
pub mod store;
pub mod taxonomy;
pub mod worklist;

pub use artifacts::{ArtifactStore, ReconcileReport, Reconciler, Table};
pub use classify::{classify, CommentParser};
pub use config::{OresThresholds, PipelineConfig};
pub use enrich::{enrich, enrich_edits, ScoreJoiner};
pub use errors::{WdpdError, WdpdResult};
pub use publish::{publish_all, run, PublishInput, RunReport};
pub use source::{DataSource, MemorySource, ReplicaSnapshot};
pub use store::ArtifactIndex;
pub use taxonomy::ActionTaxonomy;
pub use worklist::{actor_rollup, compile_patrol_progress, ores_worklist, PatrolSummary};

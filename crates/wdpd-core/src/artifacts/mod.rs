//! Category-keyed report artifacts: rendering, storage and reconciliation.

pub mod family;
pub mod fs_store;
pub mod reconciler;
pub mod table;

pub use family::{sanitize_category, ArtifactFamily, ALL_FAMILIES};
pub use fs_store::{content_digest, ArtifactStore, WrittenPair};
pub use reconciler::{CategoryFailure, ReconcileReport, Reconciler};
pub use table::{RenderMode, Table};

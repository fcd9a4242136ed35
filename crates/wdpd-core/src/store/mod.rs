pub mod artifact_index;
pub mod schema;

pub use artifact_index::{ArtifactIndex, ArtifactRecord};

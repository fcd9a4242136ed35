//! Error types for the patrol dashboard core library.

/// Top-level error enum for the patrol dashboard core library.
///
/// Parse misses and score-join misses are not errors; they surface as `None`
/// fields on the enriched records.
#[derive(Debug, thiserror::Error)]
pub enum WdpdError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Timestamp error: {0}")]
    Timestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type WdpdResult<T> = Result<T, WdpdError>;

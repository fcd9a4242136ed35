//! Pipeline configuration loaded from TOML.
//!
//! Every field has a default, so a partial file (or none at all) still
//! produces a runnable configuration. Resolution order for the artifact root:
//! 1. `WDPD_DATA_PATH` environment variable
//! 2. `data_path` in the TOML file
//! 3. compiled default

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::{WdpdError, WdpdResult};

pub const DATA_PATH_ENV: &str = "WDPD_DATA_PATH";

const DEFAULT_DATA_PATH: &str = "/data/project/wdpd/data/";

/// Edit-count and mean-damaging-score thresholds for one actor class of the
/// ML-score worklist. Raising either trades recall for precision. Both
/// fields are required once a class table is present.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct OresThresholds {
    pub min_score: f64,
    pub min_edits: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OresConfig {
    pub anonymous: OresThresholds,
    pub registered: OresThresholds,
}

impl Default for OresConfig {
    fn default() -> Self {
        Self {
            anonymous: OresThresholds {
                min_score: 0.9,
                min_edits: 10,
            },
            registered: OresThresholds {
                min_score: 0.7,
                min_edits: 10,
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of every artifact written by a run.
    pub data_path: PathBuf,
    /// Sidecar artifact index, relative to `data_path`.
    pub index_file: String,
    /// Rows kept in `head` artifacts.
    pub head_limit: usize,
    pub top_patrollers_head_limit: usize,
    /// Named score models joined onto every edit, in column order.
    pub models: Vec<String>,
    pub reverted_tag: String,
    pub suggested_edit_tag: String,
    /// Items with a numeric id at or above this are left out of the
    /// many-revisions list (fresh creations).
    pub max_qid_num: Option<i64>,
    pub min_entity_usage: f64,
    pub taxonomy_path: Option<PathBuf>,
    pub ores: OresConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            index_file: "artifact-index.sqlite3".to_string(),
            head_limit: 50,
            top_patrollers_head_limit: 20,
            models: vec!["damaging".to_string(), "goodfaith".to_string()],
            reverted_tag: "mw-reverted".to_string(),
            suggested_edit_tag: "apps-suggested-edits".to_string(),
            max_qid_num: Some(107_000_000),
            min_entity_usage: 500.0,
            taxonomy_path: None,
            ores: OresConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> WdpdResult<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given and present; fall back to defaults with a warning
    /// when the file is missing. The environment override is applied last.
    pub fn load(path: Option<&Path>) -> WdpdResult<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                let config = Self::from_toml_str(&content)?;
                info!(path = %p.display(), "loaded pipeline config");
                config
            }
            Some(p) => {
                warn!(path = %p.display(), "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        if let Ok(data_path) = std::env::var(DATA_PATH_ENV) {
            if !data_path.trim().is_empty() {
                config.data_path = PathBuf::from(data_path);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_path.join(&self.index_file)
    }

    fn validate(&self) -> WdpdResult<()> {
        if self.head_limit == 0 {
            return Err(WdpdError::Config("head_limit must be positive".to_string()));
        }
        if self.models.is_empty() {
            return Err(WdpdError::Config("at least one score model is required".to_string()));
        }
        for (class, t) in [("anonymous", self.ores.anonymous), ("registered", self.ores.registered)] {
            if !(0.0..=1.0).contains(&t.min_score) {
                return Err(WdpdError::Config(format!(
                    "ores.{class}.min_score {} is outside [0, 1]",
                    t.min_score
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

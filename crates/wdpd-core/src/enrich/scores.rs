//! Attach model scores to revisions, restricted to active model versions.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::errors::WdpdResult;
use crate::models::{ModelScore, ScoreRow};
use crate::source::ScoreSource;

/// Per-revision scores of the active version(s) of each named model.
///
/// A revision without a row under an active version simply has no entry for
/// that model: absence is never reported as a probability of 0.
#[derive(Debug, Default)]
pub struct ScoreJoiner {
    active: IndexMap<String, Vec<i64>>,
    by_revision: HashMap<i64, BTreeMap<String, ModelScore>>,
    collisions: usize,
}

impl ScoreJoiner {
    /// Resolve active versions for `models` and index the source's score rows.
    /// A resolver failure aborts; an unknown model just contributes no scores.
    pub fn resolve(source: &dyn ScoreSource, models: &[String]) -> WdpdResult<Self> {
        let mut active = IndexMap::new();
        for model in models {
            let ids = source.current_model_ids(model)?;
            if ids.is_empty() {
                info!(model = %model, "no active model version; scores will be absent");
            }
            active.insert(model.clone(), ids);
        }
        let rows = source.score_rows()?;
        Ok(Self::from_rows(active, &rows))
    }

    /// Build from already-resolved active versions. When several active
    /// versions of one model scored the same revision, the row of the
    /// highest version id wins.
    pub fn from_rows(active: IndexMap<String, Vec<i64>>, rows: &[ScoreRow]) -> Self {
        let model_of: HashMap<i64, &str> = active
            .iter()
            .flat_map(|(name, ids)| ids.iter().map(move |id| (*id, name.as_str())))
            .collect();

        let mut by_revision: HashMap<i64, BTreeMap<String, ModelScore>> = HashMap::new();
        let mut collisions = 0usize;
        let mut retired = 0usize;

        for row in rows {
            let Some(model) = model_of.get(&row.model_id) else {
                retired += 1;
                continue;
            };
            let score = ModelScore {
                probability: row.probability,
                predicted: row.is_predicted,
                model_id: row.model_id,
            };
            let scores = by_revision.entry(row.revision_id).or_default();
            match scores.get(*model) {
                Some(existing) if existing.model_id == row.model_id => {}
                Some(existing) => {
                    collisions += 1;
                    if row.model_id > existing.model_id {
                        scores.insert(model.to_string(), score);
                    }
                }
                None => {
                    scores.insert(model.to_string(), score);
                }
            }
        }

        if collisions > 0 {
            debug!(collisions, "revisions scored by more than one active model version");
        }
        debug!(
            revisions = by_revision.len(),
            skipped = retired,
            "indexed active-model scores"
        );

        Self {
            active,
            by_revision,
            collisions,
        }
    }

    /// Scores for one revision, keyed by model name.
    pub fn attach(&self, revision_id: i64) -> BTreeMap<String, ModelScore> {
        self.by_revision
            .get(&revision_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Model names in configured order.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn active_ids(&self, model: &str) -> &[i64] {
        self.active.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

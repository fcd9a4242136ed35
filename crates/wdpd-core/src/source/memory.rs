//! In-memory data source for callers that already hold the records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::errors::WdpdResult;
use crate::models::{BlockLogEntry, ChangeTag, CurrentBlock, Edit, NamespacedEdit, PatrolEvent, ScoreRow};
use crate::source::{
    BlockSource, ChangeTagSource, EditSource, OtherNamespaceSource, PatrolLogSource, ScoreSource,
};

#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    pub edits: Vec<Edit>,
    pub change_tags: Vec<ChangeTag>,
    pub score_rows: Vec<ScoreRow>,
    /// Model name -> active version ids.
    pub current_models: HashMap<String, Vec<i64>>,
    pub patrol_events: Vec<PatrolEvent>,
    pub other_namespace_edits: Vec<NamespacedEdit>,
    pub translation_pages: Vec<String>,
    pub block_log: Vec<BlockLogEntry>,
    pub current_blocks: Vec<CurrentBlock>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current_model(mut self, name: &str, ids: &[i64]) -> Self {
        self.current_models.insert(name.to_string(), ids.to_vec());
        self
    }
}

impl EditSource for MemorySource {
    fn edits(&self) -> WdpdResult<Vec<Edit>> {
        Ok(self.edits.clone())
    }
}

impl ChangeTagSource for MemorySource {
    fn change_tags(&self) -> WdpdResult<Vec<ChangeTag>> {
        Ok(self.change_tags.clone())
    }
}

impl ScoreSource for MemorySource {
    fn score_rows(&self) -> WdpdResult<Vec<ScoreRow>> {
        Ok(self.score_rows.clone())
    }

    fn current_model_ids(&self, model_name: &str) -> WdpdResult<Vec<i64>> {
        Ok(self
            .current_models
            .get(model_name)
            .cloned()
            .unwrap_or_default())
    }
}

impl PatrolLogSource for MemorySource {
    fn patrol_events(&self, since: DateTime<Utc>) -> WdpdResult<Vec<PatrolEvent>> {
        let mut events: Vec<PatrolEvent> = self
            .patrol_events
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.timestamp, e.log_id));
        Ok(events)
    }
}

impl OtherNamespaceSource for MemorySource {
    fn other_namespace_edits(&self) -> WdpdResult<Vec<NamespacedEdit>> {
        Ok(self.other_namespace_edits.clone())
    }

    fn translation_pages(&self) -> WdpdResult<Vec<String>> {
        Ok(self.translation_pages.clone())
    }
}

impl BlockSource for MemorySource {
    fn block_log(&self) -> WdpdResult<Vec<BlockLogEntry>> {
        Ok(self.block_log.clone())
    }

    fn current_blocks(&self) -> WdpdResult<Vec<CurrentBlock>> {
        Ok(self.current_blocks.clone())
    }
}

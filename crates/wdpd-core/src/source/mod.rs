//! Upstream collaborators: where edits, tags, scores and patrol events come
//! from. All calls are synchronous; a failure here aborts the run before any
//! classification happens.

pub mod memory;
pub mod replica;

use chrono::{DateTime, Utc};

use crate::errors::WdpdResult;
use crate::models::{BlockLogEntry, ChangeTag, CurrentBlock, Edit, NamespacedEdit, PatrolEvent, ScoreRow};

pub use memory::MemorySource;
pub use replica::ReplicaSnapshot;

/// Patrol-eligible main-namespace edits.
pub trait EditSource {
    fn edits(&self) -> WdpdResult<Vec<Edit>>;
}

pub trait ChangeTagSource {
    fn change_tags(&self) -> WdpdResult<Vec<ChangeTag>>;
}

/// Raw model scores plus the resolver for currently active model versions.
pub trait ScoreSource {
    fn score_rows(&self) -> WdpdResult<Vec<ScoreRow>>;

    /// Version ids currently marked active for `model_name`. More than one
    /// may be active during a rollout.
    fn current_model_ids(&self, model_name: &str) -> WdpdResult<Vec<i64>>;
}

pub trait PatrolLogSource {
    /// Patrol actions logged at or after `since`, oldest first.
    fn patrol_events(&self, since: DateTime<Utc>) -> WdpdResult<Vec<PatrolEvent>>;
}

/// Patrol-eligible changes outside the main namespace.
pub trait OtherNamespaceSource {
    fn other_namespace_edits(&self) -> WdpdResult<Vec<NamespacedEdit>>;

    /// Translation pages (`<translatable page>/<lang>`) with unpatrolled
    /// translation-unit edits.
    fn translation_pages(&self) -> WdpdResult<Vec<String>>;
}

pub trait BlockSource {
    /// Every `block` entry of the block log.
    fn block_log(&self) -> WdpdResult<Vec<BlockLogEntry>>;

    fn current_blocks(&self) -> WdpdResult<Vec<CurrentBlock>>;
}

/// Everything one run reads.
pub trait DataSource:
    EditSource + ChangeTagSource + ScoreSource + PatrolLogSource + OtherNamespaceSource + BlockSource
{
}

impl<T> DataSource for T where
    T: EditSource
        + ChangeTagSource
        + ScoreSource
        + PatrolLogSource
        + OtherNamespaceSource
        + BlockSource
{
}

//! Keep a family's artifacts in 1:1 correspondence with the category values
//! observed in the current data.
//!
//! One pass per family:
//! 1. read the existing categories from the artifact index,
//! 2. delete the full/head pair of every category no longer observed, and
//!    drop its index row only once both files are gone,
//! 3. regenerate every observed category unconditionally,
//! 4. sweep untracked files out of the family directory.
//!
//! A failure in one category is logged and recorded; the pass continues with
//! the next one. Runs against the same data root must not overlap: the pass
//! lists then mutates the directory and does no locking.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts::family::{sanitize_category, ArtifactFamily};
use crate::artifacts::fs_store::ArtifactStore;
use crate::artifacts::table::Table;
use crate::errors::WdpdResult;
use crate::store::{ArtifactIndex, ArtifactRecord};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryFailure {
    pub category: String,
    pub error: String,
}

/// Outcome of one family pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub family: String,
    /// Categories that had no artifact before this pass.
    pub created: Vec<String>,
    /// Regenerated categories whose content differs from the previous run.
    pub changed: Vec<String>,
    /// Regenerated categories with byte-identical content.
    pub unchanged: usize,
    pub deleted: Vec<String>,
    pub swept: usize,
    pub failures: Vec<CategoryFailure>,
}

impl ReconcileReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    fn fail(&mut self, category: &str, error: impl ToString) {
        self.failures.push(CategoryFailure {
            category: category.to_string(),
            error: error.to_string(),
        });
    }
}

pub struct Reconciler<'a> {
    store: &'a ArtifactStore,
    index: &'a ArtifactIndex,
    now: DateTime<Utc>,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a ArtifactStore, index: &'a ArtifactIndex, now: DateTime<Utc>) -> Self {
        Self { store, index, now }
    }

    /// Reconcile `family` against `current_values`, calling `generate` once
    /// per distinct value. Only a failure to read the index is returned as
    /// an error; everything else is recorded per category in the report.
    pub fn reconcile<I, S, F>(
        &self,
        family: &ArtifactFamily,
        current_values: I,
        mut generate: F,
    ) -> WdpdResult<ReconcileReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&str) -> WdpdResult<Table>,
    {
        let current: IndexSet<String> = current_values.into_iter().map(Into::into).collect();
        let existing: HashMap<String, ArtifactRecord> = self
            .index
            .list(family.name)?
            .into_iter()
            .map(|r| (r.category.clone(), r))
            .collect();

        let mut report = ReconcileReport {
            family: family.name.to_string(),
            ..ReconcileReport::default()
        };

        // Stale categories: paired delete, then forget.
        let mut stale: Vec<&ArtifactRecord> = existing
            .values()
            .filter(|r| !current.contains(&r.category))
            .collect();
        stale.sort_by(|a, b| a.category.cmp(&b.category));
        for record in stale {
            let outcome = self
                .store
                .delete_pair(&record.full_path, &record.head_path)
                .and_then(|()| self.index.remove(family.name, &record.category));
            match outcome {
                Ok(_) => {
                    debug!(family = family.name, category = %record.category, "deleted stale artifact");
                    report.deleted.push(record.category.clone());
                }
                Err(e) => {
                    warn!(family = family.name, category = %record.category, error = %e, "cannot delete stale artifact");
                    report.fail(&record.category, e);
                }
            }
        }

        // Current categories: always regenerate. A category that already owns
        // its file name keeps it over a newcomer sanitizing to the same name.
        let mut claimed_names: HashMap<String, &str> = HashMap::new();
        for category in current.iter().filter(|c| existing.contains_key(c.as_str())) {
            claimed_names.entry(sanitize_category(category)).or_insert(category);
        }
        for category in &current {
            let owner = *claimed_names
                .entry(sanitize_category(category))
                .or_insert(category);
            if owner != category.as_str() {
                let msg = format!("file name collides with category {owner:?}");
                warn!(family = family.name, category = %category, "{msg}");
                report.fail(category, msg);
                continue;
            }

            let table = match generate(category.as_str()) {
                Ok(table) => table,
                Err(e) => {
                    warn!(family = family.name, category = %category, error = %e, "artifact generation failed");
                    report.fail(category, e);
                    continue;
                }
            };
            let written = match self.store.write_family_pair(family, category, &table) {
                Ok(written) => written,
                Err(e) => {
                    warn!(family = family.name, category = %category, error = %e, "artifact write failed");
                    report.fail(category, e);
                    continue;
                }
            };

            let previous = existing.get(category.as_str());
            let record = ArtifactRecord {
                family: family.name.to_string(),
                category: category.clone(),
                full_path: written.full_path,
                head_path: written.head_path,
                digest: written.digest,
                row_count: written.row_count,
                created_at: previous.map_or(self.now, |p| p.created_at),
                updated_at: self.now,
            };
            if let Err(e) = self.index.upsert(&record) {
                warn!(family = family.name, category = %category, error = %e, "cannot index artifact");
                report.fail(category, e);
                continue;
            }
            match previous {
                None => report.created.push(category.clone()),
                Some(p) if p.digest != record.digest => report.changed.push(category.clone()),
                Some(_) => report.unchanged += 1,
            }
        }

        report.swept = self.sweep(family);

        info!(
            family = family.name,
            current = current.len(),
            created = report.created.len(),
            changed = report.changed.len(),
            unchanged = report.unchanged,
            deleted = report.deleted.len(),
            swept = report.swept,
            failures = report.failure_count(),
            "reconciled artifact family"
        );
        Ok(report)
    }

    fn sweep(&self, family: &ArtifactFamily) -> usize {
        let known: HashSet<PathBuf> = match self.index.list(family.name) {
            Ok(records) => records
                .into_iter()
                .flat_map(|r| [r.full_path, r.head_path])
                .collect(),
            Err(e) => {
                warn!(family = family.name, error = %e, "cannot list index; skipping sweep");
                return 0;
            }
        };
        self.store.sweep(family, &known)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

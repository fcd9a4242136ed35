//! Unpatrolled changes outside the main namespace, one worklist per
//! namespace name.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use crate::artifacts::table::Table;
use crate::models::{format_mw_timestamp, NamespacedEdit};

/// Namespaces patrolled through their own tooling.
pub const SKIPPED_NAMESPACES: [&str; 2] = ["Topic", "Translations"];

pub struct OtherNamespaceWorklists<'d> {
    buckets: IndexMap<String, Vec<&'d NamespacedEdit>>,
}

impl<'d> OtherNamespaceWorklists<'d> {
    /// Keep unpatrolled changes with a revision, leave out the skipped
    /// namespaces and edits to pages listed in `translation_pages`.
    pub fn new(edits: &'d [NamespacedEdit], translation_pages: &[String]) -> Self {
        let translations: HashSet<&str> = translation_pages.iter().map(String::as_str).collect();
        let mut buckets: IndexMap<String, Vec<&'d NamespacedEdit>> = IndexMap::new();
        for e in edits {
            if e.edit.is_patrolled()
                || e.edit.revision_id == 0
                || SKIPPED_NAMESPACES.contains(&e.namespace.as_str())
                || translations.contains(e.full_title().as_str())
            {
                continue;
            }
            buckets.entry(e.namespace.clone()).or_default().push(e);
        }
        Self { buckets }
    }

    /// Namespaces with at least one listed change, in first-seen order.
    pub fn values(&self) -> IndexSet<String> {
        self.buckets.keys().cloned().collect()
    }

    pub fn table(&self, namespace: &str) -> Table {
        let mut table = Table::new(&[
            "rc_id",
            "rc_timestamp",
            "rc_title",
            "rc_this_oldid",
            "actor_name",
            "namespace",
            "rc_source",
        ]);
        for e in self.buckets.get(namespace).into_iter().flatten() {
            table.push(vec![
                e.edit.rc_id.to_string(),
                format_mw_timestamp(&e.edit.timestamp),
                e.edit.title.clone(),
                e.edit.revision_id.to_string(),
                e.edit.actor.name.clone(),
                e.namespace.clone(),
                e.edit.source.as_str().to_string(),
            ]);
        }
        table
    }
}

//! Change-tag lookups.

use std::collections::{HashMap, HashSet};

use crate::models::ChangeTag;

/// Tag names per recent-change id.
#[derive(Debug, Default)]
pub struct TagIndex {
    by_rc: HashMap<i64, HashSet<String>>,
}

impl TagIndex {
    pub fn new(tags: &[ChangeTag]) -> Self {
        let mut by_rc: HashMap<i64, HashSet<String>> = HashMap::new();
        for tag in tags {
            by_rc.entry(tag.rc_id).or_default().insert(tag.name.clone());
        }
        Self { by_rc }
    }

    pub fn has(&self, rc_id: i64, tag: &str) -> bool {
        self.by_rc.get(&rc_id).is_some_and(|names| names.contains(tag))
    }
}

/// Tag usage counts, most frequent first; equal counts sort by name.
pub fn tag_frequencies(tags: &[ChangeTag]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tag in tags {
        *counts.entry(tag.name.as_str()).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, n)| (name.to_string(), n))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

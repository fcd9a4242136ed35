//! Plain (non-reconciled) report tables.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::artifacts::table::{fixed, Table};
use crate::models::{format_mw_timestamp, BroadCategory, EnrichedEdit, EntityUsage, PatrolEvent, SourceKind};

/// Edit subsets with their own actor worklist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorklistWindow {
    /// Since midnight UTC.
    Today,
    ThreeDays,
    SevenDays,
    FourteenDays,
    /// The full 31-day replica window.
    All,
    /// Edits made through the suggested-edits app feature, any age.
    SuggestedEdit,
}

impl WorklistWindow {
    pub const ALL: [WorklistWindow; 6] = [
        WorklistWindow::Today,
        WorklistWindow::ThreeDays,
        WorklistWindow::SevenDays,
        WorklistWindow::FourteenDays,
        WorklistWindow::All,
        WorklistWindow::SuggestedEdit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WorklistWindow::Today => "today",
            WorklistWindow::ThreeDays => "3d",
            WorklistWindow::SevenDays => "7d",
            WorklistWindow::FourteenDays => "14d",
            WorklistWindow::All => "all",
            WorklistWindow::SuggestedEdit => "suggested-edit",
        }
    }

    pub fn includes(self, edit: &EnrichedEdit, now: DateTime<Utc>) -> bool {
        let since = |days: i64| edit.edit.timestamp >= now - Duration::days(days);
        match self {
            WorklistWindow::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .is_some_and(|midnight| edit.edit.timestamp >= midnight.and_utc()),
            WorklistWindow::ThreeDays => since(3),
            WorklistWindow::SevenDays => since(7),
            WorklistWindow::FourteenDays => since(14),
            WorklistWindow::All => since(31),
            WorklistWindow::SuggestedEdit => edit.suggested_edit,
        }
    }
}

/// Unpatrolled revision counts per item, most edited first. Items whose
/// numeric id is not below `max_qid_num` are recent creations and left out.
pub fn items_with_many_revisions(edits: &[EnrichedEdit], max_qid_num: Option<i64>) -> Table {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for e in edits.iter().filter(|e| e.is_unpatrolled()) {
        if let Some(max) = max_qid_num {
            if !e.edit.num_title().is_some_and(|n| n < max) {
                continue;
            }
        }
        *counts.entry(e.edit.title.as_str()).or_default() += 1;
    }
    counted_table(counts, "rc_title", "edits")
}

/// Unpatrolled page creations per actor.
pub fn users_with_many_creations(edits: &[EnrichedEdit]) -> Table {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for e in edits
        .iter()
        .filter(|e| e.is_unpatrolled() && e.edit.source != SourceKind::Edit)
    {
        *counts.entry(e.edit.actor.name.as_str()).or_default() += 1;
    }
    counted_table(counts, "actor_name", "creations")
}

/// Items from the usage toplist (at least `min_usage` uses) that have
/// unpatrolled edits, most used first.
pub fn highly_used_items(edits: &[EnrichedEdit], toplist: &[EntityUsage], min_usage: f64) -> Table {
    let usage: HashMap<&str, f64> = toplist
        .iter()
        .filter(|u| u.usage_count >= min_usage)
        .map(|u| (u.qid.as_str(), u.usage_count))
        .collect();

    let mut counts: HashMap<&str, (f64, usize)> = HashMap::new();
    for e in edits.iter().filter(|e| e.is_unpatrolled()) {
        if let Some(u) = usage.get(e.edit.title.as_str()) {
            counts.entry(e.edit.title.as_str()).or_insert((*u, 0)).1 += 1;
        }
    }
    let mut rows: Vec<(&str, f64, usize)> = counts.into_iter().map(|(q, (u, n))| (q, u, n)).collect();
    rows.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| b.2.cmp(&a.2))
            .then_with(|| a.0.cmp(b.0))
    });

    let mut table = Table::new(&["rc_title", "entity_usage_count", "edits"]);
    for (qid, usage_count, n) in rows {
        table.push(vec![qid.to_string(), usage_count.to_string(), n.to_string()]);
    }
    table
}

/// Edits whose summary maps to no leaf category.
pub fn uncategorizable_edits(edits: &[EnrichedEdit]) -> Table {
    let mut table = Table::new(&["rc_id", "rc_timestamp", "rc_title", "rc_this_oldid", "actor_name"]);
    for e in edits.iter().filter(|e| e.category == BroadCategory::NoCat) {
        table.push(vec![
            e.edit.rc_id.to_string(),
            format_mw_timestamp(&e.edit.timestamp),
            e.edit.title.clone(),
            e.edit.revision_id.to_string(),
            e.edit.actor.name.clone(),
        ]);
    }
    table
}

/// Patrol counts per patroller on revisions inside the dataset, with each
/// patroller's share in percent (one decimal).
pub fn top_patrollers(edits: &[EnrichedEdit], events: &[PatrolEvent]) -> Table {
    let mut table = Table::new(&["actor_name", "patrols", "patrols_relative"]);
    let Some(min_revision) = edits.iter().map(|e| e.edit.revision_id).min() else {
        return table;
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for event in events.iter().filter(|ev| ev.revision_id >= min_revision) {
        *counts.entry(event.actor_name.as_str()).or_default() += 1;
    }
    let total: usize = counts.values().sum();
    let mut rows: Vec<(&str, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    for (name, n) in rows {
        let share = n as f64 / total as f64 * 100.0;
        table.push(vec![name.to_string(), n.to_string(), fixed(share, 1)]);
    }
    table
}

/// Items linked from the requests-for-deletion page that have changes in
/// the dataset: share of patrolled changes and change count, by title.
pub fn rfd_linked_items(edits: &[EnrichedEdit], rfd_links: &[String]) -> Table {
    let links: HashSet<&str> = rfd_links.iter().map(String::as_str).collect();
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for e in edits.iter().filter(|e| links.contains(e.edit.title.as_str())) {
        let entry = counts.entry(e.edit.title.as_str()).or_default();
        entry.0 += usize::from(e.edit.is_patrolled());
        entry.1 += 1;
    }

    let mut table = Table::new(&["rc_title", "rc_patrolled", "cnt"]);
    for (title, (patrolled, n)) in counts {
        table.push(vec![
            title.to_string(),
            fixed(patrolled as f64 / n as f64, 3),
            n.to_string(),
        ]);
    }
    table
}

/// Tag name and usage count.
pub fn change_tags_table(frequencies: &[(String, usize)]) -> Table {
    let mut table = Table::new(&["ctd_name", "count"]);
    for (name, n) in frequencies {
        table.push(vec![name.clone(), n.to_string()]);
    }
    table
}

fn counted_table(counts: HashMap<&str, usize>, key: &str, value: &str) -> Table {
    let mut rows: Vec<(&str, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let mut table = Table::new(&[key, value]);
    for (k, n) in rows {
        table.push(vec![k.to_string(), n.to_string()]);
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_mw_timestamp;
    use crate::worklist::testing::{enriched, with_comment};

    #[test]
    fn windows_filter_by_age() {
        let e = enriched(1, "A", false); // 2024-03-01 12:00
        let now = parse_mw_timestamp("20240305120000").unwrap();
        assert!(!WorklistWindow::Today.includes(&e, now));
        assert!(!WorklistWindow::ThreeDays.includes(&e, now));
        assert!(WorklistWindow::SevenDays.includes(&e, now));
        assert!(WorklistWindow::All.includes(&e, now));
        assert!(!WorklistWindow::SuggestedEdit.includes(&e, now));

        let same_day = parse_mw_timestamp("20240301230000").unwrap();
        assert!(WorklistWindow::Today.includes(&e, same_day));
    }

    #[test]
    fn many_revisions_respects_qid_cap() {
        let mut edits = vec![enriched(1, "A", false), enriched(1, "B", false), enriched(2, "A", false)];
        edits[2].edit.title = "Q200000000".to_string();
        let table = items_with_many_revisions(&edits, Some(107_000_000));
        assert_eq!(table.render(None), "rc_title\tedits\nQ1\t2\n");
        assert_eq!(items_with_many_revisions(&edits, None).len(), 2);
    }

    #[test]
    fn creations_exclude_plain_edits() {
        let mut edits = vec![enriched(1, "A", false), enriched(2, "B", false), enriched(3, "B", true)];
        edits[1].edit.source = SourceKind::New;
        edits[2].edit.source = SourceKind::New;
        assert_eq!(
            users_with_many_creations(&edits).render(None),
            "actor_name\tcreations\nB\t1\n"
        );
    }

    #[test]
    fn highly_used_items_join_toplist() {
        let edits = vec![enriched(1, "A", false), enriched(1, "B", false), enriched(2, "A", false)];
        let toplist = vec![
            EntityUsage { qid: "Q1".to_string(), usage_count: 900.0 },
            EntityUsage { qid: "Q2".to_string(), usage_count: 100.0 },
        ];
        let table = highly_used_items(&edits, &toplist, 500.0);
        assert_eq!(table.rows(), &[vec!["Q1".to_string(), "900".to_string(), "2".to_string()]]);
    }

    #[test]
    fn uncategorizable_lists_no_cat_only() {
        let edits = vec![
            with_comment(enriched(1, "A", false), "/* wbsetlabel-add:1|de */ x"),
            with_comment(enriched(2, "A", false), "hello"),
        ];
        let table = uncategorizable_edits(&edits);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0][0], "2");
    }

    #[test]
    fn rfd_links_report_patrolled_share() {
        let edits = vec![
            enriched(1, "A", true),
            enriched(1, "B", false),
            enriched(1, "C", false),
            enriched(2, "A", false),
            enriched(3, "A", true),
        ];
        let links = vec!["Q1".to_string(), "Q3".to_string(), "Q9".to_string()];
        assert_eq!(
            rfd_linked_items(&edits, &links).render(None),
            "rc_title\trc_patrolled\tcnt\nQ1\t0.333\t3\nQ3\t1.000\t1\n"
        );
    }

    #[test]
    fn top_patrollers_share() {
        let edits = vec![enriched(5, "A", false)]; // revision 1005
        let ts = parse_mw_timestamp("20240301120000").unwrap();
        let ev = |id, rev, who: &str| PatrolEvent {
            log_id: id,
            revision_id: rev,
            actor_name: who.to_string(),
            timestamp: ts,
        };
        let events = vec![ev(1, 1005, "X"), ev(2, 1006, "X"), ev(3, 1007, "Y"), ev(4, 900, "Z")];
        let table = top_patrollers(&edits, &events);
        assert_eq!(
            table.render(None),
            "actor_name\tpatrols\tpatrols_relative\nX\t2\t66.7\nY\t1\t33.3\n"
        );
    }
}

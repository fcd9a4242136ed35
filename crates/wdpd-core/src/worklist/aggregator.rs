//! Per-actor rollups feeding the actor worklists and the ML-score worklists.

use std::collections::HashMap;

use serde::Serialize;

use crate::artifacts::table::{fixed, Table};
use crate::config::OresThresholds;
use crate::models::{EnrichedEdit, SourceKind};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Actor rollup
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActorRow {
    pub actor_name: String,
    pub edits_patr: usize,
    pub edits_unpatr: usize,
    pub reverted: usize,
    pub created: usize,
    pub edits: usize,
    /// Percent of `edits` already patrolled, two decimals.
    pub patrol_ratio: f64,
    /// Percent of `edits` tagged as reverted, two decimals.
    pub reverted_ratio: f64,
}

#[derive(Default)]
struct Counts {
    patrolled: usize,
    unpatrolled: usize,
    reverted: usize,
    created: usize,
}

/// Roll up `edits` per actor. Revert and creation counts cover patrolled and
/// unpatrolled edits alike; every count starts at zero so ratios are always
/// defined. Sorted by unpatrolled edits, then patrolled edits, both
/// descending, then actor name.
pub fn actor_rollup<'a, I>(edits: I) -> Vec<ActorRow>
where
    I: IntoIterator<Item = &'a EnrichedEdit>,
{
    let mut by_actor: HashMap<&'a str, Counts> = HashMap::new();
    for e in edits {
        let counts = by_actor.entry(e.edit.actor.name.as_str()).or_default();
        if e.edit.is_patrolled() {
            counts.patrolled += 1;
        } else {
            counts.unpatrolled += 1;
        }
        if e.reverted {
            counts.reverted += 1;
        }
        if e.edit.source == SourceKind::New {
            counts.created += 1;
        }
    }

    let mut rows: Vec<ActorRow> = by_actor
        .into_iter()
        .map(|(name, c)| {
            let edits = c.patrolled + c.unpatrolled;
            ActorRow {
                actor_name: name.to_string(),
                edits_patr: c.patrolled,
                edits_unpatr: c.unpatrolled,
                reverted: c.reverted,
                created: c.created,
                edits,
                patrol_ratio: percent(c.patrolled, edits),
                reverted_ratio: percent(c.reverted, edits),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.edits_unpatr
            .cmp(&a.edits_unpatr)
            .then_with(|| b.edits_patr.cmp(&a.edits_patr))
            .then_with(|| a.actor_name.cmp(&b.actor_name))
    });
    rows
}

pub fn actor_rollup_table(rows: &[ActorRow]) -> Table {
    let mut table = Table::new(&[
        "actor_name",
        "edits_patr",
        "edits_unpatr",
        "reverted",
        "created",
        "edits",
        "patrol_ratio",
        "reverted_ratio",
    ]);
    for r in rows {
        table.push(vec![
            r.actor_name.clone(),
            r.edits_patr.to_string(),
            r.edits_unpatr.to_string(),
            r.reverted.to_string(),
            r.created.to_string(),
            r.edits.to_string(),
            fixed(r.patrol_ratio, 2),
            fixed(r.reverted_ratio, 2),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// ML-score worklist
// ---------------------------------------------------------------------------

/// Which actors an ML-score worklist covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorClass {
    Anonymous,
    Registered,
}

impl ActorClass {
    fn matches(self, edit: &EnrichedEdit) -> bool {
        match self {
            ActorClass::Anonymous => !edit.edit.actor.is_registered(),
            ActorClass::Registered => edit.edit.actor.is_registered(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OresRow {
    pub actor_name: String,
    /// Unpatrolled edits by the actor, scored or not.
    pub edits: usize,
    /// Edits that carried a score for the model.
    pub scored: usize,
    pub mean_score: f64,
}

/// Actors of `class` whose unpatrolled edits reach both thresholds. The mean
/// is taken over scored edits only, so an unscored edit never drags the mean
/// towards zero; actors with no scored edit are left out. Sorted by mean
/// score descending.
pub fn ores_worklist<'a, I>(
    edits: I,
    class: ActorClass,
    model: &str,
    thresholds: OresThresholds,
) -> Vec<OresRow>
where
    I: IntoIterator<Item = &'a EnrichedEdit>,
{
    let mut by_actor: HashMap<&'a str, (usize, usize, f64)> = HashMap::new();
    for e in edits {
        if !e.is_unpatrolled() || !class.matches(e) {
            continue;
        }
        let entry = by_actor.entry(e.edit.actor.name.as_str()).or_default();
        entry.0 += 1;
        if let Some(p) = e.score(model) {
            entry.1 += 1;
            entry.2 += p;
        }
    }

    let mut rows: Vec<OresRow> = by_actor
        .into_iter()
        .filter(|(_, (_, scored, _))| *scored > 0)
        .map(|(name, (edits, scored, sum))| OresRow {
            actor_name: name.to_string(),
            edits,
            scored,
            mean_score: sum / scored as f64,
        })
        .filter(|r| r.edits >= thresholds.min_edits && r.mean_score >= thresholds.min_score)
        .collect();
    rows.sort_by(|a, b| {
        b.mean_score
            .total_cmp(&a.mean_score)
            .then_with(|| b.edits.cmp(&a.edits))
            .then_with(|| a.actor_name.cmp(&b.actor_name))
    });
    rows
}

pub fn ores_worklist_table(rows: &[OresRow], model: &str) -> Table {
    let mut table = Table::new(&[
        "actor_name".to_string(),
        "edits".to_string(),
        "scored".to_string(),
        format!("oresc_{model}"),
    ]);
    for r in rows {
        table.push(vec![
            r.actor_name.clone(),
            r.edits.to_string(),
            r.scored.to_string(),
            fixed(r.mean_score, 4),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worklist::testing::{enriched, with_score};

    #[test]
    fn ratios_default_to_zero_not_null() {
        let mut edits = Vec::new();
        for i in 0..7 {
            edits.push(enriched(i, "Alice", true));
        }
        for i in 7..10 {
            edits.push(enriched(i, "Alice", false));
        }
        let rows = actor_rollup(&edits);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.edits, 10);
        assert_eq!(row.patrol_ratio, 70.00);
        assert_eq!(row.reverted_ratio, 0.00);
        assert_eq!(row.reverted, 0);

        let rendered = actor_rollup_table(&rows).render(None);
        assert!(rendered.ends_with("Alice\t7\t3\t0\t0\t10\t70.00\t0.00\n"));
    }

    #[test]
    fn rollup_sort_order() {
        let mut edits = vec![
            enriched(1, "A", true),
            enriched(2, "B", false),
            enriched(3, "C", false),
            enriched(4, "C", true),
            enriched(5, "D", true),
            enriched(6, "D", true),
        ];
        edits[1].reverted = true;
        let rows = actor_rollup(&edits);
        let order: Vec<&str> = rows.iter().map(|r| r.actor_name.as_str()).collect();
        assert_eq!(order, vec!["C", "B", "D", "A"]);
        let b = rows.iter().find(|r| r.actor_name == "B").unwrap();
        assert_eq!(b.reverted_ratio, 100.00);
    }

    #[test]
    fn ratio_rounding() {
        let edits = vec![
            enriched(1, "A", true),
            enriched(2, "A", false),
            enriched(3, "A", false),
        ];
        assert_eq!(actor_rollup(&edits)[0].patrol_ratio, 33.33);
    }

    #[test]
    fn ores_worklist_applies_both_thresholds() {
        let mut edits = Vec::new();
        for i in 0..3 {
            edits.push(with_score(enriched(i, "192.0.2.1", false), "damaging", 0.95));
        }
        edits.push(with_score(enriched(10, "192.0.2.2", false), "damaging", 0.99));
        for i in 20..23 {
            edits.push(with_score(enriched(i, "192.0.2.3", false), "damaging", 0.2));
        }
        let t = OresThresholds {
            min_score: 0.9,
            min_edits: 2,
        };
        let rows = ores_worklist(&edits, ActorClass::Anonymous, "damaging", t);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actor_name, "192.0.2.1");
        assert_eq!(rows[0].edits, 3);
        assert!(ores_worklist(&edits, ActorClass::Registered, "damaging", t).is_empty());
    }

    #[test]
    fn ores_mean_ignores_unscored_edits() {
        let edits = vec![
            with_score(enriched(1, "192.0.2.1", false), "damaging", 0.8),
            enriched(2, "192.0.2.1", false),
        ];
        let t = OresThresholds {
            min_score: 0.5,
            min_edits: 2,
        };
        let rows = ores_worklist(&edits, ActorClass::Anonymous, "damaging", t);
        assert_eq!(rows[0].edits, 2);
        assert_eq!(rows[0].scored, 1);
        assert_eq!(rows[0].mean_score, 0.8);
    }
}

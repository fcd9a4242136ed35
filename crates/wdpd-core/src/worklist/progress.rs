//! Patrol progress: how fast term edits get patrolled, and overall
//! completion counts.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artifacts::table::{fixed, opt_cell, Table};
use crate::models::{EnrichedEdit, PatrolEvent};

// ---------------------------------------------------------------------------
// Per-edit patrol progress
// ---------------------------------------------------------------------------

/// A term edit joined with the first patrol action on its revision.
#[derive(Clone, Debug)]
pub struct PatrolProgressRow<'d> {
    pub edit: &'d EnrichedEdit,
    pub patroller: Option<String>,
    pub patrolled_at: Option<DateTime<Utc>>,
    /// `patrolled_at - edit timestamp`; `None` while unpatrolled.
    pub delay_seconds: Option<i64>,
}

impl PatrolProgressRow<'_> {
    pub fn language(&self) -> Option<&str> {
        self.edit.summary.param(1)
    }
}

/// Join every term-category edit to the earliest patrol event on its
/// revision.
pub fn compile_patrol_progress<'d>(
    edits: &'d [EnrichedEdit],
    events: &[PatrolEvent],
) -> Vec<PatrolProgressRow<'d>> {
    let mut first_event: HashMap<i64, &PatrolEvent> = HashMap::new();
    for event in events {
        first_event
            .entry(event.revision_id)
            .and_modify(|current| {
                if (event.timestamp, event.log_id) < (current.timestamp, current.log_id) {
                    *current = event;
                }
            })
            .or_insert(event);
    }

    edits
        .iter()
        .filter(|e| e.category.is_term())
        .map(|edit| {
            let event = first_event.get(&edit.edit.revision_id);
            PatrolProgressRow {
                edit,
                patroller: event.map(|ev| ev.actor_name.clone()),
                patrolled_at: event.map(|ev| ev.timestamp),
                delay_seconds: event.map(|ev| (ev.timestamp - edit.edit.timestamp).num_seconds()),
            }
        })
        .collect()
}

/// Patrol counts per patroller for one language, most active first.
pub fn patrollers_table(rows: &[PatrolProgressRow<'_>], language: &str) -> Table {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows.iter().filter(|r| r.language() == Some(language)) {
        if let Some(name) = row.patroller.as_deref() {
            *counts.entry(name).or_default() += 1;
        }
    }
    let mut sorted: Vec<(&str, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut table = Table::new(&["actor_name", "patrols"]);
    for (name, n) in sorted {
        table.push(vec![name.to_string(), n.to_string()]);
    }
    table
}

/// Distribution of patrol delays in seconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DelayStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined for a single value.
    pub std: Option<f64>,
    pub min: i64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: i64,
}

impl DelayStats {
    pub fn from_seconds(values: &[i64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();
        let mean = sorted.iter().map(|v| *v as f64).sum::<f64>() / n as f64;
        let std = (n > 1).then(|| {
            let ss: f64 = sorted.iter().map(|v| (*v as f64 - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });
        Some(Self {
            count: n,
            mean,
            std,
            min: sorted[0],
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.5),
            p75: quantile(&sorted, 0.75),
            max: sorted[n - 1],
        })
    }
}

/// Linear-interpolated quantile of a sorted, non-empty slice.
fn quantile(sorted: &[i64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] as f64 + (sorted[hi] - sorted[lo]) as f64 * frac
}

/// One-row delay summary for one language.
pub fn delay_table(rows: &[PatrolProgressRow<'_>], language: &str) -> Table {
    let mut edits = 0usize;
    let mut delays = Vec::new();
    for row in rows.iter().filter(|r| r.language() == Some(language)) {
        edits += 1;
        if let Some(d) = row.delay_seconds {
            delays.push(d);
        }
    }
    let stats = DelayStats::from_seconds(&delays);

    let mut table = Table::new(&[
        "edits",
        "unpatrolled",
        "count",
        "mean",
        "std",
        "min",
        "25%",
        "50%",
        "75%",
        "max",
    ]);
    let mut row = vec![edits.to_string(), (edits - delays.len()).to_string()];
    match stats {
        Some(s) => row.extend([
            s.count.to_string(),
            fixed(s.mean, 1),
            opt_cell(s.std.map(|v| fixed(v, 1))),
            s.min.to_string(),
            fixed(s.p25, 1),
            fixed(s.p50, 1),
            fixed(s.p75, 1),
            s.max.to_string(),
        ]),
        None => row.push("0".to_string()),
    }
    table.push(row);
    table
}

/// Languages present in the progress rows, sorted.
pub fn progress_languages(rows: &[PatrolProgressRow<'_>]) -> Vec<String> {
    let langs: BTreeSet<&str> = rows.iter().filter_map(|r| r.language()).collect();
    langs.into_iter().map(str::to_string).collect()
}

// ---------------------------------------------------------------------------
// Completion summary
// ---------------------------------------------------------------------------

/// A (patrolled, total) count pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressPair {
    pub patrolled: usize,
    pub total: usize,
}

impl ProgressPair {
    pub fn remaining(&self) -> usize {
        self.total - self.patrolled
    }

    /// `None` when there is nothing to patrol.
    pub fn percent(&self) -> Option<f64> {
        (self.total > 0).then(|| self.patrolled as f64 / self.total as f64 * 100.0)
    }

    /// Tab-separated raw counts.
    pub fn raw(&self) -> String {
        format!("{}\t{}", self.patrolled, self.total)
    }

    fn percent_text(&self) -> String {
        match self.percent() {
            Some(p) => format!("{p:.1}%"),
            None => "n/a".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PatrolSummary {
    pub overall: ProgressPair,
    /// Edits since midnight UTC of `now`.
    pub today: ProgressPair,
}

impl PatrolSummary {
    /// Counts rows whose `rc_patrolled` flag is set. Earlier dashboards counted
    /// patrol-log events on revisions at or above the oldest revision instead,
    /// so their "patrolled" figure can differ from this one.
    pub fn compute(edits: &[EnrichedEdit], now: DateTime<Utc>) -> Self {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        let mut summary = PatrolSummary::default();
        for e in edits {
            let patrolled = usize::from(e.edit.is_patrolled());
            summary.overall.total += 1;
            summary.overall.patrolled += patrolled;
            if e.edit.timestamp >= midnight {
                summary.today.total += 1;
                summary.today.patrolled += patrolled;
            }
        }
        summary
    }

    pub fn overall_text(&self) -> String {
        let p = self.overall;
        format!(
            "Currently {} out of {} revisions are patrolled ({}); {} revisions are not yet patrolled",
            p.patrolled,
            p.total,
            p.percent_text(),
            p.remaining()
        )
    }

    pub fn today_text(&self) -> String {
        let p = self.today;
        format!(
            "Today {} out of {} revisions are patrolled ({}); {} revisions are not yet patrolled",
            p.patrolled,
            p.total,
            p.percent_text(),
            p.remaining()
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

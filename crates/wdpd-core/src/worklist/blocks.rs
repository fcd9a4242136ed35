//! Actors with unpatrolled edits and a block history.
//!
//! Registered users are matched on the block log by name. Anonymous actors
//! are matched by address, both on direct blocks and on range blocks
//! containing the address.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::artifacts::table::Table;
use crate::models::{
    ip_to_hex, ip_to_u128, BlockLogEntry, BlockTarget, CurrentBlock, EnrichedEdit, IpRange,
};

const INFINITY: &str = "infinity";

/// How far back a block log entry counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockWindow {
    All,
    /// The 365 days before `now`.
    OneYear,
}

impl BlockWindow {
    pub const ALL: [BlockWindow; 2] = [BlockWindow::All, BlockWindow::OneYear];

    pub fn name(self) -> &'static str {
        match self {
            BlockWindow::All => "all",
            BlockWindow::OneYear => "1y",
        }
    }

    pub fn includes(self, entry: &BlockLogEntry, now: DateTime<Utc>) -> bool {
        match self {
            BlockWindow::All => true,
            BlockWindow::OneYear => now - entry.timestamp < Duration::days(365),
        }
    }
}

/// Unpatrolled edit counts per actor name.
fn unpatrolled_counts<'e>(
    edits: &'e [EnrichedEdit],
    keep: impl Fn(&EnrichedEdit) -> bool,
) -> HashMap<&'e str, usize> {
    let mut counts = HashMap::new();
    for e in edits.iter().filter(|e| e.is_unpatrolled() && keep(e)) {
        *counts.entry(e.edit.actor.name.as_str()).or_default() += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Registered users
// ---------------------------------------------------------------------------

/// `actor_name, edits, block_cnt, is_blocked`, most edits first. `block_cnt`
/// is the all-time count; `is_blocked` holds the expiry of a block in force.
pub fn registered_block_history(
    edits: &[EnrichedEdit],
    log: &[BlockLogEntry],
    current: &[CurrentBlock],
    window: BlockWindow,
    now: DateTime<Utc>,
) -> Table {
    let registered: Vec<&BlockLogEntry> = log
        .iter()
        .filter(|e| e.kind() == BlockTarget::Registered)
        .collect();
    let mut block_cnt: HashMap<&str, usize> = HashMap::new();
    for entry in &registered {
        *block_cnt.entry(entry.target.as_str()).or_default() += 1;
    }
    let blocked_in_window: HashSet<&str> = registered
        .iter()
        .filter(|e| window.includes(e, now))
        .map(|e| e.target.as_str())
        .collect();
    let expiry: HashMap<&str, &str> = current
        .iter()
        .filter(|b| b.range_start.is_empty())
        .map(|b| (b.address.as_str(), b.expiry.as_str()))
        .collect();

    let mut rows: Vec<(&str, usize, usize)> = unpatrolled_counts(edits, |e| {
        blocked_in_window.contains(e.edit.actor.name.as_str())
    })
    .into_iter()
    .map(|(name, n)| (name, n, block_cnt.get(name).copied().unwrap_or_default()))
    .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut table = Table::new(&["actor_name", "edits", "block_cnt", "is_blocked"]);
    for (name, n, blocks) in rows {
        table.push(vec![
            name.to_string(),
            n.to_string(),
            blocks.to_string(),
            expiry.get(name).map(|e| e.to_string()).unwrap_or_default(),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// Anonymous users
// ---------------------------------------------------------------------------

struct AnonRow<'e> {
    name: &'e str,
    ip: IpAddr,
    edits: usize,
    block_cnt: usize,
    range_blocks: usize,
}

/// `actor_name, edits, block_cnt, range_blocks_<window>, total_blocks,
/// is_blocked, is_range_blocked`, most edits first, then by address.
///
/// An address is listed when it was blocked directly inside the window or
/// falls in a range blocked inside the window. `block_cnt` counts direct
/// blocks of all time. `is_range_blocked` is `infinity` when an indefinite
/// range block covers the address, `temporary` for any other covering range
/// block, and empty otherwise.
pub fn anonymous_block_history(
    edits: &[EnrichedEdit],
    log: &[BlockLogEntry],
    current: &[CurrentBlock],
    window: BlockWindow,
    now: DateTime<Utc>,
) -> Table {
    let mut block_cnt: HashMap<IpAddr, usize> = HashMap::new();
    let mut blocked_in_window: HashSet<IpAddr> = HashSet::new();
    let mut ranges: Vec<IpRange> = Vec::new();
    for entry in log {
        let kind = entry.kind();
        if kind.is_single_ip() {
            let Ok(ip) = entry.target.parse::<IpAddr>() else {
                continue;
            };
            *block_cnt.entry(ip).or_default() += 1;
            if window.includes(entry, now) {
                blocked_in_window.insert(ip);
            }
        } else if kind.is_range() && window.includes(entry, now) {
            ranges.extend(IpRange::parse_cidr(&entry.target));
        }
    }

    let direct_expiry: HashMap<IpAddr, &str> = current
        .iter()
        .filter(|b| b.is_single_address())
        .filter_map(|b| Some((b.address.parse::<IpAddr>().ok()?, b.expiry.as_str())))
        .collect();
    let range_blocks: Vec<&CurrentBlock> = current.iter().filter(|b| b.is_range()).collect();

    let mut rows: Vec<AnonRow<'_>> = Vec::new();
    let mut unparsed = 0usize;
    for (name, n) in unpatrolled_counts(edits, |e| !e.edit.actor.is_registered()) {
        let Ok(ip) = name.parse::<IpAddr>() else {
            unparsed += 1;
            continue;
        };
        let in_ranges = ranges.iter().filter(|r| r.contains(ip)).count();
        if !blocked_in_window.contains(&ip) && in_ranges == 0 {
            continue;
        }
        rows.push(AnonRow {
            name,
            ip,
            edits: n,
            block_cnt: block_cnt.get(&ip).copied().unwrap_or_default(),
            range_blocks: in_ranges,
        });
    }
    if unparsed > 0 {
        debug!(unparsed, "anonymous actor names that are not addresses");
    }
    rows.sort_by(|a, b| {
        b.edits
            .cmp(&a.edits)
            .then_with(|| ip_to_u128(a.ip).cmp(&ip_to_u128(b.ip)))
    });

    let range_column = format!("range_blocks_{}", window.name());
    let mut table = Table::new(&[
        "actor_name",
        "edits",
        "block_cnt",
        range_column.as_str(),
        "total_blocks",
        "is_blocked",
        "is_range_blocked",
    ]);
    for row in rows {
        let hex = ip_to_hex(row.ip);
        let covering: Vec<&&CurrentBlock> =
            range_blocks.iter().filter(|b| b.covers_hex(&hex)).collect();
        let range_state = if covering.is_empty() {
            ""
        } else if covering.iter().any(|b| b.expiry == INFINITY) {
            INFINITY
        } else {
            "temporary"
        };
        table.push(vec![
            row.name.to_string(),
            row.edits.to_string(),
            row.block_cnt.to_string(),
            row.range_blocks.to_string(),
            (row.block_cnt + row.range_blocks).to_string(),
            direct_expiry.get(&row.ip).map(|e| e.to_string()).unwrap_or_default(),
            range_state.to_string(),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

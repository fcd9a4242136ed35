//! Shared typed models used across classification, enrichment and reporting.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::{WdpdError, WdpdResult};

// ---------------------------------------------------------------------------
// Timestamp helpers
// ---------------------------------------------------------------------------

/// MediaWiki stores timestamps as `YYYYMMDDHHMMSS` in UTC.
pub const MW_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Parse a MediaWiki `YYYYMMDDHHMMSS` timestamp.
pub fn parse_mw_timestamp(raw: &str) -> WdpdResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), MW_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| WdpdError::Timestamp(format!("{raw:?}: {e}")))
}

/// Render a timestamp back to the MediaWiki `YYYYMMDDHHMMSS` form.
pub fn format_mw_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(MW_TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// 1. Edit
// ---------------------------------------------------------------------------

/// Patrol state of a recent change. Autopatrolled rows never reach the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatrolStatus {
    Unpatrolled,
    Patrolled,
}

impl PatrolStatus {
    /// Map the replica's `rc_patrolled` flag (0 or 1).
    pub fn from_flag(flag: i64) -> WdpdResult<Self> {
        match flag {
            0 => Ok(PatrolStatus::Unpatrolled),
            1 => Ok(PatrolStatus::Patrolled),
            other => Err(WdpdError::Source(format!(
                "rc_patrolled={other} is not patrol-eligible"
            ))),
        }
    }

    pub fn as_flag(self) -> i64 {
        match self {
            PatrolStatus::Unpatrolled => 0,
            PatrolStatus::Patrolled => 1,
        }
    }
}

/// Origin of a recent change (`rc_source`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// `mw.edit`: modification of an existing page.
    Edit,
    /// `mw.new`: page creation.
    New,
    Other(String),
}

impl SourceKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "mw.edit" => SourceKind::Edit,
            "mw.new" => SourceKind::New,
            other => SourceKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::Edit => "mw.edit",
            SourceKind::New => "mw.new",
            SourceKind::Other(s) => s.as_str(),
        }
    }
}

/// Who made an edit. A missing `user_id` means the actor is anonymous (an IP).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Actor {
    pub name: String,
    pub user_id: Option<i64>,
}

impl Actor {
    pub fn registered(name: impl Into<String>, user_id: i64) -> Self {
        Self {
            name: name.into(),
            user_id: Some(user_id),
        }
    }

    pub fn anonymous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_id: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.user_id.is_some()
    }
}

/// One patrol-eligible change in the main namespace.
#[derive(Clone, Debug)]
pub struct Edit {
    pub rc_id: i64,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub source: SourceKind,
    pub patrol_status: PatrolStatus,
    pub len_diff: i64,
    pub revision_id: i64,
    pub actor: Actor,
    pub comment: String,
}

impl Edit {
    /// Numeric part of an entity title (`Q42` -> 42).
    pub fn num_title(&self) -> Option<i64> {
        let mut chars = self.title.chars();
        chars.next()?;
        chars.as_str().parse::<i64>().ok()
    }

    pub fn is_patrolled(&self) -> bool {
        self.patrol_status == PatrolStatus::Patrolled
    }
}

// ---------------------------------------------------------------------------
// 2. ParsedSummary
// ---------------------------------------------------------------------------

/// Structured decomposition of an edit summary of the form
/// `/* <action>:<count>|<p1>|<p2>|<p3> */ <free text>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedSummary {
    /// Text between `/* ` and ` */`.
    pub magic: Option<String>,
    /// Text after the closing ` */`.
    pub free: Option<String>,
    pub action: Option<String>,
    /// Everything after the first `:` of the magic segment.
    pub magic_rest: Option<String>,
    /// Leading numeric field of the parameter list.
    pub param_count: Option<u64>,
    /// `param1..param3`; an empty or missing field is `None`.
    pub params: [Option<String>; 3],
    pub property: Option<String>,
    pub value: Option<String>,
}

impl ParsedSummary {
    /// One-based positional parameter accessor (`param(1)` is the first
    /// field after the count).
    pub fn param(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.params.get(i))
            .and_then(|p| p.as_deref())
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }
}

// ---------------------------------------------------------------------------
// 3. BroadCategory
// ---------------------------------------------------------------------------

/// Leaf classification of an edit's action code, plus the `NO_CAT` fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BroadCategory {
    Claim,
    Qualifier,
    Reference,
    Sitelink,
    SitelinkMove,
    Label,
    Description,
    Alias,
    AnyTerms,
    LinkTitles,
    EditEntity,
    Merge,
    Revert,
    /// The `none` bucket (summaries whose magic segment is literally `None`).
    NoneAction,
    NoCat,
}

impl BroadCategory {
    pub const LEAVES: [BroadCategory; 14] = [
        BroadCategory::Claim,
        BroadCategory::Qualifier,
        BroadCategory::Reference,
        BroadCategory::Sitelink,
        BroadCategory::SitelinkMove,
        BroadCategory::Label,
        BroadCategory::Description,
        BroadCategory::Alias,
        BroadCategory::AnyTerms,
        BroadCategory::LinkTitles,
        BroadCategory::EditEntity,
        BroadCategory::Merge,
        BroadCategory::Revert,
        BroadCategory::NoneAction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BroadCategory::Claim => "claim",
            BroadCategory::Qualifier => "qualifier",
            BroadCategory::Reference => "reference",
            BroadCategory::Sitelink => "sitelink",
            BroadCategory::SitelinkMove => "sitelinkmove",
            BroadCategory::Label => "label",
            BroadCategory::Description => "description",
            BroadCategory::Alias => "alias",
            BroadCategory::AnyTerms => "anyterms",
            BroadCategory::LinkTitles => "linktitles",
            BroadCategory::EditEntity => "editentity",
            BroadCategory::Merge => "merge",
            BroadCategory::Revert => "revert",
            BroadCategory::NoneAction => "none",
            BroadCategory::NoCat => "NO_CAT",
        }
    }

    /// Label, description, alias and combined term edits.
    pub fn is_term(self) -> bool {
        matches!(
            self,
            BroadCategory::Label
                | BroadCategory::Description
                | BroadCategory::Alias
                | BroadCategory::AnyTerms
        )
    }
}

impl fmt::Display for BroadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BroadCategory {
    type Err = WdpdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BroadCategory::LEAVES
            .iter()
            .copied()
            .chain(std::iter::once(BroadCategory::NoCat))
            .find(|c| c.as_str() == s)
            .ok_or_else(|| WdpdError::Taxonomy(format!("unknown category {s:?}")))
    }
}

// ---------------------------------------------------------------------------
// 4. Scores
// ---------------------------------------------------------------------------

/// Raw row of `ores_classification`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreRow {
    pub revision_id: i64,
    pub model_id: i64,
    pub class: i64,
    pub probability: f64,
    pub is_predicted: bool,
}

/// Probability attached to an edit for one named model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelScore {
    pub probability: f64,
    pub predicted: bool,
    /// Model-version id the score was produced by.
    pub model_id: i64,
}

// ---------------------------------------------------------------------------
// 5. Change tags, patrol log, toplist, other namespaces
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeTag {
    pub rc_id: i64,
    pub name: String,
}

/// A logged patrol action on a revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatrolEvent {
    pub log_id: i64,
    pub revision_id: i64,
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Entry of the entity-usage toplist.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityUsage {
    pub qid: String,
    pub usage_count: f64,
}

/// Change outside the main namespace, with the namespace's display name.
#[derive(Clone, Debug)]
pub struct NamespacedEdit {
    pub edit: Edit,
    pub namespace: String,
}

impl NamespacedEdit {
    /// `<namespace>:<title>`, the form translation pages are listed in.
    pub fn full_title(&self) -> String {
        format!("{}:{}", self.namespace, self.edit.title)
    }
}

// ---------------------------------------------------------------------------
// 6. Blocks
// ---------------------------------------------------------------------------

/// What a block log entry was aimed at, derived from its target name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockTarget {
    Registered,
    Ipv4,
    Ipv6,
    Ipv4Range,
    Ipv6Range,
}

impl BlockTarget {
    pub fn of(target: &str) -> Self {
        if let Ok(ip) = target.parse::<IpAddr>() {
            return if ip.is_ipv4() { BlockTarget::Ipv4 } else { BlockTarget::Ipv6 };
        }
        match IpRange::parse_cidr(target) {
            Some(range) if range.is_ipv4 => BlockTarget::Ipv4Range,
            Some(_) => BlockTarget::Ipv6Range,
            None => BlockTarget::Registered,
        }
    }

    pub fn is_single_ip(self) -> bool {
        matches!(self, BlockTarget::Ipv4 | BlockTarget::Ipv6)
    }

    pub fn is_range(self) -> bool {
        matches!(self, BlockTarget::Ipv4Range | BlockTarget::Ipv6Range)
    }
}

/// One `block` entry of the block log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLogEntry {
    /// User name, IP address or CIDR range, with spaces (not underscores).
    pub target: String,
    pub timestamp: DateTime<Utc>,
}

impl BlockLogEntry {
    pub fn kind(&self) -> BlockTarget {
        BlockTarget::of(&self.target)
    }
}

/// A block in force now. Range bounds use the MediaWiki hex encoding and are
/// empty for registered-user blocks; `expiry` is `infinity` or a timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentBlock {
    pub address: String,
    pub range_start: String,
    pub range_end: String,
    pub expiry: String,
}

impl CurrentBlock {
    pub fn is_single_address(&self) -> bool {
        !self.range_start.is_empty() && self.range_start == self.range_end
    }

    pub fn is_range(&self) -> bool {
        self.range_start < self.range_end
    }

    pub fn covers_hex(&self, hex: &str) -> bool {
        self.range_start.as_str() <= hex && hex <= self.range_end.as_str()
    }
}

/// Inclusive address interval, both families mapped onto `u128`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpRange {
    pub start: u128,
    pub end: u128,
    pub is_ipv4: bool,
}

impl IpRange {
    /// Parse `addr/prefix`, ignoring host bits.
    pub fn parse_cidr(raw: &str) -> Option<Self> {
        let (addr, prefix) = raw.split_once('/')?;
        let ip: IpAddr = addr.trim().parse().ok()?;
        let prefix: u32 = prefix.trim().parse().ok()?;
        let bits = if ip.is_ipv4() { 32 } else { 128 };
        if prefix > bits {
            return None;
        }
        let host_bits = bits - prefix;
        let value = ip_to_u128(ip);
        let mask = if host_bits == 128 { u128::MAX } else { (1u128 << host_bits) - 1 };
        Some(Self {
            start: value & !mask,
            end: value | mask,
            is_ipv4: ip.is_ipv4(),
        })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        ip.is_ipv4() == self.is_ipv4 && (self.start..=self.end).contains(&ip_to_u128(ip))
    }
}

pub fn ip_to_u128(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// MediaWiki's sortable hex form: 8 digits for IPv4, `v6-` and 32 digits
/// for IPv6, upper case.
pub fn ip_to_hex(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{:08X}", u32::from(v4)),
        IpAddr::V6(v6) => format!("v6-{:032X}", u128::from(v6)),
    }
}

// ---------------------------------------------------------------------------
// 7. EnrichedEdit
// ---------------------------------------------------------------------------

/// An edit joined with its parsed summary, category, tags and model scores.
/// This is the single dataset handed to every report generator.
#[derive(Clone, Debug)]
pub struct EnrichedEdit {
    pub edit: Edit,
    pub summary: ParsedSummary,
    pub category: BroadCategory,
    pub reverted: bool,
    pub suggested_edit: bool,
    /// Keyed by model name; a missing key means no active-model score.
    pub scores: BTreeMap<String, ModelScore>,
}

impl EnrichedEdit {
    pub fn score(&self, model: &str) -> Option<f64> {
        self.scores.get(model).map(|s| s.probability)
    }

    pub fn is_unpatrolled(&self) -> bool {
        !self.edit.is_patrolled()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

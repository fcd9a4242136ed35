//! Edit-summary decomposition.
//!
//! Wikibase writes machine-readable summaries of the form
//! `/* wbsetclaim-create:2|P31|Q5 */ [[Property:P31]]: Q5`. Each stage below
//! feeds the next; a stage that does not match leaves every downstream field
//! `None`. Summaries without the leading magic segment are common (manual
//! edits) and produce an all-`None` [`ParsedSummary`].

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ParsedSummary;
use crate::taxonomy::ActionTaxonomy;

// ---------------------------------------------------------------------------
// Compiled regex patterns
// ---------------------------------------------------------------------------

static MAGIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/\* (.+?) \*/ ?(.*)").unwrap());

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z\-]+$").unwrap());

static PARAMS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\|(.*)").unwrap());

static PROPERTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\[Property:(P\d+)\]\]: (.*)$").unwrap());

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Stage 1: `(magic, free)` from `/* <magic> */ <free>`.
pub fn split_magic(comment: &str) -> Option<(&str, &str)> {
    let caps = MAGIC_RE.captures(comment)?;
    let magic = caps.get(1)?.as_str();
    let free = caps.get(2).map_or("", |m| m.as_str());
    Some((magic, free))
}

/// Stage 2: `(action, rest)` split on the first `:`.
///
/// Without a `:` the whole magic segment is the action code. With one, the
/// head must be a lowercase, hyphenated token or there is no action.
pub fn split_action(magic: &str) -> (Option<&str>, Option<&str>) {
    match magic.split_once(':') {
        Some((head, rest)) if ACTION_RE.is_match(head) => (Some(head), Some(rest)),
        Some(_) => (None, None),
        None => (Some(magic), None),
    }
}

/// Stage 3: `count|p1|p2|p3`. Empty or missing fields become `None`; fields
/// past the third are ignored.
pub fn split_params(rest: &str) -> Option<(Option<u64>, [Option<String>; 3])> {
    let caps = PARAMS_RE.captures(rest)?;
    let count = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
    let tail = caps.get(2).map_or("", |m| m.as_str());

    let mut params: [Option<String>; 3] = Default::default();
    for (slot, field) in params.iter_mut().zip(tail.split('|')) {
        if !field.is_empty() {
            *slot = Some(field.to_string());
        }
    }
    Some((count, params))
}

/// Stage 4: `(property, value)` from `[[Property:Pxxx]]: <value>`.
pub fn extract_property(free: &str) -> Option<(&str, &str)> {
    let caps = PROPERTY_RE.captures(free)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

// ---------------------------------------------------------------------------
// CommentParser
// ---------------------------------------------------------------------------

/// Turns raw summaries into [`ParsedSummary`] records. The taxonomy decides
/// which actions get the property/value pass.
pub struct CommentParser<'t> {
    taxonomy: &'t ActionTaxonomy,
}

impl<'t> CommentParser<'t> {
    pub fn new(taxonomy: &'t ActionTaxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn parse(&self, comment: &str) -> ParsedSummary {
        let mut parsed = ParsedSummary::default();

        let Some((magic, free)) = split_magic(comment) else {
            return parsed;
        };
        parsed.magic = Some(magic.to_string());
        parsed.free = Some(free.to_string());

        let (action, rest) = split_action(magic);
        parsed.action = action.map(str::to_string);
        parsed.magic_rest = rest.map(str::to_string);

        if let Some((count, params)) = rest.and_then(split_params) {
            parsed.param_count = count;
            parsed.params = params;
        }

        // Other actions' free text can look like a property pair by accident.
        if action.is_some_and(|a| self.taxonomy.is_claim_like(a)) {
            if let Some((property, value)) = extract_property(free) {
                parsed.property = Some(property.to_string());
                parsed.value = Some(value.to_string());
            }
        }

        parsed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(comment: &str) -> ParsedSummary {
        let taxonomy = ActionTaxonomy::wikidata();
        CommentParser::new(&taxonomy).parse(comment)
    }

    #[test]
    fn claim_summary_yields_params_and_property() {
        let parsed = parse("/* wbsetclaim-create:2|P31|Q5 */ [[Property:P31]]: Q5");
        assert_eq!(parsed.magic.as_deref(), Some("wbsetclaim-create:2|P31|Q5"));
        assert_eq!(parsed.action(), Some("wbsetclaim-create"));
        assert_eq!(parsed.param_count, Some(2));
        assert_eq!(parsed.param(1), Some("P31"));
        assert_eq!(parsed.param(2), Some("Q5"));
        assert_eq!(parsed.param(3), None);
        assert_eq!(parsed.property.as_deref(), Some("P31"));
        assert_eq!(parsed.value.as_deref(), Some("Q5"));
    }

    #[test]
    fn plain_comment_leaves_everything_empty() {
        assert_eq!(parse("fixed a typo"), ParsedSummary::default());
        assert_eq!(parse(""), ParsedSummary::default());
        assert_eq!(parse("/* unterminated"), ParsedSummary::default());
    }

    #[test]
    fn empty_param_slots_are_none_not_empty() {
        let parsed = parse("/* clientsitelink-remove:1||enwiki */ Foo");
        assert_eq!(parsed.param_count, Some(1));
        assert_eq!(parsed.param(1), None);
        assert_eq!(parsed.param(2), Some("enwiki"));
    }

    #[test]
    fn undo_summary_keeps_revision_and_user() {
        let parsed = parse("/* undo:0||1234|Example */");
        assert_eq!(parsed.action(), Some("undo"));
        assert_eq!(parsed.param(1), None);
        assert_eq!(parsed.param(2), Some("1234"));
        assert_eq!(parsed.param(3), Some("Example"));
        assert_eq!(parsed.free.as_deref(), Some(""));
    }

    #[test]
    fn magic_without_colon_is_the_action() {
        let parsed = parse("/* None */ something");
        assert_eq!(parsed.action(), Some("None"));
        assert_eq!(parsed.magic_rest, None);
        assert_eq!(parsed.params, [None, None, None]);
    }

    #[test]
    fn non_token_head_before_colon_has_no_action() {
        let parsed = parse("/* Section Title: more */ text");
        assert_eq!(parsed.magic.as_deref(), Some("Section Title: more"));
        assert_eq!(parsed.action(), None);
        assert_eq!(parsed.magic_rest, None);
    }

    #[test]
    fn non_numeric_count_skips_params() {
        let parsed = parse("/* wbsetlabel-add:en|x */ label");
        assert_eq!(parsed.action(), Some("wbsetlabel-add"));
        assert_eq!(parsed.magic_rest.as_deref(), Some("en|x"));
        assert_eq!(parsed.param_count, None);
        assert_eq!(parsed.param(1), None);
    }

    #[test]
    fn property_pass_only_runs_for_claim_like_actions() {
        let parsed = parse("/* wbsetlabel-set:1|en */ [[Property:P31]]: Q5");
        assert_eq!(parsed.param(1), Some("en"));
        assert_eq!(parsed.property, None);
        assert_eq!(parsed.value, None);

        let parsed = parse("/* wbsetreference-add:2|P31 */ [[Property:P854]]: https://example.org");
        assert_eq!(parsed.property.as_deref(), Some("P854"));
        assert_eq!(parsed.value.as_deref(), Some("https://example.org"));
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "/* wbeditentity-update-languages-short:0||de, en, fr */ labels";
        assert_eq!(parse(text), parse(text));
        assert_eq!(parse(text).param(2), Some("de, en, fr"));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let (count, params) = split_params("4|a|b|c|d").unwrap();
        assert_eq!(count, Some(4));
        assert_eq!(
            params,
            [Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]
        );
        assert!(split_params("4").is_none());
    }
}

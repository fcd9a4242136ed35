//! Builders for enriched-edit fixtures shared by the worklist tests.

use std::collections::BTreeMap;

use crate::classify::{classify, CommentParser};
use crate::models::{
    parse_mw_timestamp, Actor, EnrichedEdit, Edit, ModelScore, ParsedSummary, PatrolStatus,
    SourceKind,
};
use crate::taxonomy::ActionTaxonomy;

/// Edit stamped 2024-03-01 12:00:00 on revision `1000 + rc_id`. Actor names
/// starting with a digit are anonymous.
pub fn enriched(rc_id: i64, actor: &str, patrolled: bool) -> EnrichedEdit {
    let actor = if actor.starts_with(|c: char| c.is_ascii_digit()) {
        Actor::anonymous(actor)
    } else {
        Actor::registered(actor, 1)
    };
    EnrichedEdit {
        edit: Edit {
            rc_id,
            timestamp: parse_mw_timestamp("20240301120000").unwrap(),
            title: format!("Q{rc_id}"),
            source: SourceKind::Edit,
            patrol_status: if patrolled {
                PatrolStatus::Patrolled
            } else {
                PatrolStatus::Unpatrolled
            },
            len_diff: 0,
            revision_id: 1000 + rc_id,
            actor,
            comment: String::new(),
        },
        summary: ParsedSummary::default(),
        category: crate::models::BroadCategory::NoCat,
        reverted: false,
        suggested_edit: false,
        scores: BTreeMap::new(),
    }
}

pub fn with_comment(mut e: EnrichedEdit, comment: &str) -> EnrichedEdit {
    let taxonomy = ActionTaxonomy::wikidata();
    e.edit.comment = comment.to_string();
    e.summary = CommentParser::new(&taxonomy).parse(comment);
    e.category = classify(e.summary.action(), &taxonomy);
    e
}

pub fn with_score(mut e: EnrichedEdit, model: &str, probability: f64) -> EnrichedEdit {
    e.scores.insert(
        model.to_string(),
        ModelScore {
            probability,
            predicted: probability >= 0.5,
            model_id: 1,
        },
    );
    e
}

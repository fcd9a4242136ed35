//! Build the enriched dataset: parse, classify, tag and score every edit.

pub mod scores;
pub mod tags;

use tracing::info;

use crate::classify::{classify, CommentParser};
use crate::config::PipelineConfig;
use crate::errors::WdpdResult;
use crate::models::{BroadCategory, Edit, EnrichedEdit};
use crate::source::DataSource;
use crate::taxonomy::ActionTaxonomy;

pub use scores::ScoreJoiner;
pub use tags::{tag_frequencies, TagIndex};

/// Read everything from `source` and enrich it.
///
/// The model resolver is consulted first; any upstream failure returns before
/// a single edit is classified.
pub fn enrich<S: DataSource>(
    source: &S,
    taxonomy: &ActionTaxonomy,
    config: &PipelineConfig,
) -> WdpdResult<Vec<EnrichedEdit>> {
    let joiner = ScoreJoiner::resolve(source, &config.models)?;
    let tags = TagIndex::new(&source.change_tags()?);
    let edits = source.edits()?;
    Ok(enrich_edits(edits, &tags, &joiner, taxonomy, config))
}

/// Pure enrichment over already-fetched records.
pub fn enrich_edits(
    edits: Vec<Edit>,
    tags: &TagIndex,
    joiner: &ScoreJoiner,
    taxonomy: &ActionTaxonomy,
    config: &PipelineConfig,
) -> Vec<EnrichedEdit> {
    let parser = CommentParser::new(taxonomy);
    let enriched: Vec<EnrichedEdit> = edits
        .into_iter()
        .map(|edit| {
            let summary = parser.parse(&edit.comment);
            let category = classify(summary.action(), taxonomy);
            let reverted = tags.has(edit.rc_id, &config.reverted_tag);
            let suggested_edit = tags.has(edit.rc_id, &config.suggested_edit_tag);
            let scores = joiner.attach(edit.revision_id);
            EnrichedEdit {
                edit,
                summary,
                category,
                reverted,
                suggested_edit,
                scores,
            }
        })
        .collect();

    let uncategorized = enriched
        .iter()
        .filter(|e| e.category == BroadCategory::NoCat)
        .count();
    info!(
        edits = enriched.len(),
        uncategorized,
        "enriched edits"
    );
    enriched
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

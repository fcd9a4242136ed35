//! Category-keyed edit worklists: which category values an edit falls under
//! for each family, and the edit-list table for one value.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::artifacts::family::{self, ArtifactFamily};
use crate::artifacts::table::{opt_cell, Table};
use crate::models::{format_mw_timestamp, BroadCategory, EnrichedEdit};
use crate::taxonomy::{ActionTaxonomy, ALL_CLAIMS, TERMS};

const EDITENTITY_CREATE: &str = "wbeditentity-create";

/// Families whose artifacts list individual unpatrolled edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EditFamily {
    /// Label/description/alias edits, by language.
    Term,
    /// Multi-language entity edits, by each touched language.
    TermInEditEntity,
    /// Entity creations, by language.
    TermInEditEntityCreate,
    /// Sitelink edits, by project.
    Page,
    /// Client-side page moves, by project.
    PageMove,
    /// Client-side page removals, by project.
    PageRemoval,
    /// Entity edits, by action code.
    EditEntity,
    /// Statement edits, by property.
    Property,
}

impl EditFamily {
    pub const ALL: [EditFamily; 8] = [
        EditFamily::Term,
        EditFamily::TermInEditEntity,
        EditFamily::TermInEditEntityCreate,
        EditFamily::Page,
        EditFamily::PageMove,
        EditFamily::PageRemoval,
        EditFamily::EditEntity,
        EditFamily::Property,
    ];

    pub fn artifact_family(self) -> ArtifactFamily {
        match self {
            EditFamily::Term => family::TERM,
            EditFamily::TermInEditEntity => family::TERM_IN_EDITENTITY,
            EditFamily::TermInEditEntityCreate => family::TERM_IN_EDITENTITY_CREATE,
            EditFamily::Page => family::PAGE,
            EditFamily::PageMove => family::PAGEMOVE,
            EditFamily::PageRemoval => family::PAGEREMOVAL,
            EditFamily::EditEntity => family::EDITENTITY,
            EditFamily::Property => family::PROPERTY,
        }
    }

    /// Term worklists are grouped by actor for batch patrolling.
    fn sorted_by_actor(self) -> bool {
        matches!(
            self,
            EditFamily::Term | EditFamily::TermInEditEntity | EditFamily::TermInEditEntityCreate
        )
    }

    /// Category values `edit` belongs to in this family (usually zero or one).
    pub fn keys<'e>(self, edit: &'e EnrichedEdit, taxonomy: &ActionTaxonomy) -> Vec<&'e str> {
        let summary = &edit.summary;
        let Some(action) = summary.action() else {
            return Vec::new();
        };
        let key = match self {
            EditFamily::Term => taxonomy
                .in_composite(TERMS, action)
                .then(|| summary.param(1))
                .flatten(),
            EditFamily::TermInEditEntity => {
                if edit.category != BroadCategory::EditEntity {
                    return Vec::new();
                }
                return summary
                    .param(2)
                    .map(|langs| langs.split(", ").filter(|l| !l.is_empty()).collect())
                    .unwrap_or_default();
            }
            EditFamily::TermInEditEntityCreate => {
                (action == EDITENTITY_CREATE).then(|| summary.param(1)).flatten()
            }
            EditFamily::Page => taxonomy
                .in_leaf(BroadCategory::Sitelink, action)
                .then(|| summary.param(1))
                .flatten(),
            EditFamily::PageMove => taxonomy
                .in_leaf(BroadCategory::SitelinkMove, action)
                .then(|| summary.param(1))
                .flatten(),
            EditFamily::PageRemoval => (taxonomy.in_leaf(BroadCategory::SitelinkMove, action)
                && summary.param(1).is_none())
            .then(|| summary.param(2))
            .flatten(),
            EditFamily::EditEntity => taxonomy
                .in_leaf(BroadCategory::EditEntity, action)
                .then_some(action),
            EditFamily::Property => taxonomy
                .in_composite(ALL_CLAIMS, action)
                .then(|| summary.property.as_deref())
                .flatten(),
        };
        key.into_iter().collect()
    }
}

type Buckets<'d> = IndexMap<String, Vec<&'d EnrichedEdit>>;

/// Unpatrolled slice of the enriched dataset, bucketed once per edit family
/// by category value.
pub struct CategoryWorklists<'d> {
    buckets: HashMap<EditFamily, Buckets<'d>>,
    models: &'d [String],
}

impl<'d> CategoryWorklists<'d> {
    pub fn new(edits: &'d [EnrichedEdit], taxonomy: &ActionTaxonomy, models: &'d [String]) -> Self {
        let mut buckets: HashMap<EditFamily, Buckets<'d>> = EditFamily::ALL
            .iter()
            .map(|f| (*f, IndexMap::new()))
            .collect();
        for edit in edits.iter().filter(|e| e.is_unpatrolled()) {
            for family in EditFamily::ALL {
                let Some(bucket) = buckets.get_mut(&family) else {
                    continue;
                };
                for key in family.keys(edit, taxonomy) {
                    let list = bucket.entry(key.to_string()).or_default();
                    // A language listed twice in one summary still lists the edit once.
                    if !list.last().is_some_and(|last| std::ptr::eq(*last, edit)) {
                        list.push(edit);
                    }
                }
            }
        }
        Self { buckets, models }
    }

    /// Distinct category values, in first-seen order.
    pub fn values(&self, family: EditFamily) -> IndexSet<String> {
        self.buckets
            .get(&family)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Edit list for one category value; empty for a value never seen.
    pub fn table(&self, family: EditFamily, value: &str) -> Table {
        let mut selected: Vec<&EnrichedEdit> = self
            .buckets
            .get(&family)
            .and_then(|b| b.get(value))
            .cloned()
            .unwrap_or_default();
        if family.sorted_by_actor() {
            selected.sort_by(|a, b| a.edit.actor.name.cmp(&b.edit.actor.name));
        }
        edit_list_table(&selected, self.models)
    }
}

/// `rc_id, rc_timestamp, rc_title, rc_this_oldid, actor_name,
/// oresc_<model>..., editsummary-magic-action`.
pub fn edit_list_table(edits: &[&EnrichedEdit], models: &[String]) -> Table {
    let mut columns: Vec<String> = ["rc_id", "rc_timestamp", "rc_title", "rc_this_oldid", "actor_name"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    columns.extend(models.iter().map(|m| format!("oresc_{m}")));
    columns.push("editsummary-magic-action".to_string());

    let mut table = Table::new(&columns);
    for e in edits {
        let mut row = vec![
            e.edit.rc_id.to_string(),
            format_mw_timestamp(&e.edit.timestamp),
            e.edit.title.clone(),
            e.edit.revision_id.to_string(),
            e.edit.actor.name.clone(),
        ];
        row.extend(models.iter().map(|m| opt_cell(e.score(m))));
        row.push(opt_cell(e.summary.action()));
        table.push(row);
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worklist::testing::{enriched, with_comment, with_score};

    fn models() -> Vec<String> {
        vec!["damaging".to_string(), "goodfaith".to_string()]
    }

    fn dataset() -> Vec<EnrichedEdit> {
        vec![
            with_comment(enriched(1, "Zed", false), "/* wbsetlabel-add:1|de */ Foo"),
            with_comment(enriched(2, "Amy", false), "/* wbsetaliases-add:1|de */ Bar"),
            with_comment(enriched(3, "Amy", true), "/* wbsetlabel-add:1|nl */ Baz"),
            with_comment(
                enriched(4, "Amy", false),
                "/* wbeditentity-update-languages-short:0||de, fr */ x",
            ),
            with_comment(enriched(5, "Amy", false), "/* wbeditentity-create:2|en */ new"),
            with_comment(enriched(6, "Bob", false), "/* wbsetsitelink-add:1|dewiki */ Berlin"),
            with_comment(enriched(7, "Bob", false), "/* clientsitelink-update:0|enwiki:A|enwiki:B */"),
            with_comment(enriched(8, "Bob", false), "/* clientsitelink-remove:1||frwiki */ Paris"),
            with_comment(
                enriched(9, "Bob", false),
                "/* wbsetclaim-create:2|P31|Q5 */ [[Property:P31]]: Q5",
            ),
            with_comment(enriched(10, "Bob", false), "no magic"),
        ]
    }

    #[test]
    fn values_per_family() {
        let edits = dataset();
        let taxonomy = ActionTaxonomy::wikidata();
        let models = models();
        let lists = CategoryWorklists::new(&edits, &taxonomy, &models);

        let v = |f| lists.values(f).into_iter().collect::<Vec<_>>();
        assert_eq!(v(EditFamily::Term), vec!["de"]);
        assert_eq!(v(EditFamily::TermInEditEntity), vec!["de", "fr"]);
        assert_eq!(v(EditFamily::TermInEditEntityCreate), vec!["en"]);
        assert_eq!(v(EditFamily::Page), vec!["dewiki"]);
        assert_eq!(v(EditFamily::PageMove), vec!["enwiki:A"]);
        assert_eq!(v(EditFamily::PageRemoval), vec!["frwiki"]);
        assert_eq!(
            v(EditFamily::EditEntity),
            vec!["wbeditentity-update-languages-short", "wbeditentity-create"]
        );
        assert_eq!(v(EditFamily::Property), vec!["P31"]);
    }

    #[test]
    fn term_table_sorted_by_actor() {
        let edits = dataset();
        let taxonomy = ActionTaxonomy::wikidata();
        let models = models();
        let lists = CategoryWorklists::new(&edits, &taxonomy, &models);
        let table = lists.table(EditFamily::Term, "de");
        let actors: Vec<&str> = table.rows().iter().map(|r| r[4].as_str()).collect();
        assert_eq!(actors, vec!["Amy", "Zed"]);
        assert_eq!(
            table.columns().last().map(String::as_str),
            Some("editsummary-magic-action")
        );
    }

    #[test]
    fn many_properties_are_bucketed_in_one_pass() {
        let taxonomy = ActionTaxonomy::wikidata();
        let parser = crate::classify::CommentParser::new(&taxonomy);
        let edits: Vec<EnrichedEdit> = (0..12_000)
            .map(|i| {
                let mut e = enriched(i, "Bob", false);
                e.edit.comment = format!("/* wbsetclaim-create:2||1 */ [[Property:P{}]]: [[Q5]]", i % 3000);
                e.summary = parser.parse(&e.edit.comment);
                e.category = crate::classify::classify(e.summary.action(), &taxonomy);
                e
            })
            .collect();
        let models = models();
        let lists = CategoryWorklists::new(&edits, &taxonomy, &models);

        let values = lists.values(EditFamily::Property);
        assert_eq!(values.len(), 3000);
        assert_eq!(values.get_index(0).map(String::as_str), Some("P0"));
        assert_eq!(values.get_index(2999).map(String::as_str), Some("P2999"));
        let total: usize = values
            .iter()
            .map(|v| lists.table(EditFamily::Property, v).len())
            .sum();
        assert_eq!(total, edits.len());
        let first = lists.table(EditFamily::Property, "P7");
        let ids: Vec<&str> = first.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["7", "3007", "6007", "9007"]);
        assert!(lists.table(EditFamily::Property, "P99999").is_empty());
    }

    #[test]
    fn repeated_language_lists_edit_once() {
        let edits = vec![with_comment(
            enriched(1, "Amy", false),
            "/* wbeditentity-update-languages-short:0||de, de */ x",
        )];
        let taxonomy = ActionTaxonomy::wikidata();
        let models = models();
        let lists = CategoryWorklists::new(&edits, &taxonomy, &models);
        assert_eq!(lists.table(EditFamily::TermInEditEntity, "de").len(), 1);
    }

    #[test]
    fn edit_list_renders_missing_scores_as_empty() {
        let scored = with_score(enriched(1, "A", false), "damaging", 0.25);
        let table = edit_list_table(&[&scored], &models());
        assert_eq!(table.columns()[5], "oresc_damaging");
        assert_eq!(table.rows()[0][5], "0.25");
        assert_eq!(table.rows()[0][6], "");
        assert_eq!(table.rows()[0][7], "");
    }
}

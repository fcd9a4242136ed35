//! One batch run: reconcile every artifact family and write every plain
//! report for a single enriched dataset.
//!
//! A run assumes exclusive ownership of the data root. Two runs against the
//! same root must not overlap.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::artifacts::family::{NOT_NS0, PATROLLERS, PATROL_DELAY};
use crate::artifacts::{ArtifactStore, ReconcileReport, Reconciler, Table};
use crate::config::PipelineConfig;
use crate::enrich::{enrich_edits, tag_frequencies, ScoreJoiner, TagIndex};
use crate::errors::{WdpdError, WdpdResult};
use crate::models::{
    BlockLogEntry, BroadCategory, ChangeTag, CurrentBlock, EnrichedEdit, EntityUsage,
    NamespacedEdit, PatrolEvent,
};
use crate::source::DataSource;
use crate::store::ArtifactIndex;
use crate::taxonomy::ActionTaxonomy;
use crate::worklist::aggregator::{actor_rollup_table, ores_worklist_table};
use crate::worklist::progress::{delay_table, patrollers_table, progress_languages};
use crate::worklist::blocks::{anonymous_block_history, registered_block_history};
use crate::worklist::{
    actor_rollup, compile_patrol_progress, ores_worklist, reports, ActorClass, BlockWindow,
    CategoryWorklists, EditFamily, OtherNamespaceWorklists, PatrolSummary, WorklistWindow,
};

pub const RUN_REPORT_FILE: &str = "run-report.json";
pub const UPDATE_FILE: &str = "update.txt";

/// Days of patrol log read before the oldest edit.
const REPLICA_WINDOW_DAYS: i64 = 31;

/// Everything a run publishes from.
#[derive(Clone, Copy, Debug)]
pub struct PublishInput<'d> {
    pub edits: &'d [EnrichedEdit],
    pub change_tags: &'d [ChangeTag],
    pub patrol_events: &'d [PatrolEvent],
    pub toplist: &'d [EntityUsage],
    pub other_namespace_edits: &'d [NamespacedEdit],
    pub translation_pages: &'d [String],
    pub block_log: &'d [BlockLogEntry],
    pub current_blocks: &'d [CurrentBlock],
    /// Item ids linked from the requests-for-deletion page.
    pub rfd_links: &'d [String],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportFailure {
    pub report: String,
    pub error: String,
}

/// Machine-readable outcome of a run, written as `run-report.json`.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub edits: usize,
    pub unpatrolled: usize,
    pub uncategorized: usize,
    pub summary: PatrolSummary,
    pub families: Vec<ReconcileReport>,
    pub reports_written: Vec<String>,
    pub report_failures: Vec<ReportFailure>,
}

impl RunReport {
    /// Per-category plus per-report failures.
    pub fn failure_count(&self) -> usize {
        self.families.iter().map(|f| f.failure_count()).sum::<usize>() + self.report_failures.len()
    }
}

struct Publisher<'a> {
    store: &'a ArtifactStore,
    written: Vec<String>,
    failures: Vec<ReportFailure>,
}

impl Publisher<'_> {
    fn record(&mut self, name: &str, outcome: WdpdResult<()>) {
        match outcome {
            Ok(()) => self.written.push(name.to_string()),
            Err(e) => {
                warn!(report = name, error = %e, "report failed");
                self.failures.push(ReportFailure {
                    report: name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn table(&mut self, template: &str, table: &Table) {
        let outcome = self.store.write_table(template, table).map(|_| ());
        self.record(template, outcome);
    }

    fn text(&mut self, name: &str, content: &str) {
        let outcome = self.store.write_text(Path::new(name), content);
        self.record(name, outcome);
    }
}

/// Reconcile all families and write all plain reports. Only failing to open
/// the artifact index aborts; every other failure is isolated and counted.
pub fn publish_all(
    input: PublishInput<'_>,
    taxonomy: &ActionTaxonomy,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> WdpdResult<RunReport> {
    let store = ArtifactStore::new(&config.data_path, config.head_limit);
    let index = ArtifactIndex::open(config.index_path())?;
    let reconciler = Reconciler::new(&store, &index, now);
    let edits = input.edits;

    // -- category-keyed families ---------------------------------------------
    let mut families = Vec::new();
    let lists = CategoryWorklists::new(edits, taxonomy, &config.models);
    for family in EditFamily::ALL {
        let values = lists.values(family);
        families.push(reconciler.reconcile(&family.artifact_family(), values, |value| {
            Ok(lists.table(family, value))
        })?);
    }

    let other = OtherNamespaceWorklists::new(input.other_namespace_edits, input.translation_pages);
    families.push(reconciler.reconcile(&NOT_NS0, other.values(), |namespace| {
        Ok(other.table(namespace))
    })?);

    let progress = compile_patrol_progress(edits, input.patrol_events);
    let languages = progress_languages(&progress);
    families.push(reconciler.reconcile(&PATROLLERS, languages.iter().cloned(), |lang| {
        Ok(patrollers_table(&progress, lang))
    })?);
    families.push(reconciler.reconcile(&PATROL_DELAY, languages, |lang| {
        Ok(delay_table(&progress, lang))
    })?);

    // -- plain reports -------------------------------------------------------
    let mut out = Publisher {
        store: &store,
        written: Vec::new(),
        failures: Vec::new(),
    };

    for window in WorklistWindow::ALL {
        let rows = actor_rollup(edits.iter().filter(|e| window.includes(e, now)));
        out.table(
            &format!("worklist-{{mode}}-{}.tsv", window.name()),
            &actor_rollup_table(&rows),
        );
    }

    if let Some(model) = config.models.first() {
        let anonymous = ores_worklist(edits, ActorClass::Anonymous, model, config.ores.anonymous);
        out.table("worklist-ores-{mode}.tsv", &ores_worklist_table(&anonymous, model));
        let registered = ores_worklist(edits, ActorClass::Registered, model, config.ores.registered);
        out.table(
            "worklist-ores-{mode}-registered.tsv",
            &ores_worklist_table(&registered, model),
        );
    }

    out.table(
        "worklist-items-many-revisions-{mode}.tsv",
        &reports::items_with_many_revisions(edits, config.max_qid_num),
    );
    out.table(
        "worklist-users-with-many-creations-{mode}.tsv",
        &reports::users_with_many_creations(edits),
    );
    out.table(
        "worklist-highly-used-items-{mode}.tsv",
        &reports::highly_used_items(edits, input.toplist, config.min_entity_usage),
    );
    out.table(
        "worklist-uncategorizable-editsummaries-{mode}.tsv",
        &reports::uncategorizable_edits(edits),
    );

    for window in BlockWindow::ALL {
        out.table(
            &format!("worklist-users-registered-with-block-history-{}-{{mode}}.tsv", window.name()),
            &registered_block_history(edits, input.block_log, input.current_blocks, window, now),
        );
        out.table(
            &format!("worklist-users-anon-with-block-history-{}-{{mode}}.tsv", window.name()),
            &anonymous_block_history(edits, input.block_log, input.current_blocks, window, now),
        );
    }

    let rfd = reports::rfd_linked_items(edits, input.rfd_links);
    out.text("wdrfd-linked-full.tsv", &rfd.render(None));

    let top = reports::top_patrollers(edits, input.patrol_events);
    let outcome = store
        .write_table_limited("top-patrollers-{mode}.tsv", &top, config.top_patrollers_head_limit)
        .map(|_| ());
    out.record("top-patrollers-{mode}.tsv", outcome);

    let summary = PatrolSummary::compute(edits, now);
    out.text("progress.txt", &summary.overall_text());
    out.text("progressRaw.txt", &summary.overall.raw());
    out.text("todayProgress.txt", &summary.today_text());
    out.text("todayProgressRaw.txt", &summary.today.raw());

    let tags = reports::change_tags_table(&tag_frequencies(input.change_tags));
    out.text("change-tags.tsv", &tags.render(None));

    let mut actions = Vec::new();
    let outcome = taxonomy
        .dump(&mut actions)
        .map_err(WdpdError::from)
        .and_then(|()| store.write_text(Path::new("actions.txt"), &String::from_utf8_lossy(&actions)));
    out.record("actions.txt", outcome);

    let report = RunReport {
        generated_at: now,
        edits: edits.len(),
        unpatrolled: edits.iter().filter(|e| e.is_unpatrolled()).count(),
        uncategorized: edits
            .iter()
            .filter(|e| e.category == BroadCategory::NoCat)
            .count(),
        summary,
        families,
        reports_written: out.written,
        report_failures: out.failures,
    };

    store.write_text(Path::new(RUN_REPORT_FILE), &serde_json::to_string_pretty(&report)?)?;
    store.write_text(Path::new(UPDATE_FILE), &now.timestamp().to_string())?;

    info!(
        edits = report.edits,
        families = report.families.len(),
        reports = report.reports_written.len(),
        failures = report.failure_count(),
        "published run"
    );
    Ok(report)
}

/// Fetch, enrich and publish in one call. Upstream reads happen before any
/// artifact is touched; the model resolver goes first.
pub fn run<S: DataSource>(
    source: &S,
    taxonomy: &ActionTaxonomy,
    config: &PipelineConfig,
    toplist: &[EntityUsage],
    rfd_links: &[String],
    now: DateTime<Utc>,
) -> WdpdResult<RunReport> {
    let joiner = ScoreJoiner::resolve(source, &config.models)?;
    let change_tags = source.change_tags()?;
    let edits = source.edits()?;
    let since = edits
        .iter()
        .map(|e| e.timestamp)
        .min()
        .unwrap_or(now - chrono::Duration::days(REPLICA_WINDOW_DAYS));
    let patrol_events = source.patrol_events(since)?;
    let other_namespace_edits = source.other_namespace_edits()?;
    let translation_pages = source.translation_pages()?;
    let block_log = source.block_log()?;
    let current_blocks = source.current_blocks()?;

    let enriched = enrich_edits(edits, &TagIndex::new(&change_tags), &joiner, taxonomy, config);
    publish_all(
        PublishInput {
            edits: &enriched,
            change_tags: &change_tags,
            patrol_events: &patrol_events,
            toplist,
            other_namespace_edits: &other_namespace_edits,
            translation_pages: &translation_pages,
            block_log: &block_log,
            current_blocks: &current_blocks,
            rfd_links,
        },
        taxonomy,
        config,
        now,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_mw_timestamp, Actor, Edit, PatrolStatus, ScoreRow, SourceKind};
    use crate::source::MemorySource;

    fn edit(rc_id: i64, actor: Actor, patrolled: bool, comment: &str) -> Edit {
        Edit {
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
            comment: comment.to_string(),
        }
    }

    fn source(edits: Vec<Edit>) -> MemorySource {
        MemorySource {
            score_rows: vec![ScoreRow {
                revision_id: 1001,
                model_id: 2,
                class: 1,
                probability: 0.3,
                is_predicted: false,
            }],
            change_tags: vec![ChangeTag {
                rc_id: 2,
                name: "mw-reverted".to_string(),
            }],
            edits,
            ..MemorySource::default()
        }
        .with_current_model("damaging", &[2])
        .with_current_model("goodfaith", &[3])
    }

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            data_path: root.to_path_buf(),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn full_run_writes_reports_and_reconciles() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let taxonomy = ActionTaxonomy::wikidata();
        let now = parse_mw_timestamp("20240301180000").unwrap();

        let first = source(vec![
            edit(1, Actor::registered("Alice", 1), false, "/* wbsetlabel-add:1|de */ Foo"),
            edit(2, Actor::anonymous("192.0.2.1"), false, "/* wbsetlabel-add:1|fr */ Bar"),
            edit(3, Actor::registered("Bob", 2), true, "manual edit"),
        ]);
        let report = run(&first, &taxonomy, &config, &[], &[], now).unwrap();
        assert_eq!(report.failure_count(), 0);
        assert_eq!(report.edits, 3);
        assert_eq!(report.uncategorized, 1);
        assert!(dir.path().join("term/worklist-de-terms-full.tsv").exists());
        assert!(dir.path().join("term/worklist-fr-terms-head.tsv").exists());
        assert!(dir.path().join("worklist-full-today.tsv").exists());
        assert!(dir.path().join("top-patrollers-head.tsv").exists());
        assert!(dir.path().join(RUN_REPORT_FILE).exists());

        let progress = std::fs::read_to_string(dir.path().join("progressRaw.txt")).unwrap();
        assert_eq!(progress, "1\t3");
        let update = std::fs::read_to_string(dir.path().join(UPDATE_FILE)).unwrap();
        assert_eq!(update, now.timestamp().to_string());
        let actions = std::fs::read_to_string(dir.path().join("actions.txt")).unwrap();
        assert!(actions.starts_with("claim\t"));

        // "fr" disappears: its pair goes, "de" stays.
        let second = source(vec![edit(
            1,
            Actor::registered("Alice", 1),
            false,
            "/* wbsetlabel-add:1|de */ Foo",
        )]);
        let report = run(&second, &taxonomy, &config, &[], &[], now).unwrap();
        let term = report.families.iter().find(|f| f.family == "term").unwrap();
        assert_eq!(term.deleted, vec!["fr"]);
        assert_eq!(term.unchanged, 1);
        assert!(!dir.path().join("term/worklist-fr-terms-full.tsv").exists());
        assert!(!dir.path().join("term/worklist-fr-terms-head.tsv").exists());
        assert!(dir.path().join("term/worklist-de-terms-full.tsv").exists());
    }

    #[test]
    fn run_report_is_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let taxonomy = ActionTaxonomy::wikidata();
        let now = parse_mw_timestamp("20240301180000").unwrap();
        let src = source(vec![edit(
            1,
            Actor::registered("Alice", 1),
            false,
            "/* wbsetclaim-create:2|P31|Q5 */ [[Property:P31]]: Q5",
        )]);
        run(&src, &taxonomy, &config, &[], &[], now).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(RUN_REPORT_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["edits"], 1);
        assert_eq!(json["summary"]["overall"]["total"], 1);
        let property = json["families"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["family"] == "property")
            .unwrap();
        assert_eq!(property["created"][0], "P31");
    }

    #[test]
    fn namespaces_blocks_and_rfd_links_are_published() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let taxonomy = ActionTaxonomy::wikidata();
        let now = parse_mw_timestamp("20240301180000").unwrap();

        let namespaced = |rc_id, namespace: &str| NamespacedEdit {
            edit: edit(rc_id, Actor::registered("Alice", 1), false, "talk"),
            namespace: namespace.to_string(),
        };
        let mut src = source(vec![
            edit(1, Actor::anonymous("192.0.2.7"), false, "/* wbsetlabel-add:1|de */ Foo"),
            edit(2, Actor::registered("Alice", 1), true, "manual edit"),
        ]);
        src.other_namespace_edits = vec![namespaced(10, "Property talk"), namespaced(11, "Wikidata")];
        src.block_log = vec![BlockLogEntry {
            target: "192.0.2.0/24".to_string(),
            timestamp: parse_mw_timestamp("20240101000000").unwrap(),
        }];
        let links = vec!["Q1".to_string()];
        let report = run(&src, &taxonomy, &config, &[], &links, now).unwrap();
        assert_eq!(report.failure_count(), 0);
        assert!(dir.path().join("not_ns0/worklist-Property_talk-full.tsv").exists());
        assert!(dir.path().join("not_ns0/worklist-Wikidata-head.tsv").exists());

        let anon = std::fs::read_to_string(
            dir.path().join("worklist-users-anon-with-block-history-1y-full.tsv"),
        )
        .unwrap();
        assert!(anon.contains("192.0.2.7\t1\t0\t1\t1\t\t"));
        assert!(dir
            .path()
            .join("worklist-users-registered-with-block-history-all-head.tsv")
            .exists());
        let rfd = std::fs::read_to_string(dir.path().join("wdrfd-linked-full.tsv")).unwrap();
        assert_eq!(rfd, "rc_title\trc_patrolled\tcnt\nQ1\t0.000\t1\n");

        // The "Wikidata" namespace goes quiet: its pair is removed.
        src.other_namespace_edits.truncate(1);
        let report = run(&src, &taxonomy, &config, &[], &links, now).unwrap();
        let not_ns0 = report.families.iter().find(|f| f.family == "not_ns0").unwrap();
        assert_eq!(not_ns0.deleted, vec!["Wikidata"]);
        assert!(!dir.path().join("not_ns0/worklist-Wikidata-full.tsv").exists());
        assert!(!dir.path().join("not_ns0/worklist-Wikidata-head.tsv").exists());
    }
}

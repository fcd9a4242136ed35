//! SQLite snapshot of the MediaWiki replica tables.
//!
//! Each public method opens its own connection so the caller never manages
//! connection lifetime. The queries mirror the ones run against the live
//! replica: only patrol-eligible (`rc_patrolled IN (0, 1)`) main-namespace
//! changes are read.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::{params, Connection, OpenFlags, Row};
use tracing::{debug, info};

use crate::errors::{WdpdError, WdpdResult};
use crate::models::{
    format_mw_timestamp, parse_mw_timestamp, Actor, BlockLogEntry, ChangeTag, CurrentBlock, Edit,
    NamespacedEdit, PatrolEvent, PatrolStatus, ScoreRow, SourceKind,
};
use crate::source::{
    BlockSource, ChangeTagSource, EditSource, OtherNamespaceSource, PatrolLogSource, ScoreSource,
};
use crate::store::schema;

/// Patrol log params are PHP-serialized; the patrolled revision sits under
/// the `4::curid` key.
static CURID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"s:8:"4::curid";s:\d+:"(\d+)";?"#).unwrap());

/// Namespace of translation-unit pages.
const TRANSLATIONS_NAMESPACE: i64 = 1198;

/// Namespace of user pages; block log entries are filed there.
const USER_NAMESPACE: i64 = 2;

/// Columns read by [`edit_from_row`], in order.
const EDIT_COLUMNS: &str = "rc_id, rc_timestamp, rc_title, rc_source, rc_patrolled, \
    COALESCE(rc_new_len, 0), COALESCE(rc_old_len, 0), rc_this_oldid, \
    actor_user, actor_name, comment_text";

fn edit_from_row(row: &Row<'_>) -> WdpdResult<Edit> {
    let timestamp: String = row.get(1)?;
    let source: String = row.get(3)?;
    let new_len: i64 = row.get(5)?;
    let old_len: i64 = row.get(6)?;
    Ok(Edit {
        rc_id: row.get(0)?,
        timestamp: parse_mw_timestamp(&timestamp)?,
        title: row.get(2)?,
        source: SourceKind::parse(&source),
        patrol_status: PatrolStatus::from_flag(row.get(4)?)?,
        len_diff: new_len - old_len,
        revision_id: row.get(7)?,
        actor: Actor {
            name: row.get(9)?,
            user_id: row.get(8)?,
        },
        comment: row.get(10)?,
    })
}

/// `<translatable page>/<section>/<lang>` becomes `<translatable page>/<lang>`.
pub fn translation_page(unit_title: &str) -> Option<String> {
    let mut parts = unit_title.rsplitn(3, '/');
    let lang = parts.next()?;
    let _section = parts.next()?;
    let page = parts.next()?;
    Some(format!("{page}/{lang}"))
}

/// Revision id a patrol log entry acted on.
pub fn patrolled_revision(log_params: &str) -> Option<i64> {
    CURID_RE
        .captures(log_params)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// ReplicaSnapshot
// ---------------------------------------------------------------------------

pub struct ReplicaSnapshot {
    db_path: PathBuf,
}

impl ReplicaSnapshot {
    /// Point at an existing snapshot. The file must exist.
    pub fn open(db_path: impl Into<PathBuf>) -> WdpdResult<Self> {
        let db_path = db_path.into();
        if !db_path.is_file() {
            return Err(WdpdError::Source(format!(
                "replica snapshot {} does not exist",
                db_path.display()
            )));
        }
        Ok(Self { db_path })
    }

    /// Create (or reuse) a snapshot file with the replica schema applied.
    pub fn create(db_path: impl Into<PathBuf>) -> WdpdResult<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        schema::init_replica_schema(&conn)?;
        info!(path = %db_path.display(), "initialised replica snapshot");
        Ok(Self { db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Read-write connection, for loading snapshot data.
    pub fn connect(&self) -> WdpdResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn connect_read_only(&self) -> WdpdResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| WdpdError::Source(format!("cannot open replica snapshot: {e}")))?;
        Ok(conn)
    }
}

impl EditSource for ReplicaSnapshot {
    fn edits(&self) -> WdpdResult<Vec<Edit>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDIT_COLUMNS} \
             FROM recentchanges \
               JOIN actor ON rc_actor = actor_id \
               JOIN comment ON rc_comment_id = comment_id \
             WHERE rc_patrolled IN (0, 1) AND rc_namespace = 0 \
             ORDER BY rc_id ASC;"
        ))?;
        let mut rows = stmt.query([])?;

        let mut edits = Vec::new();
        while let Some(row) = rows.next()? {
            edits.push(edit_from_row(row)?);
        }
        info!(count = edits.len(), "read patrol-eligible edits");
        Ok(edits)
    }
}

impl ChangeTagSource for ReplicaSnapshot {
    fn change_tags(&self) -> WdpdResult<Vec<ChangeTag>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT rc_id, ctd_name \
             FROM recentchanges \
               JOIN change_tag ON rc_id = ct_rc_id \
               JOIN change_tag_def ON ct_tag_id = ctd_id \
             WHERE rc_patrolled IN (0, 1) AND rc_namespace = 0 \
             ORDER BY ct_id ASC;",
        )?;
        let tags = stmt
            .query_map([], |row| {
                Ok(ChangeTag {
                    rc_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = tags.len(), "read change tags");
        Ok(tags)
    }
}

impl ScoreSource for ReplicaSnapshot {
    fn score_rows(&self) -> WdpdResult<Vec<ScoreRow>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT oresc_rev, oresc_model, oresc_class, oresc_probability, oresc_is_predicted \
             FROM ores_classification \
               JOIN recentchanges ON oresc_rev = rc_this_oldid \
             WHERE rc_patrolled IN (0, 1);",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ScoreRow {
                    revision_id: row.get(0)?,
                    model_id: row.get(1)?,
                    class: row.get(2)?,
                    probability: row.get(3)?,
                    is_predicted: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = rows.len(), "read model scores");
        Ok(rows)
    }

    fn current_model_ids(&self, model_name: &str) -> WdpdResult<Vec<i64>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT oresm_id FROM ores_model \
             WHERE oresm_name = ?1 AND oresm_is_current = 1 \
             ORDER BY oresm_id ASC;",
        )?;
        let ids = stmt
            .query_map(params![model_name], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

impl PatrolLogSource for ReplicaSnapshot {
    fn patrol_events(&self, since: DateTime<Utc>) -> WdpdResult<Vec<PatrolEvent>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT log_id, log_timestamp, log_params, actor_name \
             FROM logging \
               JOIN actor ON log_actor = actor_id \
             WHERE log_action = 'patrol' AND log_type = 'patrol' \
               AND log_namespace = 0 AND log_timestamp >= ?1 \
             ORDER BY log_timestamp ASC, log_id ASC;",
        )?;
        let mut rows = stmt.query(params![format_mw_timestamp(&since)])?;

        let mut events = Vec::new();
        let mut skipped = 0usize;
        while let Some(row) = rows.next()? {
            let params: Option<String> = row.get(2)?;
            let Some(revision_id) = params.as_deref().and_then(patrolled_revision) else {
                skipped += 1;
                continue;
            };
            let timestamp: String = row.get(1)?;
            events.push(PatrolEvent {
                log_id: row.get(0)?,
                revision_id,
                actor_name: row.get(3)?,
                timestamp: parse_mw_timestamp(&timestamp)?,
            });
        }
        if skipped > 0 {
            debug!(skipped, "patrol log rows without a revision id");
        }
        Ok(events)
    }
}

impl OtherNamespaceSource for ReplicaSnapshot {
    fn other_namespace_edits(&self) -> WdpdResult<Vec<NamespacedEdit>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDIT_COLUMNS}, COALESCE(ns_name, CAST(rc_namespace AS TEXT)) \
             FROM recentchanges \
               JOIN actor ON rc_actor = actor_id \
               JOIN comment ON rc_comment_id = comment_id \
               LEFT JOIN namespaces ON rc_namespace = ns_id \
             WHERE rc_patrolled IN (0, 1) AND rc_namespace != 0 \
             ORDER BY rc_id ASC;"
        ))?;
        let mut rows = stmt.query([])?;

        let mut edits = Vec::new();
        while let Some(row) = rows.next()? {
            edits.push(NamespacedEdit {
                edit: edit_from_row(row)?,
                namespace: row.get(11)?,
            });
        }
        info!(count = edits.len(), "read edits outside the main namespace");
        Ok(edits)
    }

    fn translation_pages(&self) -> WdpdResult<Vec<String>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT page_title \
             FROM revtag \
               JOIN page ON rt_page = page_id \
               JOIN recentchanges ON rc_this_oldid = rt_revision \
             WHERE rc_patrolled = 0 AND page_namespace = ?1 \
             ORDER BY page_title ASC;",
        )?;
        let titles = stmt
            .query_map(params![TRANSLATIONS_NAMESPACE], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut pages: Vec<String> = titles.iter().filter_map(|t| translation_page(t)).collect();
        pages.sort();
        pages.dedup();
        debug!(count = pages.len(), "read translation pages");
        Ok(pages)
    }
}

impl BlockSource for ReplicaSnapshot {
    fn block_log(&self) -> WdpdResult<Vec<BlockLogEntry>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT log_title, log_timestamp \
             FROM logging \
             WHERE log_type = 'block' AND log_action = 'block' AND log_namespace = ?1 \
             ORDER BY log_timestamp ASC, log_id ASC;",
        )?;
        let mut rows = stmt.query(params![USER_NAMESPACE])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let title: String = row.get(0)?;
            let timestamp: String = row.get(1)?;
            entries.push(BlockLogEntry {
                target: title.replace('_', " "),
                timestamp: parse_mw_timestamp(&timestamp)?,
            });
        }
        debug!(count = entries.len(), "read block log");
        Ok(entries)
    }

    fn current_blocks(&self) -> WdpdResult<Vec<CurrentBlock>> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(
            "SELECT ipb_address, ipb_range_start, ipb_range_end, ipb_expiry \
             FROM ipblocks \
             ORDER BY ipb_id ASC;",
        )?;
        let blocks = stmt
            .query_map([], |row| {
                Ok(CurrentBlock {
                    address: row.get(0)?,
                    range_start: row.get(1)?,
                    range_end: row.get(2)?,
                    expiry: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = blocks.len(), "read current blocks");
        Ok(blocks)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_snapshot(dir: &Path) -> ReplicaSnapshot {
        let snapshot = ReplicaSnapshot::create(dir.join("replica.sqlite3")).unwrap();
        let conn = snapshot.connect().unwrap();
        conn.execute_batch(
            "INSERT INTO actor VALUES (1, 100, 'Alice'), (2, NULL, '192.0.2.7');
             INSERT INTO comment VALUES (1, '/* wbsetlabel-add:1|en */ Foo'), (2, 'manual');
             INSERT INTO recentchanges VALUES
               (10, '20240301100000', 0, 'Q1', 'mw.edit', 0, 120, 100, 1000, 1, 1),
               (11, '20240301110000', 0, 'Q2', 'mw.new', 1, 50, NULL, 1001, 2, 2),
               (12, '20240301120000', 0, 'Q3', 'mw.edit', 2, 10, 10, 1002, 1, 2),
               (13, '20240301130000', 4, 'Project', 'mw.edit', 0, 10, 10, 1003, 1, 2);
             INSERT INTO change_tag_def VALUES (1, 'mw-reverted');
             INSERT INTO change_tag VALUES (1, 10, 1), (2, 12, 1);
             INSERT INTO ores_model VALUES (5, 'damaging', '0.4', 0), (6, 'damaging', '0.5', 1);
             INSERT INTO ores_classification(oresc_rev, oresc_model, oresc_probability)
               VALUES (1000, 6, 0.25), (1000, 5, 0.75);
             INSERT INTO logging VALUES
               (1, 'patrol', 'patrol', '20240301120000', 1, 0, 'Q2',
                'a:3:{s:8:\"4::curid\";s:4:\"1001\";s:9:\"5::previd\";s:1:\"0\";}'),
               (2, 'patrol', 'patrol', '20240301130000', 1, 0, 'Q3', 'garbage'),
               (3, 'block', 'block', '20230101000000', 1, 2, 'Some_Vandal', NULL),
               (4, 'block', 'unblock', '20230201000000', 1, 2, 'Some_Vandal', NULL),
               (5, 'block', 'block', '20240101000000', 1, 2, '192.0.2.0/24', NULL);
             INSERT INTO namespaces VALUES (4, 'Wikidata');
             INSERT INTO page VALUES (50, 1198, 'Wikidata:Tours/3/de');
             INSERT INTO revtag VALUES ('tp:transver', 50, 1003);
             INSERT INTO ipblocks VALUES
               (1, 'Some Vandal', 9, '', '', 'infinity'),
               (2, '192.0.2.0/24', 0, 'C0000200', 'C00002FF', '20250101000000');",
        )
        .unwrap();
        snapshot
    }

    #[test]
    fn reads_only_patrol_eligible_main_namespace_edits() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded_snapshot(dir.path());
        let edits = snapshot.edits().unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].len_diff, 20);
        assert!(edits[0].actor.is_registered());
        assert_eq!(edits[1].source, SourceKind::New);
        assert_eq!(edits[1].len_diff, 50);
        assert!(!edits[1].actor.is_registered());
    }

    #[test]
    fn tags_follow_eligible_changes() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded_snapshot(dir.path());
        let tags = snapshot.change_tags().unwrap();
        assert_eq!(tags, vec![ChangeTag { rc_id: 10, name: "mw-reverted".to_string() }]);
    }

    #[test]
    fn resolves_current_model_versions() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded_snapshot(dir.path());
        assert_eq!(snapshot.current_model_ids("damaging").unwrap(), vec![6]);
        assert!(snapshot.current_model_ids("goodfaith").unwrap().is_empty());
        assert_eq!(snapshot.score_rows().unwrap().len(), 2);
    }

    #[test]
    fn patrol_log_skips_unparseable_params() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded_snapshot(dir.path());
        let since = parse_mw_timestamp("20240301000000").unwrap();
        let events = snapshot.patrol_events(since).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].revision_id, 1001);
        assert_eq!(events[0].actor_name, "Alice");
    }

    #[test]
    fn other_namespaces_carry_their_name() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded_snapshot(dir.path());
        let edits = snapshot.other_namespace_edits().unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].namespace, "Wikidata");
        assert_eq!(edits[0].full_title(), "Wikidata:Project");
        assert_eq!(snapshot.translation_pages().unwrap(), vec!["Wikidata:Tours/de"]);
    }

    #[test]
    fn block_log_and_current_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = seeded_snapshot(dir.path());
        let log = snapshot.block_log().unwrap();
        let targets: Vec<&str> = log.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["Some Vandal", "192.0.2.0/24"]);
        let blocks = snapshot.current_blocks().unwrap();
        assert!(!blocks[0].is_range());
        assert!(blocks[1].is_range());
        assert!(blocks[1].covers_hex("C0000207"));
    }

    #[test]
    fn translation_unit_titles_drop_the_section() {
        assert_eq!(
            translation_page("Wikidata:Tours/Items/3/fr").as_deref(),
            Some("Wikidata:Tours/Items/fr")
        );
        assert_eq!(translation_page("Help:Intro/de"), None);
    }

    #[test]
    fn curid_extraction() {
        assert_eq!(
            patrolled_revision(r#"a:2:{s:8:"4::curid";s:10:"2040000000";}"#),
            Some(2_040_000_000)
        );
        assert_eq!(patrolled_revision("a:0:{}"), None);
    }

    #[test]
    fn open_missing_snapshot_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReplicaSnapshot::open(dir.path().join("nope.sqlite3")),
            Err(WdpdError::Source(_))
        ));
    }
}

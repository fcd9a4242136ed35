//! SQLite schema DDL.
//!
//! Two databases are described here: the sidecar artifact index owned by the
//! reconciler, and the replica snapshot read by
//! [`ReplicaSnapshot`](crate::source::replica::ReplicaSnapshot).

use rusqlite::Connection;

use crate::errors::{WdpdError, WdpdResult};

/// Artifact-index schema version stamped into `index_meta`.
pub const INDEX_SCHEMA_VERSION: i32 = 1;

/// Artifact-index DDL, safe to replay on an initialised database.
pub const INDEX_SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS index_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS artifacts (
        family TEXT NOT NULL,
        category TEXT NOT NULL,
        full_path TEXT NOT NULL,
        head_path TEXT NOT NULL,
        digest TEXT NOT NULL,
        row_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY(family, category)
    );",
    "CREATE INDEX IF NOT EXISTS idx_artifacts_family_updated ON artifacts(family, updated_at);",
];

/// Replica tables in the shape of the MediaWiki analytics replica, limited to
/// the columns the pipeline reads.
pub const REPLICA_SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS actor (
        actor_id INTEGER PRIMARY KEY,
        actor_user INTEGER,
        actor_name TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS comment (
        comment_id INTEGER PRIMARY KEY,
        comment_text TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS recentchanges (
        rc_id INTEGER PRIMARY KEY,
        rc_timestamp TEXT NOT NULL,
        rc_namespace INTEGER NOT NULL DEFAULT 0,
        rc_title TEXT NOT NULL,
        rc_source TEXT NOT NULL,
        rc_patrolled INTEGER NOT NULL,
        rc_new_len INTEGER,
        rc_old_len INTEGER,
        rc_this_oldid INTEGER NOT NULL,
        rc_actor INTEGER NOT NULL REFERENCES actor(actor_id),
        rc_comment_id INTEGER NOT NULL REFERENCES comment(comment_id)
    );",
    "CREATE TABLE IF NOT EXISTS change_tag_def (
        ctd_id INTEGER PRIMARY KEY,
        ctd_name TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS change_tag (
        ct_id INTEGER PRIMARY KEY,
        ct_rc_id INTEGER,
        ct_tag_id INTEGER NOT NULL REFERENCES change_tag_def(ctd_id)
    );",
    "CREATE TABLE IF NOT EXISTS ores_model (
        oresm_id INTEGER PRIMARY KEY,
        oresm_name TEXT NOT NULL,
        oresm_version TEXT,
        oresm_is_current INTEGER NOT NULL DEFAULT 0
    );",
    "CREATE TABLE IF NOT EXISTS ores_classification (
        oresc_id INTEGER PRIMARY KEY AUTOINCREMENT,
        oresc_rev INTEGER NOT NULL,
        oresc_model INTEGER NOT NULL,
        oresc_class INTEGER NOT NULL DEFAULT 1,
        oresc_probability REAL NOT NULL,
        oresc_is_predicted INTEGER NOT NULL DEFAULT 0
    );",
    "CREATE TABLE IF NOT EXISTS logging (
        log_id INTEGER PRIMARY KEY,
        log_type TEXT NOT NULL,
        log_action TEXT NOT NULL,
        log_timestamp TEXT NOT NULL,
        log_actor INTEGER NOT NULL REFERENCES actor(actor_id),
        log_namespace INTEGER NOT NULL DEFAULT 0,
        log_title TEXT NOT NULL DEFAULT '',
        log_params TEXT
    );",
    "CREATE TABLE IF NOT EXISTS namespaces (
        ns_id INTEGER PRIMARY KEY,
        ns_name TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS page (
        page_id INTEGER PRIMARY KEY,
        page_namespace INTEGER NOT NULL,
        page_title TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS revtag (
        rt_type TEXT NOT NULL,
        rt_page INTEGER NOT NULL REFERENCES page(page_id),
        rt_revision INTEGER NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS ipblocks (
        ipb_id INTEGER PRIMARY KEY,
        ipb_address TEXT NOT NULL,
        ipb_user INTEGER NOT NULL DEFAULT 0,
        ipb_range_start TEXT NOT NULL DEFAULT '',
        ipb_range_end TEXT NOT NULL DEFAULT '',
        ipb_expiry TEXT NOT NULL
    );",
    "CREATE INDEX IF NOT EXISTS rc_patrolled_ns ON recentchanges(rc_patrolled, rc_namespace);",
    "CREATE INDEX IF NOT EXISTS oresc_rev_model ON ores_classification(oresc_rev, oresc_model);",
    "CREATE INDEX IF NOT EXISTS ct_rc_id ON change_tag(ct_rc_id);",
    "CREATE INDEX IF NOT EXISTS log_type_action ON logging(log_type, log_action);",
];

/// Create the artifact-index tables and stamp the schema version. An index
/// written by a different schema version is refused.
pub fn init_index_schema(conn: &Connection) -> WdpdResult<()> {
    for stmt in INDEX_SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    match get_schema_version(conn) {
        0 => {
            conn.execute(
                "INSERT INTO index_meta(key, value) VALUES('schema_version', ?1);",
                rusqlite::params![INDEX_SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        }
        INDEX_SCHEMA_VERSION => Ok(()),
        other => Err(WdpdError::Artifact(format!(
            "artifact index has schema version {other}, expected {INDEX_SCHEMA_VERSION}"
        ))),
    }
}

/// Create the replica tables (used to build local snapshots and fixtures).
pub fn init_replica_schema(conn: &Connection) -> WdpdResult<()> {
    for stmt in REPLICA_SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    Ok(())
}

/// Read the schema version from `index_meta`; 0 when absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM index_meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_index_is_stamped() {
        let conn = Connection::open_in_memory().unwrap();
        init_index_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), INDEX_SCHEMA_VERSION);
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name;")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, vec!["artifacts", "index_meta"]);
    }

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_index_schema(&conn).unwrap();
        init_index_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), INDEX_SCHEMA_VERSION);
        let stamps: i64 = conn
            .query_row("SELECT COUNT(*) FROM index_meta;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stamps, 1);
    }

    #[test]
    fn foreign_version_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        init_index_schema(&conn).unwrap();
        conn.execute_batch("UPDATE index_meta SET value = '7' WHERE key = 'schema_version';")
            .unwrap();
        assert!(matches!(init_index_schema(&conn), Err(WdpdError::Artifact(_))));
    }

    #[test]
    fn replica_schema_applies_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        init_replica_schema(&conn).unwrap();
        init_replica_schema(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('recentchanges', 'ores_model', 'logging', 'ipblocks', 'revtag');",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }
}

//! Sidecar index of reconciled artifacts.
//!
//! Maps an artifact identity `(family, category)` to the pair of files on disk
//! and the digest of the last rendered content. The reconciler reads the set
//! of existing categories from here instead of slicing it out of filenames.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::errors::{WdpdError, WdpdResult};
use crate::store::schema;

/// One indexed artifact pair. Paths are relative to the data root.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactRecord {
    pub family: String,
    pub category: String,
    pub full_path: PathBuf,
    pub head_path: PathBuf,
    pub digest: String,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn parse_stored_time(raw: &str) -> WdpdResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WdpdError::Timestamp(format!("{raw:?}: {e}")))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(ArtifactRecord, String, String)> {
    let full: String = row.get(2)?;
    let head: String = row.get(3)?;
    let row_count: i64 = row.get(5)?;
    Ok((
        ArtifactRecord {
            family: row.get(0)?,
            category: row.get(1)?,
            full_path: PathBuf::from(full),
            head_path: PathBuf::from(head),
            digest: row.get(4)?,
            row_count: row_count.max(0) as usize,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
        },
        row.get(6)?,
        row.get(7)?,
    ))
}

fn finish_record(
    (mut record, created, updated): (ArtifactRecord, String, String),
) -> WdpdResult<ArtifactRecord> {
    record.created_at = parse_stored_time(&created)?;
    record.updated_at = parse_stored_time(&updated)?;
    Ok(record)
}

const SELECT_COLUMNS: &str =
    "family, category, full_path, head_path, digest, row_count, created_at, updated_at";

// ---------------------------------------------------------------------------
// ArtifactIndex
// ---------------------------------------------------------------------------

/// Every public method opens its own connection, so the index can be shared
/// by reference without managing connection lifetime.
pub struct ArtifactIndex {
    db_path: PathBuf,
}

impl ArtifactIndex {
    /// Open (creating if needed) the index at `db_path` and stamp its schema version.
    pub fn open(db_path: impl Into<PathBuf>) -> WdpdResult<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let index = Self { db_path };
        let conn = index.connect()?;
        schema::init_index_schema(&conn)?;
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> WdpdResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// All artifacts of `family`, ordered by category.
    pub fn list(&self, family: &str) -> WdpdResult<Vec<ArtifactRecord>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM artifacts WHERE family = ?1 ORDER BY category ASC;"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![family], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(finish_record).collect()
    }

    pub fn get(&self, family: &str, category: &str) -> WdpdResult<Option<ArtifactRecord>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM artifacts WHERE family = ?1 AND category = ?2;"
        );
        let raw = conn
            .query_row(&sql, params![family, category], record_from_row)
            .optional()?;
        raw.map(finish_record).transpose()
    }

    /// Insert or replace the record for `(family, category)`. The original
    /// `created_at` survives replacement.
    pub fn upsert(&self, record: &ArtifactRecord) -> WdpdResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO artifacts(family, category, full_path, head_path, digest, row_count, \
                                   created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(family, category) DO UPDATE SET \
                full_path = excluded.full_path, \
                head_path = excluded.head_path, \
                digest = excluded.digest, \
                row_count = excluded.row_count, \
                updated_at = excluded.updated_at;",
            params![
                record.family,
                record.category,
                record.full_path.to_string_lossy(),
                record.head_path.to_string_lossy(),
                record.digest,
                record.row_count as i64,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        debug!(family = %record.family, category = %record.category, "indexed artifact");
        Ok(())
    }

    /// Drop the record; returns whether one existed.
    pub fn remove(&self, family: &str, category: &str) -> WdpdResult<bool> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM artifacts WHERE family = ?1 AND category = ?2;",
            params![family, category],
        )?;
        Ok(removed > 0)
    }

    pub fn count(&self, family: &str) -> WdpdResult<usize> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM artifacts WHERE family = ?1;",
            params![family],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(category: &str, digest: &str, at: DateTime<Utc>) -> ArtifactRecord {
        ArtifactRecord {
            family: "term".to_string(),
            category: category.to_string(),
            full_path: PathBuf::from(format!("term/worklist-{category}-terms-full.tsv")),
            head_path: PathBuf::from(format!("term/worklist-{category}-terms-head.tsv")),
            digest: digest.to_string(),
            row_count: 3,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn upsert_keeps_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let index = ArtifactIndex::open(dir.path().join("index.sqlite3")).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        index.upsert(&record("de", "aaa", t0)).unwrap();
        index.upsert(&record("de", "bbb", t1)).unwrap();

        let stored = index.get("term", "de").unwrap().unwrap();
        assert_eq!(stored.digest, "bbb");
        assert_eq!(stored.created_at, t0);
        assert_eq!(stored.updated_at, t1);
        assert_eq!(index.count("term").unwrap(), 1);
    }

    #[test]
    fn list_is_scoped_to_family() {
        let dir = tempfile::tempdir().unwrap();
        let index = ArtifactIndex::open(dir.path().join("index.sqlite3")).unwrap();
        let now = Utc::now();
        index.upsert(&record("fr", "x", now)).unwrap();
        index.upsert(&record("de", "y", now)).unwrap();
        let mut other = record("enwiki", "z", now);
        other.family = "page".to_string();
        index.upsert(&other).unwrap();

        let cats: Vec<String> = index
            .list("term")
            .unwrap()
            .into_iter()
            .map(|r| r.category)
            .collect();
        assert_eq!(cats, vec!["de", "fr"]);
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let index = ArtifactIndex::open(dir.path().join("nested/index.sqlite3")).unwrap();
        index.upsert(&record("nl", "x", Utc::now())).unwrap();
        assert!(index.remove("term", "nl").unwrap());
        assert!(!index.remove("term", "nl").unwrap());
        assert!(index.get("term", "nl").unwrap().is_none());
    }
}

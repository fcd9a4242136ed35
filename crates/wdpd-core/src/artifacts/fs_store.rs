//! Artifact storage on the local filesystem, rooted at the data path.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::artifacts::family::ArtifactFamily;
use crate::artifacts::table::{RenderMode, Table};
use crate::errors::{WdpdError, WdpdResult};

const TMP_SUFFIX: &str = ".tmp";

/// Result of writing one full/head pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenPair {
    pub full_path: PathBuf,
    pub head_path: PathBuf,
    /// SHA-256 of the full rendering.
    pub digest: String,
    pub row_count: usize,
}

pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct ArtifactStore {
    root: PathBuf,
    head_limit: usize,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, head_limit: usize) -> Self {
        Self {
            root: root.into(),
            head_limit,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn head_limit(&self) -> usize {
        self.head_limit
    }

    fn resolve(&self, relative: &Path) -> WdpdResult<PathBuf> {
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(WdpdError::Artifact(format!(
                "{} escapes the data root",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Write `content` to `relative` through a sibling temp file and a rename,
    /// so readers never observe a half-written artifact.
    pub fn write_text(&self, relative: &Path, content: &str) -> WdpdResult<()> {
        let target = self.resolve(relative)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = target.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, &target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(path = %relative.display(), bytes = content.len(), "wrote artifact");
        Ok(())
    }

    /// Write a table as a full/head pair. `template` must contain `{mode}`.
    pub fn write_table(&self, template: &str, table: &Table) -> WdpdResult<WrittenPair> {
        self.write_table_limited(template, table, self.head_limit)
    }

    pub fn write_table_limited(
        &self,
        template: &str,
        table: &Table,
        head_limit: usize,
    ) -> WdpdResult<WrittenPair> {
        if !template.contains("{mode}") {
            return Err(WdpdError::Artifact(format!(
                "artifact name {template:?} has no {{mode}} placeholder"
            )));
        }
        let path_for = |mode: RenderMode| PathBuf::from(template.replace("{mode}", mode.as_str()));
        self.write_pair(
            path_for(RenderMode::Full),
            path_for(RenderMode::Head),
            table,
            head_limit,
        )
    }

    /// Write a family artifact pair for one category value.
    pub fn write_family_pair(
        &self,
        family: &ArtifactFamily,
        category: &str,
        table: &Table,
    ) -> WdpdResult<WrittenPair> {
        self.write_pair(
            family.relative_path(category, RenderMode::Full),
            family.relative_path(category, RenderMode::Head),
            table,
            self.head_limit,
        )
    }

    fn write_pair(
        &self,
        full_path: PathBuf,
        head_path: PathBuf,
        table: &Table,
        head_limit: usize,
    ) -> WdpdResult<WrittenPair> {
        let full = table.render_mode(RenderMode::Full, head_limit);
        let head = table.render_mode(RenderMode::Head, head_limit);
        self.write_text(&full_path, &full)?;
        self.write_text(&head_path, &head)?;
        Ok(WrittenPair {
            digest: content_digest(&full),
            row_count: table.len(),
            full_path,
            head_path,
        })
    }

    /// Delete both files of a pair. A file that is already gone counts as
    /// deleted. Both deletes are attempted even if the first one fails; the
    /// first error is returned.
    pub fn delete_pair(&self, full_path: &Path, head_path: &Path) -> WdpdResult<()> {
        let mut first_err = None;
        for relative in [full_path, head_path] {
            let outcome = self
                .resolve(relative)
                .and_then(|p| match std::fs::remove_file(&p) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e.into()),
                });
            if let Err(e) = outcome {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Remove files in `family`'s directory that are not in `known`. The
    /// reconciler owns the directory, so anything untracked is stale. Failures
    /// are logged and skipped; returns the number of files removed.
    pub fn sweep(&self, family: &ArtifactFamily, known: &HashSet<PathBuf>) -> usize {
        let dir = self.root.join(family.directory);
        if !dir.is_dir() {
            return 0;
        }
        let mut removed = 0usize;
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(family = family.name, error = %e, "cannot read artifact directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            if known.contains(&relative) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %relative.display(), "swept untracked artifact");
                }
                Err(e) => warn!(path = %relative.display(), error = %e, "cannot sweep artifact"),
            }
        }
        if removed > 0 {
            info!(family = family.name, removed, "swept untracked artifacts");
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

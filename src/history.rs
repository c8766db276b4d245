//! Backup history reconstruction
//!
//! History is never cached: each call lists the directory again and decodes
//! the names it finds.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult};
use crate::naming::NamingScheme;

/// One artifact found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry<A> {
    pub file_name: String,
    pub artifact: A,
}

impl<A> HistoryEntry<A> {
    /// Full path of the entry inside `dir`
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }
}

/// Artifacts of one kind, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHistory<A> {
    entries: Vec<HistoryEntry<A>>,
}

impl<A> BackupHistory<A> {
    /// Build a history from entries already in ascending name order
    pub fn new(entries: Vec<HistoryEntry<A>>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry<A>> {
        self.entries.iter()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&HistoryEntry<A>> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for BackupHistory<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<'a, A> IntoIterator for &'a BackupHistory<A> {
    type Item = &'a HistoryEntry<A>;
    type IntoIter = std::slice::Iter<'a, HistoryEntry<A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// List the names in `dir` accepted by `matches`, ascending
///
/// A directory that cannot be read is an environment fault and is returned
/// as [`BackupError::DirectoryRead`].
pub fn list<F>(dir: &Path, matches: F) -> BackupResult<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let read_error = |e: std::io::Error| BackupError::DirectoryRead {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        // Names that are not valid UTF-8 cannot match the grammar
        if let Some(name) = entry.file_name().to_str() {
            if matches(name) {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

/// Load and decode the history of one artifact kind
pub fn load<S: NamingScheme>(dir: &Path) -> BackupResult<BackupHistory<S::Artifact>> {
    let mut entries = Vec::new();
    for file_name in list(dir, S::matches)? {
        let artifact = S::decode(&file_name)?;
        entries.push(HistoryEntry {
            file_name,
            artifact,
        });
    }
    Ok(BackupHistory::new(entries))
}

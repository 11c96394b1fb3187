//! Directory scanner
//!
//! Lists the files in the watched folder that match a wildcard suffix pattern and
//! picks the most recently modified one. The acquisition software rewrites the same
//! `.lif` file every time the user saves, so "most recent mtime" is the file the
//! operator is working on.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{AppResult, WatcherError};

/// `*` followed by a literal suffix, matched case-insensitively on the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    suffix: String,
}

impl FilePattern {
    /// Parse `*lif`, `*.lif`, `*.LIF`... Returns `None` for anything else.
    pub fn parse(pattern: &str) -> Option<Self> {
        let suffix = pattern.strip_prefix('*')?;
        if suffix.is_empty() || suffix.contains(['*', '?', '/', '\\']) {
            return None;
        }
        Some(Self {
            suffix: suffix.to_lowercase(),
        })
    }

    /// Whether a file name matches. Hidden names (leading `.`) never do, as with a
    /// shell glob; this keeps AppleDouble `._name.lif` companions out of the scan.
    pub fn matches(&self, file_name: &str) -> bool {
        !file_name.starts_with('.') && file_name.to_lowercase().ends_with(&self.suffix)
    }
}

/// Identity of a displayed file: path plus modification time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    /// Absolute or watch-relative path
    pub path: PathBuf,
    /// Last modification time reported by the filesystem
    pub modified: SystemTime,
}

/// A matching file found during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path to the file
    pub path: PathBuf,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileEntry {
    /// Identity used for change detection
    pub fn identity(&self) -> FileIdentity {
        FileIdentity {
            path: self.path.clone(),
            modified: self.modified,
        }
    }

    fn order(&self, other: &Self) -> Ordering {
        self.modified
            .cmp(&other.modified)
            .then_with(|| self.path.cmp(&other.path))
    }
}

/// Scans one directory for candidate files.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    directory: PathBuf,
    pattern: FilePattern,
}

impl DirectoryScanner {
    /// Create a scanner. Fails with `Configuration` if the pattern is not `*<suffix>`.
    pub fn new(directory: impl Into<PathBuf>, pattern: &str) -> AppResult<Self> {
        let pattern = FilePattern::parse(pattern).ok_or_else(|| {
            WatcherError::Configuration(format!("Invalid file pattern '{pattern}'"))
        })?;
        Ok(Self {
            directory: directory.into(),
            pattern,
        })
    }

    /// Directory being watched
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// All matching regular files, sorted ascending by modification time.
    ///
    /// Equal modification times are ordered by path so the result does not depend on
    /// the order the filesystem enumerates entries. Entries that vanish between listing
    /// and stat (a temp file being renamed, say) are skipped.
    pub fn scan(&self) -> AppResult<Vec<FileEntry>> {
        let read_dir = fs::read_dir(&self.directory).map_err(|source| WatcherError::FileSystem {
            path: self.directory.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| WatcherError::FileSystem {
                path: self.directory.clone(),
                source,
            })?;

            let name = entry.file_name();
            if !self.pattern.matches(&name.to_string_lossy()) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!(file = %entry.path().display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::debug!(file = %entry.path().display(), error = %e, "No modification time");
                    continue;
                }
            };

            entries.push(FileEntry {
                path: entry.path(),
                modified,
            });
        }

        entries.sort_by(FileEntry::order);
        Ok(entries)
    }

    /// Most recently modified matching file, or `None` if the folder has none.
    pub fn latest(&self) -> AppResult<Option<FileEntry>> {
        Ok(self.scan()?.pop())
    }
}

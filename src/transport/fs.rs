use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::TallyError;
use crate::source::PartitionRef;

/// Files making up one partition on the local filesystem.
///
/// A partition path is either a single file or a directory of shard files.
/// Directories are walked recursively and shards are returned in sorted path
/// order so repeated scans visit files identically.
pub struct PartitionFiles {
    extension: String,
    follow_links: bool,
}

impl PartitionFiles {
    /// Accept directory entries ending in `extension` (case-insensitive).
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            follow_links: true,
        }
    }

    /// Configure symlink traversal.
    pub fn with_follow_symlinks(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Resolve `partition` to the files it contains.
    ///
    /// Returns `PartitionNotFound` when the path does not exist or a directory
    /// holds no matching files. Any other I/O failure while inspecting or
    /// walking the partition, including dangling shard links, is a
    /// `PartitionRead` error.
    pub fn resolve(&self, partition: &PartitionRef) -> Result<Vec<PathBuf>, TallyError> {
        let not_found = || TallyError::PartitionNotFound {
            year: partition.year,
            path: partition.path.clone(),
        };
        let path = partition.path.as_path();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(TallyError::read(path, err)),
        };
        if metadata.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        if !metadata.is_dir() {
            return Err(not_found());
        }
        let files = self.walk(path)?;
        if files.is_empty() {
            return Err(not_found());
        }
        Ok(files)
    }

    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, TallyError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(self.follow_links) {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(root).to_path_buf();
                TallyError::read(path, err)
            })?;
            if entry.file_type().is_file() && self.matches_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

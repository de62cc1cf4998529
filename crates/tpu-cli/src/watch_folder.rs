//! Input discovery
//!
//! The watch folder is scanned exactly once per run. Only regular files are
//! picked up, sorted by name and numbered from 1.

use crate::error::{PipelineError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// One input file of the run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub path: PathBuf,
    pub sequence: usize,
}

impl WorkItem {
    pub fn new(path: PathBuf, sequence: usize) -> Self {
        Self { path, sequence }
    }

    /// Bare file name, used in log lines and artifact naming
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.sequence, self.path.display())
    }
}

/// List the files of a watch folder as work items
pub fn scan(folder: &Path) -> Result<Vec<WorkItem>> {
    let entries = std::fs::read_dir(folder).map_err(|e| {
        PipelineError::config(format!(
            "could not determine files from watchfolder '{}': {}",
            folder.display(),
            e
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PipelineError::Io {
            path: folder.to_path_buf(),
            source,
        })?;

        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(PipelineError::config(format!(
            "could not determine files from watchfolder; there are no files in folder '{}'",
            folder.display()
        )));
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let items: Vec<WorkItem> = files
        .into_iter()
        .enumerate()
        .map(|(idx, path)| WorkItem::new(path, idx + 1))
        .collect();

    tracing::info!(
        folder = %folder.display(),
        files = items.len(),
        "Scanned watch folder"
    );

    Ok(items)
}

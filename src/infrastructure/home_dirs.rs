//! Scanning of the managed home root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppError, Result};

/// A directory directly under the home root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Lists the directories directly under `root`, sorted by name.
///
/// Non-UTF-8 names and plain files are skipped.
///
/// # Errors
/// Returns error if `root` cannot be read.
pub fn list_home_directories(root: &Path) -> Result<Vec<HomeEntry>> {
    let entries = fs::read_dir(root).map_err(|e| {
        AppError::io(format!("Failed to read home root {}", root.display()), e)
    })?;

    let mut dirs: Vec<HomeEntry> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            Some(HomeEntry {
                name,
                path: entry.path(),
            })
        })
        .collect();

    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(dirs)
}

/// Total size of regular files below `path`. Unreadable entries count as zero.
#[must_use]
pub fn directory_size(path: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(path) else {
        tracing::warn!(path = %path.display(), "Skipping unreadable directory");
        return 0;
    };

    entries
        .filter_map(std::result::Result::ok)
        .map(|entry| match entry.file_type() {
            Ok(t) if t.is_dir() => directory_size(&entry.path()),
            Ok(t) if t.is_file() => entry.metadata().map_or(0, |m| m.len()),
            _ => 0,
        })
        .sum()
}

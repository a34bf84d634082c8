//! The smb.conf file on disk and its in-process reader/writer guard.
//!
//! Every read takes the shared side and every rewrite the exclusive side, so a
//! reader outside the task queue never observes a half-written file.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::application::sections::ConfigDocument;
use crate::domain::{AppError, Result};

/// Guarded access to the managed config file.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    guard: RwLock<()>,
}

impl ConfigStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Takes the reader side of the guard.
    pub fn shared(&self) -> SharedConfig<'_> {
        SharedConfig {
            path: &self.path,
            _guard: self.guard.read(),
        }
    }

    /// Takes the writer side of the guard.
    pub fn exclusive(&self) -> ExclusiveConfig<'_> {
        ExclusiveConfig {
            path: &self.path,
            _guard: self.guard.write(),
        }
    }
}

/// Read view held while the shared lock is taken.
pub struct SharedConfig<'a> {
    path: &'a Path,
    _guard: RwLockReadGuard<'a, ()>,
}

impl SharedConfig<'_> {
    /// Reads the whole file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read.
    pub fn read_text(&self) -> Result<String> {
        read_file(self.path)
    }

    /// Reads and parses the file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read.
    pub fn read_document(&self) -> Result<ConfigDocument> {
        self.read_text().map(|text| ConfigDocument::parse(&text))
    }
}

/// Read/write view held while the exclusive lock is taken.
pub struct ExclusiveConfig<'a> {
    path: &'a Path,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl ExclusiveConfig<'_> {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path
    }

    /// Reads the whole file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read.
    pub fn read_text(&self) -> Result<String> {
        read_file(self.path)
    }

    /// Reads and parses the file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read.
    pub fn read_document(&self) -> Result<ConfigDocument> {
        self.read_text().map(|text| ConfigDocument::parse(&text))
    }

    /// Overwrites the file with `content`.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn write_text(&self, content: &str) -> Result<()> {
        fs::write(self.path, content).map_err(|e| {
            AppError::io(
                format!("Failed to write samba config: {}", self.path.display()),
                e,
            )
        })
    }

    /// Serializes and writes `doc`.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn write_document(&self, doc: &ConfigDocument) -> Result<()> {
        self.write_text(&doc.to_string())
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        AppError::io(
            format!("Failed to read samba config: {}", path.display()),
            e,
        )
    })
}

//! Resume checkpoint persistence.
//!
//! When a process step fails, the position of the failed step is written as
//! `{"lineNumber": N}` so an operator can rerun the command with `--resume`.
//! The file is removed once a run finishes without propagating an error. It is
//! advisory only and never read unless resumption is asked for.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Persisted resume position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeCheckpoint {
    /// Index of the failed step in the command's task list
    pub line_number: usize,
}

/// Reads and writes the checkpoint file at a fixed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored checkpoint, or `None` if there is none.
    pub fn load(&self) -> Result<Option<ResumeCheckpoint>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, checkpoint: ResumeCheckpoint) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&checkpoint)?)?;
        debug!(
            "Saved resume checkpoint {} to {}",
            checkpoint.line_number,
            self.path.display()
        );
        Ok(())
    }

    /// Remove the checkpoint; a missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed resume checkpoint {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

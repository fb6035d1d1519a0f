// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-directory record of FIT files that have already been handled.
//!
//! The ledger is a pretty-printed JSON array stored next to the FIT files.
//! A file is only added once it has been uploaded (or Garmin reported it
//! as a duplicate), so anything that failed is retried on the next scan.

use crate::error::{AppError, Result};
use crate::services::patcher::MODIFIED_SUFFIX;
use std::path::{Path, PathBuf};

/// Name of the ledger file inside each watched directory.
pub const LEDGER_FILE_NAME: &str = ".uploaded_files.json";

const FIT_SUFFIX: &str = ".fit";

/// Filenames already processed in one directory.
#[derive(Debug, Clone)]
pub struct UploadLedger {
    dir: PathBuf,
    files: Vec<String>,
    dry_run: bool,
}

impl UploadLedger {
    /// Load the ledger for `dir`, creating an empty one on disk if missing.
    ///
    /// In dry-run the file is never created.
    pub fn load(dir: &Path, dry_run: bool) -> Result<Self> {
        let path = dir.join(LEDGER_FILE_NAME);
        let files = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text)
                .map_err(|e| AppError::Ledger(format!("{}: {}", path.display(), e)))?
        } else {
            let ledger = Self {
                dir: dir.to_path_buf(),
                files: Vec::new(),
                dry_run,
            };
            ledger.flush()?;
            return Ok(ledger);
        };

        tracing::debug!(?files, "Found already uploaded files");
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            dry_run,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE_NAME)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.iter().any(|f| f == filename)
    }

    /// FIT files directly inside the directory that still need processing.
    ///
    /// Files written by this tool and files already in the ledger are
    /// excluded. Sorted by name.
    pub fn candidates(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let lower = name.to_lowercase();
            if !lower.ends_with(FIT_SUFFIX) || lower.ends_with(MODIFIED_SUFFIX) {
                continue;
            }
            if self.contains(&name) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Mark a file as processed (in memory only).
    pub fn record(&mut self, filename: &str) {
        if !self.contains(filename) {
            tracing::debug!(file = filename, "Adding file to uploaded list");
            self.files.push(filename.to_string());
        }
    }

    /// Persist the ledger. A no-op in dry-run.
    pub fn flush(&self) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let text = serde_json::to_string_pretty(&self.files)
            .map_err(|e| AppError::Ledger(e.to_string()))?;
        std::fs::write(self.path(), text)?;
        Ok(())
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload pipeline.
//!
//! Handles the per-file workflow:
//! 1. Read the activity timestamp
//! 2. Look up the workout name on Intervals.icu
//! 3. Patch the file into a scratch location
//! 4. Upload to Garmin Connect (and rename the new activity)
//! 5. Record the file in the directory's ledger

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fit::ActivityCodec;
use crate::models::{BatchSummary, UploadOutcome};
use crate::services::garmin::ActivityService;
use crate::services::intervals::WorkoutNameLookup;
use crate::services::ledger::UploadLedger;
use crate::services::patcher::{default_output_path, FitPatcher, PatchOutcome};
use crate::time_utils::distance;
use chrono::{DateTime, Days, Utc};
use std::path::Path;

/// Activity type used when searching Garmin Connect for the new upload.
const GARMIN_ACTIVITY_TYPE: &str = "cycling";

/// Result of running one candidate through the pipeline.
enum FileResult {
    Done(UploadOutcome),
    /// Could not be decoded; left out of the ledger so it is retried later
    Skipped,
}

/// Coordinates patching, uploading and ledger bookkeeping.
pub struct Uploader<C, R, N> {
    patcher: FitPatcher<C>,
    remote: R,
    names: N,
    config: Config,
}

impl<C, R, N> Uploader<C, R, N>
where
    C: ActivityCodec,
    R: ActivityService,
    N: WorkoutNameLookup,
{
    pub fn new(codec: C, remote: R, names: N, config: Config) -> Self {
        Self {
            patcher: FitPatcher::new(codec),
            remote,
            names,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process every new FIT file in `dir` and record it in the ledger.
    ///
    /// With `preinitialise` set, files are only recorded. A remote error
    /// aborts the batch; files already handled stay recorded.
    pub async fn upload_all(&self, dir: &Path, preinitialise: bool) -> Result<BatchSummary> {
        let mut ledger = UploadLedger::load(dir, self.config.dry_run)?;
        let files = ledger.candidates()?;
        let mut summary = BatchSummary::default();

        tracing::info!(count = files.len(), dir = %dir.display(), "Found files to edit/upload");
        tracing::debug!(?files, "Files to upload");
        if files.is_empty() {
            return Ok(summary);
        }

        for file in &files {
            tracing::info!(file = %file, "Processing");

            if !preinitialise {
                match self.process_candidate(dir, file).await {
                    Ok(FileResult::Done(UploadOutcome::Uploaded)) => summary.uploaded += 1,
                    Ok(FileResult::Done(UploadOutcome::Conflict)) => summary.conflicts += 1,
                    Ok(FileResult::Done(UploadOutcome::DryRun)) => {}
                    Ok(FileResult::Skipped) => {
                        summary.skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        if let Err(flush_err) = ledger.flush() {
                            tracing::warn!(error = %flush_err, "Failed to save upload ledger");
                        }
                        return Err(e);
                    }
                }
            }

            ledger.record(file);
            summary.recorded += 1;
        }

        ledger.flush()?;
        tracing::info!(
            uploaded = summary.uploaded,
            conflicts = summary.conflicts,
            skipped = summary.skipped,
            recorded = summary.recorded,
            "Directory processed"
        );
        Ok(summary)
    }

    async fn process_candidate(&self, dir: &Path, file: &str) -> Result<FileResult> {
        let path = dir.join(file);

        let timestamp = match self.patcher.timestamp(&path) {
            Ok(ts) => ts,
            Err(AppError::MalformedFile(msg)) => {
                tracing::warn!(
                    file = %file,
                    error = %msg,
                    "Failed to modify file, possibly malformed FIT file"
                );
                return Ok(FileResult::Skipped);
            }
            Err(e) => return Err(e),
        };
        let name = self.lookup_name(timestamp).await;

        // Patched copy lives only as long as this function
        let scratch = if self.config.dry_run {
            None
        } else {
            Some(tempfile::Builder::new().suffix(".fit").tempfile()?)
        };
        let output = match &scratch {
            Some(tmp) => tmp.path().to_path_buf(),
            None => default_output_path(&path),
        };

        let patched = match self
            .patcher
            .patch(&path, Some(&output), self.config.dry_run, &name)
        {
            Ok(p) => p,
            Err(AppError::MalformedFile(msg)) => {
                tracing::warn!(file = %file, error = %msg, "Failed to rebuild FIT file");
                return Ok(FileResult::Skipped);
            }
            Err(e) => return Err(e),
        };

        tracing::info!("Uploading modified file to Garmin Connect");
        let outcome = self
            .upload_patched(&patched.output, file, timestamp, &name)
            .await?;
        Ok(FileResult::Done(outcome))
    }

    /// Patch a single file to `<stem>_modified.fit`, optionally uploading it.
    pub async fn process_file(&self, path: &Path, upload: bool) -> Result<PatchOutcome> {
        let timestamp = self.patcher.timestamp(path)?;
        let name = self.lookup_name(timestamp).await;
        let outcome = self.patcher.patch(path, None, self.config.dry_run, &name)?;

        if upload {
            let original = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.upload_patched(&outcome.output, &original, timestamp, &name)
                .await?;
        }
        Ok(outcome)
    }

    /// Best-effort workout name; every failure degrades to `""`.
    async fn lookup_name(&self, timestamp: Option<DateTime<Utc>>) -> String {
        let Some(ts) = timestamp else {
            return String::new();
        };
        if self.config.dry_run {
            tracing::debug!("Dry run, skipping workout name lookup");
            return String::new();
        }
        match self.names.workout_name(ts).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(error = %e, "Workout name lookup failed, continuing without name");
                String::new()
            }
        }
    }

    async fn upload_patched(
        &self,
        patched: &Path,
        original: &str,
        timestamp: Option<DateTime<Utc>>,
        name: &str,
    ) -> Result<UploadOutcome> {
        if self.config.dry_run {
            tracing::info!(file = %original, "Dry run, skipping upload");
            return Ok(UploadOutcome::DryRun);
        }

        let bytes = tokio::fs::read(patched).await?;
        match self.remote.upload(bytes, original).await? {
            UploadOutcome::Uploaded => {
                tracing::info!(file = %original, "✅ Successfully uploaded");
                if let Some(ts) = timestamp.filter(|_| !name.is_empty()) {
                    match self.rename_uploaded(ts, name).await {
                        Ok(_) => {}
                        Err(e) if e.is_authentication() => return Err(e),
                        Err(e) => tracing::warn!(error = %e, "Failed to set activity name"),
                    }
                }
                Ok(UploadOutcome::Uploaded)
            }
            UploadOutcome::Conflict => {
                tracing::warn!(
                    file = %original,
                    "❌ Received HTTP conflict (activity already exists)"
                );
                Ok(UploadOutcome::Conflict)
            }
            UploadOutcome::DryRun => Ok(UploadOutcome::DryRun),
        }
    }

    /// Find the freshly uploaded activity by start time and give it `name`.
    ///
    /// Returns the number of activities renamed.
    async fn rename_uploaded(&self, timestamp: DateTime<Utc>, name: &str) -> Result<usize> {
        tracing::debug!("Attempting to change activity name");
        // Garmin needs a moment to process the upload
        tokio::time::sleep(self.config.grace_period).await;

        let day = timestamp.date_naive();
        let start = day.checked_sub_days(Days::new(1)).unwrap_or(day);
        let end = day.checked_add_days(Days::new(1)).unwrap_or(day);
        let activities = self
            .remote
            .list_activities(start, end, GARMIN_ACTIVITY_TYPE)
            .await?;

        let mut renamed = 0;
        for activity in activities {
            let Some(started) = activity.start_time() else {
                continue;
            };
            if distance(started, timestamp) < self.config.match_tolerance {
                tracing::debug!(
                    activity_id = activity.activity_id,
                    "Found matching Garmin activity"
                );
                self.remote.rename_activity(activity.activity_id, name).await?;
                renamed += 1;
            }
        }

        if renamed == 0 {
            tracing::info!("No matching Garmin activity found, name left unchanged");
        }
        Ok(renamed)
    }
}

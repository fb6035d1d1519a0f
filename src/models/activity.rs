// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Garmin Connect activity models and upload results.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used by the Garmin Connect activity list.
const GARMIN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Activity entry from the Garmin Connect activity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    /// Garmin activity ID
    pub activity_id: u64,
    /// Activity name/title
    #[serde(default)]
    pub activity_name: Option<String>,
    /// Start time in the athlete's local time zone
    pub start_time_local: String,
    /// Start time in UTC (absent on some older activities)
    #[serde(rename = "startTimeGMT", default)]
    pub start_time_gmt: Option<String>,
}

impl ActivitySummary {
    /// Absolute start instant.
    ///
    /// Uses the GMT field when present; otherwise the local time is
    /// interpreted in this machine's time zone.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        if let Some(gmt) = self.start_time_gmt.as_deref() {
            if let Ok(naive) = NaiveDateTime::parse_from_str(gmt, GARMIN_TIME_FORMAT) {
                return Some(naive.and_utc());
            }
        }
        let naive = NaiveDateTime::parse_from_str(&self.start_time_local, GARMIN_TIME_FORMAT).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// How Garmin Connect answered an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// HTTP 409: the activity already exists
    Conflict,
    /// Nothing was sent
    DryRun,
}

/// Counts for one directory scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files uploaded
    pub uploaded: u32,
    /// Files Garmin Connect already had
    pub conflicts: u32,
    /// Files skipped because they could not be decoded
    pub skipped: u32,
    /// Files added to the ledger
    pub recorded: u32,
}

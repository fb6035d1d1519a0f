// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Re-badging of TPV activity files as Garmin Edge 830 recordings.
//!
//! Garmin Connect only computes training effect for files it believes came
//! from one of its own devices. TPV writes `development` as the manufacturer,
//! so the `file_id` and `device_info` identity fields are rewritten here.

use crate::error::Result;
use crate::fit::profile::{garmin_product, manufacturer};
use crate::fit::{ActivityCodec, FitFile};
use crate::models::record::{workout_name_record, IdentitySummary};
use crate::models::{DeviceInfoRecord, IdentityRecord, Record};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Suffix of files written by this tool; such files are never re-processed.
pub const MODIFIED_SUFFIX: &str = "_modified.fit";

/// Manufacturer written into patched records.
pub const TARGET_MANUFACTURER: u16 = manufacturer::GARMIN;

/// Product written into patched records.
pub const TARGET_PRODUCT: u16 = garmin_product::EDGE_830;

/// Result of rewriting a record list.
#[derive(Debug)]
pub struct PatchedRecords {
    pub records: Vec<Record>,
    /// `time_created` of the first identity record
    pub timestamp: Option<DateTime<Utc>>,
    /// Number of identity/device records that were rewritten
    pub modified: usize,
}

/// Rewrite identity fields and optionally append a workout name record.
///
/// Records keep their original order; at most one record is appended.
pub fn patch_records(records: Vec<Record>, workout_name: Option<&str>) -> PatchedRecords {
    let mut timestamp = None;
    let mut modified = 0;
    let mut out = Vec::with_capacity(records.len() + 1);

    for (i, mut record) in records.into_iter().enumerate() {
        log_record(i, "Record", &record);
        let changed = match &mut record {
            Record::Identity(identity) => {
                if timestamp.is_none() {
                    timestamp = identity.created_at();
                    if let Some(ts) = timestamp {
                        tracing::info!(timestamp = %format_utc_rfc3339(ts), "Activity timestamp");
                    }
                }
                patch_identity(identity)
            }
            Record::DeviceInfo(device) => patch_device(device),
            Record::Other(_) => false,
        };
        if changed {
            modified += 1;
            log_record(i, "New record", &record);
        }
        out.push(record);
    }

    if let Some(name) = workout_name.filter(|n| !n.is_empty()) {
        tracing::debug!(name, "Adding workout name record");
        out.push(workout_name_record(name));
    }

    PatchedRecords {
        records: out,
        timestamp,
        modified,
    }
}

/// `file_id` written by TPV declares the development manufacturer.
fn patch_identity(identity: &mut IdentityRecord) -> bool {
    if identity.manufacturer_id() != Some(manufacturer::DEVELOPMENT) {
        return false;
    }
    identity.set_product_id(TARGET_PRODUCT);
    identity.set_manufacturer_id(TARGET_MANUFACTURER);
    true
}

fn patch_device(device: &mut DeviceInfoRecord) -> bool {
    if !is_third_party(device.manufacturer_id()) {
        return false;
    }
    device.set_garmin_product_id(TARGET_PRODUCT);
    device.set_product_id(TARGET_PRODUCT);
    device.set_manufacturer_id(TARGET_MANUFACTURER);
    true
}

/// Device manufacturers that get replaced: TPV itself, unset, and Wahoo trainers.
fn is_third_party(manufacturer_id: Option<u16>) -> bool {
    matches!(
        manufacturer_id,
        Some(manufacturer::DEVELOPMENT) | Some(0) | Some(manufacturer::WAHOO_FITNESS)
    )
}

fn log_record(index: usize, prefix: &str, record: &Record) {
    if let Some(summary) = IdentitySummary::of(record) {
        tracing::debug!(index, "{} - {}", prefix, summary);
    }
}

/// `<dir>/<stem>_modified.fit` next to the input.
pub fn default_output_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", stem, MODIFIED_SUFFIX))
}

/// Activity start time from the first identity record, if any.
///
/// The file is only read.
pub fn activity_timestamp<C: ActivityCodec>(
    codec: &C,
    path: &Path,
) -> Result<Option<DateTime<Utc>>> {
    let file = codec.decode_file(path)?;
    Ok(file
        .messages
        .into_iter()
        .map(Record::from)
        .find_map(|r| match r {
            Record::Identity(identity) => Some(identity.created_at()),
            _ => None,
        })
        .flatten())
}

/// Outcome of patching one file.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// Where the patched file was (or, in dry-run, would have been) written
    pub output: PathBuf,
    pub timestamp: Option<DateTime<Utc>>,
}

/// File-level patching on top of an [`ActivityCodec`].
#[derive(Debug, Clone, Default)]
pub struct FitPatcher<C> {
    codec: C,
}

impl<C: ActivityCodec> FitPatcher<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// See [`activity_timestamp`].
    pub fn timestamp(&self, path: &Path) -> Result<Option<DateTime<Utc>>> {
        activity_timestamp(&self.codec, path)
    }

    /// Patch `path` and write the result to `output` (or the default path).
    ///
    /// The whole file is encoded before anything is written. In dry-run the
    /// output path is returned but nothing touches the disk.
    pub fn patch(
        &self,
        path: &Path,
        output: Option<&Path>,
        dry_run: bool,
        workout_name: &str,
    ) -> Result<PatchOutcome> {
        let file = self.codec.decode_file(path)?;
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(path));

        let records = file.messages.into_iter().map(Record::from).collect();
        let patched = patch_records(records, Some(workout_name));
        tracing::debug!(modified = patched.modified, "Identity records rewritten");

        let rebuilt = FitFile {
            protocol_version: file.protocol_version,
            profile_version: file.profile_version,
            messages: patched
                .records
                .into_iter()
                .map(Record::into_message)
                .collect(),
        };
        let bytes = self.codec.encode(&rebuilt)?;

        tracing::info!(output = %output.display(), dry_run, "Saving modified data");
        if !dry_run {
            std::fs::write(&output, bytes)?;
        }

        Ok(PatchOutcome {
            output,
            timestamp: patched.timestamp,
        })
    }
}

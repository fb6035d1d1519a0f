// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod record;

pub use activity::{ActivitySummary, BatchSummary, UploadOutcome};
pub use record::{DeviceInfoRecord, IdentityRecord, Record};

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - patching, remote clients and the upload pipeline.

pub mod garmin;
pub mod intervals;
pub mod ledger;
pub mod oauth1;
pub mod patcher;
pub mod uploader;
pub mod watcher;

pub use garmin::{ActivityService, GarminConnectClient, TokenStore};
pub use intervals::{IntervalsClient, WorkoutNameLookup};
pub use ledger::UploadLedger;
pub use patcher::{FitPatcher, PatchOutcome};
pub use uploader::Uploader;

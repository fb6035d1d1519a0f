// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! TPV FIT uploader: make TrainingPeaks Virtual rides look like Garmin
//! Edge 830 recordings and upload them to Garmin Connect.
//!
//! Patched rides get Garmin's training effect analysis, and are renamed
//! after the workout title recorded on Intervals.icu when one is found.

pub mod cli;
pub mod config;
pub mod error;
pub mod fit;
pub mod models;
pub mod services;
pub mod setup;
pub mod time_utils;

pub use error::{AppError, Result};

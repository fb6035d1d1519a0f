// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with a consistent recovery policy.

use crate::config::ConfigError;
use crate::fit::FitError;

/// Application error type shared by every component.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Malformed FIT file: {0}")]
    MalformedFile(String),

    #[error("Garmin Connect authentication failed: {0}")]
    Authentication(String),

    #[error("Activity already exists on Garmin Connect")]
    RemoteConflict,

    #[error("Garmin Connect error: {0}")]
    Remote(String),

    #[error("Workout name lookup failed: {0}")]
    NameLookup(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upload ledger error: {0}")]
    Ledger(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Garmin Connect answered with HTTP 409.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::RemoteConflict)
    }

    /// Garmin Connect rejected the credentials or the session.
    pub fn is_authentication(&self) -> bool {
        matches!(self, AppError::Authentication(_))
    }

    /// Whether this error aborts the whole run.
    ///
    /// Malformed files are skipped and name lookups are best-effort;
    /// everything else stops processing.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AppError::MalformedFile(_) | AppError::RemoteConflict | AppError::NameLookup(_)
        )
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::MalformedFile(err.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppError>;

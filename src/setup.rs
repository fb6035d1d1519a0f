// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! First run setup: locate the TP Virtual user folder and write the config file.

use crate::config::{Config, ConfigFile};
use crate::error::{AppError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Subdirectory of the user folder where TPV writes rides.
pub const FIT_FILES_DIR: &str = "FITFiles";

/// TP Virtual data folder for the current platform.
pub fn tpv_folder() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Configuration("cannot determine home directory".to_string()))?;

    if cfg!(target_os = "macos") {
        return Ok(home.join("TPVirtual"));
    }
    if !cfg!(target_os = "windows") {
        tracing::info!(
            "This tool is only tested on Windows and macOS, the TP Virtual user folder may not be found"
        );
    }
    Ok(home.join("Documents").join("TPVirtual"))
}

/// Names of TPV user directories (16 word characters) under `tpv`, sorted.
pub fn find_user_dirs(tpv: &Path) -> Result<Vec<String>> {
    let pattern = Regex::new(r"\A\w{16}\z").map_err(anyhow::Error::from)?;
    let entries = std::fs::read_dir(tpv).map_err(|e| {
        AppError::Configuration(format!(
            "cannot read TP Virtual folder {}: {}",
            tpv.display(),
            e
        ))
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let name = entry?.file_name();
        if let Some(name) = name.to_str().filter(|n| pattern.is_match(n)) {
            found.push(name.to_string());
        }
    }
    found.sort();
    Ok(found)
}

/// Pick the user directory under `tpv` and save it to `config_path`.
///
/// Only an unambiguous choice is written; otherwise the user has to set
/// `TPV_ID` by hand.
pub fn first_run_in(tpv: &Path, config_path: &Path) -> Result<ConfigFile> {
    tracing::info!("Running first time setup");
    let found = find_user_dirs(tpv)?;

    let tpv_id = match found.as_slice() {
        [] => {
            return Err(AppError::Configuration(format!(
                "cannot find a TP Virtual user folder in {}, check that you have logged into TP Virtual",
                tpv.display()
            )))
        }
        [only] => only.clone(),
        many => {
            return Err(AppError::Configuration(format!(
                "found multiple TP Virtual user folders ({}), set TPV_ID in {}",
                many.join(", "),
                config_path.display()
            )))
        }
    };

    tracing::info!(
        dir = %tpv.join(&tpv_id).display(),
        "Found TP Virtual user directory, setting TPV_ID in config file"
    );
    let file = ConfigFile { tpv_id };
    file.save(config_path)?;
    Ok(file)
}

/// [`first_run_in`] against the platform TPV folder.
pub fn first_run(config_path: &Path, config: &Config) -> Result<ConfigFile> {
    let file = first_run_in(&tpv_folder()?, config_path)?;
    if config.require_credentials().is_err() {
        tracing::warn!(
            "GARMIN_USERNAME and GARMIN_PASSWORD are not set; daemon mode needs them in the environment or a .env file"
        );
    }
    Ok(file)
}

/// Where TPV writes rides for the configured user.
pub fn default_watch_dir(tpv: &Path, config: &Config) -> Result<PathBuf> {
    Ok(tpv.join(config.require_tpv_id()?).join(FIT_FILES_DIR))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Command line interface.

use clap::Parser;
use std::path::PathBuf;

/// Add Garmin device information to TP Virtual FIT files and upload them
/// to Garmin Connect.
#[derive(Parser, Debug)]
#[command(name = "tpv-fit-uploader")]
#[command(version)]
pub struct Cli {
    /// The FIT file or directory to process
    pub input: Option<PathBuf>,

    /// Upload the FIT file (after editing) to Garmin Connect
    #[arg(short, long)]
    pub upload: bool,

    /// Upload all FIT files in the directory that are not yet in the
    /// processed list
    #[arg(short = 'a', long, visible_alias = "ua", conflicts_with = "daemonise")]
    pub upload_all: bool,

    /// Preinitialise the list of processed FIT files without uploading
    #[arg(short, long)]
    pub preinitialise: bool,

    /// Monitor a directory and upload all newly created FIT files
    #[arg(short, long)]
    pub daemonise: bool,

    /// Perform a dry run: no files written, nothing uploaded
    #[arg(long)]
    pub dryrun: bool,

    /// Increase verbosity of log output
    #[arg(short, long)]
    pub verbose: bool,
}

/// What the invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Patch one file, optionally uploading it
    SingleFile { path: PathBuf, upload: bool },
    /// Process every new file in a directory (or only record them)
    Batch {
        dir: Option<PathBuf>,
        preinitialise: bool,
    },
    /// Watch a directory indefinitely
    Daemon { dir: Option<PathBuf> },
}

impl Cli {
    /// Resolve the mode; `None` when there is nothing to operate on.
    ///
    /// A directory of `None` means the configured TPV folder.
    pub fn mode(&self) -> Option<Mode> {
        if self.upload_all || self.preinitialise {
            Some(Mode::Batch {
                dir: self.input.clone(),
                preinitialise: self.preinitialise,
            })
        } else if self.daemonise {
            Some(Mode::Daemon {
                dir: self.input.clone(),
            })
        } else {
            self.input.clone().map(|path| Mode::SingleFile {
                path,
                upload: self.upload,
            })
        }
    }
}

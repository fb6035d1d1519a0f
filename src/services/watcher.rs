// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daemon mode: watch a directory and upload new rides as they appear.
//!
//! Filesystem events are forwarded over a channel to a single consumer, so
//! at most one batch runs at a time. Events that arrive while a batch is
//! running are coalesced into one rescan per directory.

use crate::error::Result;
use crate::fit::ActivityCodec;
use crate::services::garmin::ActivityService;
use crate::services::intervals::WorkoutNameLookup;
use crate::services::uploader::Uploader;
use anyhow::Context;
use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

fn is_fit(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("fit"))
}

/// Directory to rescan for a creation event, if it concerns a FIT file.
pub fn fit_creation_dir(event: &Event) -> Option<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => None,
        EventKind::Create(_) => event
            .paths
            .iter()
            .find(|p| is_fit(p))
            .and_then(|p| p.parent())
            .map(Path::to_path_buf),
        _ => None,
    }
}

/// Start a non-recursive watch on `dir`, sending directories to rescan on `tx`.
///
/// The watch stops when the returned watcher is dropped.
pub fn spawn_watcher(dir: &Path, tx: UnboundedSender<PathBuf>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if let Some(dir) = fit_creation_dir(&event) {
                // Receiver gone means we are shutting down
                let _ = tx.send(dir);
            }
        }
        Err(e) => tracing::warn!(error = %e, "Filesystem watch error"),
    })
    .context("creating filesystem watcher")?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching {}", dir.display()))?;
    Ok(watcher)
}

/// Consume rescan requests until `shutdown` resolves or the channel closes.
///
/// Each request waits `settle` for the writer to finish, then drains any
/// further requests and runs one batch per distinct directory. Batch
/// failures are logged and the directory is retried on the next event,
/// except authentication failures, which end the loop with the error.
pub async fn run_queue<C, R, N, F>(
    uploader: &Uploader<C, R, N>,
    mut rx: UnboundedReceiver<PathBuf>,
    settle: Duration,
    shutdown: F,
) -> Result<()>
where
    C: ActivityCodec,
    R: ActivityService,
    N: WorkoutNameLookup,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let first = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Received interrupt, stopping monitor");
                return Ok(());
            }
            next = rx.recv() => match next {
                Some(dir) => dir,
                None => return Ok(()),
            },
        };

        tracing::debug!(dir = %first.display(), "New file created");
        tokio::time::sleep(settle).await;

        let mut dirs = BTreeSet::from([first]);
        while let Ok(more) = rx.try_recv() {
            dirs.insert(more);
        }

        for dir in dirs {
            match uploader.upload_all(&dir, false).await {
                Ok(_) => {}
                Err(e) if e.is_authentication() => {
                    tracing::error!(error = %e, "Garmin Connect login failed, stopping monitor");
                    return Err(e);
                }
                Err(e) => tracing::error!(
                    dir = %dir.display(),
                    error = %e,
                    "Upload batch failed, will retry on next new file"
                ),
            }
        }
    }
}

/// Watch `dir` until `shutdown` resolves.
pub async fn watch<C, R, N, F>(uploader: &Uploader<C, R, N>, dir: &Path, shutdown: F) -> Result<()>
where
    C: ActivityCodec,
    R: ActivityService,
    N: WorkoutNameLookup,
    F: Future<Output = ()>,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let _watcher = spawn_watcher(dir, tx)?;
    tracing::info!(dir = %dir.display(), "Monitoring directory for new FIT files");

    run_queue(uploader, rx, uploader.config().settle_delay, shutdown).await
}

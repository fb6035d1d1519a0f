// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daemon queue behaviour, driven through the channel directly.

mod common;

use chrono::{TimeZone, Utc};
use common::*;
use std::time::Duration;
use tokio::sync::mpsc;
use tpv_fit_uploader::error::AppError;
use tpv_fit_uploader::services::ledger::LEDGER_FILE_NAME;
use tpv_fit_uploader::services::watcher::run_queue;

#[tokio::test]
async fn test_queued_directories_are_processed() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 17, 30, 0).unwrap();
    write_ride(first.path(), "a.fit", start);
    write_ride(second.path(), "b.fit", start);

    let remote = FakeActivityService::new();
    let names = FakeNameLookup::unnamed();
    let uploader = test_uploader(&remote, &names, test_config());

    let (tx, rx) = mpsc::unbounded_channel();
    // a burst of events for the same file collapses into one scan
    tx.send(first.path().to_path_buf()).unwrap();
    tx.send(first.path().to_path_buf()).unwrap();
    tx.send(second.path().to_path_buf()).unwrap();
    drop(tx);

    run_queue(&uploader, rx, Duration::ZERO, std::future::pending())
        .await
        .unwrap();

    assert_eq!(remote.uploads().len(), 2);
    assert!(first.path().join(LEDGER_FILE_NAME).exists());
    assert!(second.path().join(LEDGER_FILE_NAME).exists());
}

#[tokio::test]
async fn test_batch_failure_keeps_watching() {
    let dir = tempfile::tempdir().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 17, 30, 0).unwrap();
    write_ride(dir.path(), "a.fit", start);

    let remote = FakeActivityService::new().with_answers(&[Answer::ServerError]);
    let names = FakeNameLookup::unnamed();
    let uploader = test_uploader(&remote, &names, test_config());

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(dir.path().to_path_buf()).unwrap();

    let consumer = run_queue(&uploader, rx, Duration::ZERO, std::future::pending());
    let observer = remote.clone();
    let producer = async move {
        // the next file shows up after the first batch has hit the error
        while observer.uploads().is_empty() {
            tokio::task::yield_now().await;
        }
        tx.send(dir.path().to_path_buf()).unwrap();
        drop(tx);
        dir
    };
    let (result, dir) = tokio::join!(consumer, producer);
    result.unwrap();

    // first attempt failed, a later event retried and succeeded
    assert_eq!(remote.uploads().len(), 2);
    let text = std::fs::read_to_string(dir.path().join(LEDGER_FILE_NAME)).unwrap();
    assert!(text.contains("a.fit"));
}

#[tokio::test]
async fn test_login_failure_stops_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 17, 30, 0).unwrap();
    write_ride(dir.path(), "a.fit", start);

    let remote = FakeActivityService::new().with_answers(&[Answer::LoginRejected]);
    let names = FakeNameLookup::unnamed();
    let uploader = test_uploader(&remote, &names, test_config());

    // the sender stays open, so only the error can end the loop
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(dir.path().to_path_buf()).unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        run_queue(&uploader, rx, Duration::ZERO, std::future::pending()),
    )
    .await
    .expect("queue kept running after a rejected login")
    .unwrap_err();

    assert!(matches!(err, AppError::Authentication(_)));
    assert_eq!(remote.uploads().len(), 1);
    drop(tx);
}

#[tokio::test]
async fn test_shutdown_while_idle() {
    let remote = FakeActivityService::new();
    let names = FakeNameLookup::unnamed();
    let uploader = test_uploader(&remote, &names, test_config());

    // keep the sender alive so only the shutdown can end the loop
    let (_tx, rx) = mpsc::unbounded_channel::<std::path::PathBuf>();
    tokio::time::timeout(
        Duration::from_secs(5),
        run_queue(&uploader, rx, Duration::ZERO, async {}),
    )
    .await
    .expect("queue did not stop on shutdown")
    .unwrap();

    assert!(remote.calls().is_empty());
}

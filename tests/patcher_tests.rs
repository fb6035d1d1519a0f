// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity rewriting on synthetic record sequences.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::*;
use tpv_fit_uploader::fit::profile::{garmin_product, manufacturer, mesg_num, workout};
use tpv_fit_uploader::fit::{self, FitCodec, FitFile, Message};
use tpv_fit_uploader::models::{DeviceInfoRecord, IdentityRecord, Record};
use tpv_fit_uploader::services::patcher::{patch_records, FitPatcher};

fn ride_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 7, 15, 30).unwrap()
}

fn records(messages: Vec<Message>) -> Vec<Record> {
    messages.into_iter().map(Record::from).collect()
}

fn identity(record: &Record) -> IdentityRecord {
    match record {
        Record::Identity(r) => r.clone(),
        other => panic!("expected identity record, got {:?}", other),
    }
}

fn device(record: &Record) -> DeviceInfoRecord {
    match record {
        Record::DeviceInfo(r) => r.clone(),
        other => panic!("expected device info record, got {:?}", other),
    }
}

#[test]
fn test_record_count_and_order_preserved() {
    let input = records(tpv_ride_messages(ride_start()));
    let n = input.len();

    let unnamed = patch_records(input.clone(), None);
    assert_eq!(unnamed.records.len(), n);

    let named = patch_records(input.clone(), Some("Threshold"));
    assert_eq!(named.records.len(), n + 1);

    // Everything that is not an identity record comes through unchanged, in order
    let untouched = |rs: &[Record]| -> Vec<Message> {
        rs.iter()
            .filter(|r| matches!(r, Record::Other(_)))
            .map(|r| r.message().clone())
            .collect()
    };
    assert_eq!(untouched(&named.records[..n]), untouched(&input));
    for (before, after) in input.iter().zip(&named.records) {
        assert_eq!(before.message().global, after.message().global);
    }
}

#[test]
fn test_development_identity_is_rebadged() {
    let patched = patch_records(
        records(vec![identity_message(manufacturer::DEVELOPMENT, 0, ride_start())]),
        None,
    );
    let record = identity(&patched.records[0]);
    assert_eq!(record.manufacturer_id(), Some(manufacturer::GARMIN));
    assert_eq!(record.product_id(), Some(garmin_product::EDGE_830));
    assert_eq!(record.garmin_product_id(), Some(garmin_product::EDGE_830));
    assert_eq!(patched.timestamp, Some(ride_start()));
    assert_eq!(patched.modified, 1);
}

#[test]
fn test_other_identity_is_byte_identical() {
    for maker in [manufacturer::GARMIN, manufacturer::WAHOO_FITNESS, 0, manufacturer::ZWIFT] {
        let original = identity_message(maker, 1234, ride_start());
        let patched = patch_records(records(vec![original.clone()]), None);
        assert_eq!(patched.records[0].message(), &original, "manufacturer {}", maker);
        assert_eq!(patched.modified, 0);
    }
}

#[test]
fn test_third_party_devices_are_rebadged() {
    for maker in [manufacturer::DEVELOPMENT, 0, manufacturer::WAHOO_FITNESS] {
        let patched = patch_records(records(vec![device_message(maker, 34)]), None);
        let record = device(&patched.records[0]);
        assert_eq!(record.manufacturer_id(), Some(manufacturer::GARMIN));
        assert_eq!(record.product_id(), Some(garmin_product::EDGE_830));
        assert_eq!(record.garmin_product_id(), Some(garmin_product::EDGE_830));
    }
}

#[test]
fn test_other_devices_are_untouched() {
    for maker in [manufacturer::TACX, manufacturer::SARIS, manufacturer::GARMIN] {
        let original = device_message(maker, 2);
        let patched = patch_records(records(vec![original.clone()]), None);
        assert_eq!(patched.records[0].message(), &original);
    }
}

#[test]
fn test_workout_name_record_appended_last() {
    let patched = patch_records(records(tpv_ride_messages(ride_start())), Some("4x8 VO2"));
    let last = patched.records.last().unwrap().message();
    assert_eq!(last.global, mesg_num::WORKOUT);
    assert_eq!(last.get_string(workout::WKT_NAME).as_deref(), Some("4x8 VO2"));
}

#[test]
fn test_timestamp_from_first_identity_record() {
    let later = ride_start() + chrono::Duration::hours(1);
    let patched = patch_records(
        records(vec![
            sample_message(ride_start(), 100),
            identity_message(manufacturer::GARMIN, 1, ride_start()),
            identity_message(manufacturer::DEVELOPMENT, 0, later),
        ]),
        None,
    );
    assert_eq!(patched.timestamp, Some(ride_start()));
}

#[test]
fn test_patch_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ride.fit");
    std::fs::write(&input, tpv_ride_bytes(ride_start())).unwrap();

    let patcher = FitPatcher::new(FitCodec);
    assert_eq!(patcher.timestamp(&input).unwrap(), Some(ride_start()));

    let output = dir.path().join("out.fit");
    let outcome = patcher.patch(&input, Some(&output), false, "").unwrap();
    assert_eq!(outcome.output, output);

    let original = fit::decode(&std::fs::read(&input).unwrap()).unwrap();
    let patched = fit::decode(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(patched.messages.len(), original.messages.len());

    // Samples survive bit for bit
    let samples = |f: &FitFile| -> Vec<Message> {
        f.messages
            .iter()
            .filter(|m| m.global == RECORD_MESG)
            .cloned()
            .collect()
    };
    assert_eq!(samples(&patched), samples(&original));

    // Tacx trainer keeps its identity, TPV and Wahoo entries are rebadged
    let makers: Vec<Option<u16>> = patched
        .messages
        .iter()
        .filter(|m| m.global == mesg_num::DEVICE_INFO)
        .map(|m| DeviceInfoRecord(m.clone()).manufacturer_id())
        .collect();
    assert_eq!(
        makers,
        vec![
            Some(manufacturer::GARMIN),
            Some(manufacturer::GARMIN),
            Some(manufacturer::TACX)
        ]
    );
}

#[test]
fn test_patch_missing_input_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let patcher = FitPatcher::new(FitCodec);
    let err = patcher
        .patch(&dir.path().join("missing.fit"), None, false, "")
        .unwrap_err();
    assert!(matches!(
        err,
        tpv_fit_uploader::error::AppError::MalformedFile(_)
    ));
    assert!(!dir.path().join("missing_modified.fit").exists());
}

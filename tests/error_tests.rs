// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use tpv_fit_uploader::config::ConfigError;
use tpv_fit_uploader::error::AppError;
use tpv_fit_uploader::fit::FitError;

#[test]
fn test_is_conflict_matches() {
    assert!(AppError::RemoteConflict.is_conflict());

    let err = AppError::Remote("HTTP 409 Conflict".to_string());
    assert!(!err.is_conflict());

    let err = AppError::Authentication("MFA required".to_string());
    assert!(!err.is_conflict());
}

#[test]
fn test_is_authentication_matches() {
    assert!(AppError::Authentication("MFA required".to_string()).is_authentication());
    assert!(!AppError::Remote("HTTP 401".to_string()).is_authentication());
    assert!(!AppError::Configuration("GARMIN_USERNAME".to_string()).is_authentication());
}

#[test]
fn test_recoverable_errors() {
    assert!(!AppError::MalformedFile("Truncated".to_string()).is_fatal());
    assert!(!AppError::RemoteConflict.is_fatal());
    assert!(!AppError::NameLookup("HTTP 503".to_string()).is_fatal());
}

#[test]
fn test_fatal_errors() {
    assert!(AppError::Authentication("bad password".to_string()).is_fatal());
    assert!(AppError::Remote("HTTP 500".to_string()).is_fatal());
    assert!(AppError::Configuration("TPV_ID".to_string()).is_fatal());
    assert!(AppError::Ledger("corrupt".to_string()).is_fatal());
    assert!(AppError::Io(std::io::Error::other("disk full")).is_fatal());
}

#[test]
fn test_codec_errors_are_malformed_files() {
    let err: AppError = FitError::BadSignature.into();
    assert!(matches!(err, AppError::MalformedFile(_)));
    assert_eq!(err.to_string(), "Malformed FIT file: Missing .FIT signature");
}

#[test]
fn test_config_errors_are_configuration() {
    let err: AppError = ConfigError::Missing("TPV_ID").into();
    match err {
        AppError::Configuration(msg) => assert!(msg.contains("TPV_ID")),
        other => panic!("unexpected {:?}", other),
    }
}

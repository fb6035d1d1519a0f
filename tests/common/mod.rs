// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tpv_fit_uploader::config::Config;
use tpv_fit_uploader::error::{AppError, Result};
use tpv_fit_uploader::fit::profile::{
    base_type, device_info, file_id, manufacturer, mesg_num, FIT_EPOCH_OFFSET_SECS,
};
use tpv_fit_uploader::fit::{self, FitCodec, FitFile, Message};
use tpv_fit_uploader::models::{ActivitySummary, UploadOutcome};
use tpv_fit_uploader::services::{ActivityService, Uploader, WorkoutNameLookup};

/// Global message number of `record` (per second samples).
#[allow(dead_code)]
pub const RECORD_MESG: u16 = 20;

#[allow(dead_code)]
pub fn fit_seconds(ts: DateTime<Utc>) -> u32 {
    (ts.timestamp() - FIT_EPOCH_OFFSET_SECS) as u32
}

/// `file_id` as TPV writes it.
#[allow(dead_code)]
pub fn identity_message(manufacturer_id: u16, product: u16, start: DateTime<Utc>) -> Message {
    let mut msg = Message::new(mesg_num::FILE_ID)
        .with_u16(file_id::MANUFACTURER, manufacturer_id)
        .with_u16(file_id::PRODUCT, product)
        .with_u32(file_id::TIME_CREATED, fit_seconds(start));
    // type = activity
    msg.set_u8(file_id::TYPE, base_type::ENUM, 4);
    msg
}

#[allow(dead_code)]
pub fn device_message(manufacturer_id: u16, product: u16) -> Message {
    let mut msg = Message::new(mesg_num::DEVICE_INFO)
        .with_local(1)
        .with_u16(device_info::MANUFACTURER, manufacturer_id)
        .with_u16(device_info::PRODUCT, product);
    msg.set_u8(device_info::DEVICE_INDEX, base_type::UINT8, 0);
    msg
}

/// A `record` sample with timestamp and power.
#[allow(dead_code)]
pub fn sample_message(ts: DateTime<Utc>, power: u16) -> Message {
    Message::new(RECORD_MESG)
        .with_local(2)
        .with_u32(253, fit_seconds(ts))
        .with_u16(7, power)
}

/// The messages of a short TPV ride starting at `start`.
#[allow(dead_code)]
pub fn tpv_ride_messages(start: DateTime<Utc>) -> Vec<Message> {
    let mut messages = vec![
        identity_message(manufacturer::DEVELOPMENT, 0, start),
        device_message(manufacturer::DEVELOPMENT, 0),
        device_message(manufacturer::WAHOO_FITNESS, 34),
        device_message(manufacturer::TACX, 2),
    ];
    for i in 0..30 {
        messages.push(sample_message(
            start + chrono::Duration::seconds(i),
            200 + i as u16,
        ));
    }
    messages
}

#[allow(dead_code)]
pub fn tpv_ride_bytes(start: DateTime<Utc>) -> Vec<u8> {
    fit::encode(&FitFile::new(tpv_ride_messages(start))).expect("encode ride")
}

#[allow(dead_code)]
pub fn write_ride(dir: &Path, name: &str, start: DateTime<Utc>) {
    std::fs::write(dir.join(name), tpv_ride_bytes(start)).expect("write ride");
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config::default()
}

// ─── Fake Garmin Connect ─────────────────────────────────────────────────────

/// A call made against [`FakeActivityService`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Call {
    Upload { filename: String },
    List {
        start: NaiveDate,
        end: NaiveDate,
        activity_type: String,
    },
    Rename { activity_id: u64, name: String },
}

/// Scripted answer for one upload.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Answer {
    Uploaded,
    Conflict,
    ServerError,
    LoginRejected,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    uploads: Vec<Vec<u8>>,
    answers: VecDeque<Answer>,
    activities: Vec<ActivitySummary>,
    search_failure: Option<Answer>,
}

/// In-memory Garmin Connect. Clones share state, so a test can keep one
/// handle while the uploader owns another.
#[derive(Clone, Default)]
pub struct FakeActivityService {
    state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakeActivityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers for the next uploads, in order. Once exhausted every upload succeeds.
    pub fn with_answers(self, answers: &[Answer]) -> Self {
        self.state.lock().unwrap().answers = answers.iter().copied().collect();
        self
    }

    /// Activities returned by the activity search.
    pub fn with_activities(self, activities: Vec<ActivitySummary>) -> Self {
        self.state.lock().unwrap().activities = activities;
        self
    }

    /// Activity search fails the way `answer` would fail an upload.
    pub fn with_search_failure(self, answer: Answer) -> Self {
        self.state.lock().unwrap().search_failure = Some(answer);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn uploads(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().uploads.clone()
    }
}

#[async_trait]
impl ActivityService for FakeActivityService {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Upload {
            filename: filename.to_string(),
        });
        state.uploads.push(bytes);
        match state.answers.pop_front().unwrap_or(Answer::Uploaded) {
            Answer::Uploaded => Ok(UploadOutcome::Uploaded),
            Answer::Conflict => Ok(UploadOutcome::Conflict),
            Answer::ServerError => Err(AppError::Remote("HTTP 500".to_string())),
            Answer::LoginRejected => Err(AppError::Authentication("bad password".to_string())),
        }
    }

    async fn list_activities(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        activity_type: &str,
    ) -> Result<Vec<ActivitySummary>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List {
            start,
            end,
            activity_type: activity_type.to_string(),
        });
        match state.search_failure {
            Some(Answer::ServerError) => return Err(AppError::Remote("HTTP 500".to_string())),
            Some(Answer::LoginRejected) => {
                return Err(AppError::Authentication("HTTP 401".to_string()))
            }
            _ => {}
        }
        Ok(state.activities.clone())
    }

    async fn rename_activity(&self, activity_id: u64, name: &str) -> Result<()> {
        self.state.lock().unwrap().calls.push(Call::Rename {
            activity_id,
            name: name.to_string(),
        });
        Ok(())
    }
}

/// Garmin activity as returned by the search endpoint.
#[allow(dead_code)]
pub fn garmin_activity(activity_id: u64, start: DateTime<Utc>) -> ActivitySummary {
    ActivitySummary {
        activity_id,
        activity_name: Some("Virtual Cycling".to_string()),
        start_time_local: start.format("%Y-%m-%d %H:%M:%S").to_string(),
        start_time_gmt: Some(start.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

// ─── Fake Intervals.icu ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct FakeNameLookup {
    answer: std::result::Result<String, String>,
    queries: Arc<Mutex<Vec<DateTime<Utc>>>>,
}

#[allow(dead_code)]
impl FakeNameLookup {
    pub fn named(name: &str) -> Self {
        Self {
            answer: Ok(name.to_string()),
            queries: Arc::default(),
        }
    }

    /// No matching workout.
    pub fn unnamed() -> Self {
        Self::named("")
    }

    pub fn failing() -> Self {
        Self {
            answer: Err("HTTP 503".to_string()),
            queries: Arc::default(),
        }
    }

    pub fn queries(&self) -> Vec<DateTime<Utc>> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkoutNameLookup for FakeNameLookup {
    async fn workout_name(&self, timestamp: DateTime<Utc>) -> Result<String> {
        self.queries.lock().unwrap().push(timestamp);
        self.answer.clone().map_err(AppError::NameLookup)
    }
}

#[allow(dead_code)]
pub type TestUploader = Uploader<FitCodec, FakeActivityService, FakeNameLookup>;

#[allow(dead_code)]
pub fn test_uploader(
    remote: &FakeActivityService,
    names: &FakeNameLookup,
    config: Config,
) -> TestUploader {
    Uploader::new(FitCodec, remote.clone(), names.clone(), config)
}

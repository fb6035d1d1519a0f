// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout name lookup on Intervals.icu.
//!
//! TPV syncs each ride to Intervals.icu with the planned workout's title.
//! The title is found by matching the ride's start time.

use crate::config::IntervalsCredentials;
use crate::error::{AppError, Result};
use crate::time_utils::{distance, format_date};
use async_trait::async_trait;
use chrono::{DateTime, Days, Utc};
use serde::Deserialize;
use std::time::Duration;

const API_BASE: &str = "https://intervals.icu/api/v1";

/// OAuth client name Intervals.icu records for TPV uploads.
pub const TPV_CLIENT_NAME: &str = "Training Peaks Virtual";

/// Maximum start time difference (inclusive) for a match.
pub const MATCH_TOLERANCE: Duration = Duration::from_secs(15);

/// Source of human assigned workout titles.
#[async_trait]
pub trait WorkoutNameLookup: Send + Sync {
    /// Title of the workout that started at `timestamp`, or `""` if unknown.
    async fn workout_name(&self, timestamp: DateTime<Utc>) -> Result<String>;
}

/// Activity entry from the Intervals.icu activity list.
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalsActivity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub oauth_client_name: Option<String>,
}

/// Pick the TPV activity whose start lies within [`MATCH_TOLERANCE`] of `timestamp`.
pub fn match_workout_name(
    activities: &[IntervalsActivity],
    timestamp: DateTime<Utc>,
) -> Option<String> {
    activities
        .iter()
        .filter(|a| a.oauth_client_name.as_deref() == Some(TPV_CLIENT_NAME))
        .find(|a| {
            a.start_date
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .is_some_and(|start| {
                    distance(start.with_timezone(&Utc), timestamp) <= MATCH_TOLERANCE
                })
        })
        .and_then(|a| a.name.clone())
}

/// Intervals.icu API client. Without credentials every lookup yields `""`.
#[derive(Clone)]
pub struct IntervalsClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<IntervalsCredentials>,
}

impl IntervalsClient {
    pub fn new(credentials: Option<IntervalsCredentials>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            credentials,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    async fn list_activities(
        &self,
        credentials: &IntervalsCredentials,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<IntervalsActivity>> {
        let url = format!(
            "{}/athlete/{}/activities",
            self.base_url, credentials.athlete_id
        );
        // Intervals.icu filters by the athlete's local date, so widen by a day
        let day = timestamp.date_naive();
        let oldest = day.checked_sub_days(Days::new(1)).unwrap_or(day);
        let newest = day.checked_add_days(Days::new(1)).unwrap_or(day);

        let response = self
            .http
            .get(&url)
            .basic_auth("API_KEY", Some(&credentials.api_key))
            .query(&[("oldest", format_date(oldest)), ("newest", format_date(newest))])
            .send()
            .await
            .map_err(|e| AppError::NameLookup(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NameLookup(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::NameLookup(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl WorkoutNameLookup for IntervalsClient {
    async fn workout_name(&self, timestamp: DateTime<Utc>) -> Result<String> {
        let Some(credentials) = &self.credentials else {
            return Ok(String::new());
        };

        tracing::debug!("Searching for workout name on Intervals.icu");
        let activities = self.list_activities(credentials, timestamp).await?;
        match match_workout_name(&activities, timestamp) {
            Some(name) => {
                tracing::debug!(name = %name, "Found matching activity");
                Ok(name)
            }
            None => Ok(String::new()),
        }
    }
}

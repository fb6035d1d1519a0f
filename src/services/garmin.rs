// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin Connect client for uploading and renaming activities.
//!
//! Handles:
//! - Session reuse from the on-disk token store (garth compatible layout)
//! - SSO login with username/password when no usable session exists
//! - OAuth1 -> OAuth2 token exchange
//! - FIT upload with duplicate (409) detection
//! - Activity search and rename

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ActivitySummary, UploadOutcome};
use crate::services::oauth1::{self, Consumer};
use crate::time_utils::format_date;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

const SSO_BASE: &str = "https://sso.garmin.com/sso";
const API_BASE: &str = "https://connectapi.garmin.com";
const OAUTH_CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";
const USER_AGENT: &str = "com.garmin.android.apps.connectmobile";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const OAUTH1_FILE: &str = "oauth1_token.json";
const OAUTH2_FILE: &str = "oauth2_token.json";

/// Remote activity service the upload pipeline talks to.
#[async_trait]
pub trait ActivityService: Send + Sync {
    /// Upload a FIT file. A duplicate activity is reported as `Conflict`.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadOutcome>;

    /// Activities of one type whose start date lies in `[start, end]`.
    async fn list_activities(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        activity_type: &str,
    ) -> Result<Vec<ActivitySummary>>;

    async fn rename_activity(&self, activity_id: u64, name: &str) -> Result<()>;
}

/// OAuth1 token obtained from an SSO ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub mfa_token: Option<String>,
    #[serde(default)]
    pub mfa_expiration_timestamp: Option<String>,
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    "garmin.com".to_string()
}

/// OAuth2 bearer token used for API calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix timestamp; filled in locally when the token is received
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

impl OAuth2Token {
    /// Fill in absolute expiry times from the relative ones.
    fn stamped(mut self, now: i64) -> Self {
        if self.expires_at == 0 {
            self.expires_at = now + self.expires_in;
        }
        if self.refresh_token_expires_at == 0 {
            self.refresh_token_expires_at = now + self.refresh_token_expires_in;
        }
        self
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Cached session files.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable token file");
                None
            }
        }
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token serialization: {}", e)))?;
        std::fs::write(self.dir.join(name), text)?;
        Ok(())
    }

    pub fn load_oauth1(&self) -> Option<OAuth1Token> {
        self.load(OAUTH1_FILE)
    }

    pub fn load_oauth2(&self) -> Option<OAuth2Token> {
        self.load(OAUTH2_FILE)
    }

    pub fn save_session(&self, oauth1: &OAuth1Token, oauth2: &OAuth2Token) -> Result<()> {
        self.save(OAUTH1_FILE, oauth1)?;
        self.save(OAUTH2_FILE, oauth2)
    }
}

/// Active session: the OAuth1 token can mint new OAuth2 tokens.
#[derive(Debug, Clone)]
struct Session {
    oauth1: Option<OAuth1Token>,
    oauth2: OAuth2Token,
}

/// Garmin Connect API client.
pub struct GarminConnectClient {
    http: reqwest::Client,
    sso_base: String,
    api_base: String,
    store: TokenStore,
    username: Option<String>,
    password: Option<String>,
    session: Mutex<Option<Session>>,
}

impl GarminConnectClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            sso_base: SSO_BASE.to_string(),
            api_base: API_BASE.to_string(),
            store: TokenStore::new(&config.token_store),
            username: config.garmin_username.clone(),
            password: config.garmin_password.clone(),
            session: Mutex::new(None),
        })
    }

    // ─── Session Management ──────────────────────────────────────────────────

    /// Get a valid OAuth2 access token, logging in if required.
    ///
    /// Order of preference:
    /// 1. In-memory session
    /// 2. OAuth2 token from the token store
    /// 3. Fresh OAuth2 token exchanged from the stored OAuth1 token
    /// 4. Full SSO login with username/password
    async fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let mut session = self.session.lock().await;

        if let Some(s) = session.as_ref() {
            if !s.oauth2.is_expired(now) {
                return Ok(s.oauth2.access_token.clone());
            }
        }

        let stored_oauth1 = session
            .as_ref()
            .and_then(|s| s.oauth1.clone())
            .or_else(|| self.store.load_oauth1());

        if session.is_none() {
            if let Some(oauth2) = self.store.load_oauth2().filter(|t| !t.is_expired(now)) {
                tracing::debug!(
                    store = %self.store.dir().display(),
                    "Using stored Garmin credentials"
                );
                let token = oauth2.access_token.clone();
                *session = Some(Session {
                    oauth1: stored_oauth1,
                    oauth2,
                });
                return Ok(token);
            }
        }

        if let Some(oauth1) = stored_oauth1 {
            let consumer = self.consumer().await?;
            match self.exchange(&consumer, &oauth1).await {
                Ok(oauth2) => {
                    self.store.save_session(&oauth1, &oauth2)?;
                    let token = oauth2.access_token.clone();
                    *session = Some(Session {
                        oauth1: Some(oauth1),
                        oauth2,
                    });
                    return Ok(token);
                }
                Err(e) => {
                    tracing::info!(error = %e, "Stored Garmin session expired, logging in again");
                }
            }
        }

        let (oauth1, oauth2) = self.login().await?;
        self.store.save_session(&oauth1, &oauth2)?;
        let token = oauth2.access_token.clone();
        *session = Some(Session {
            oauth1: Some(oauth1),
            oauth2,
        });
        Ok(token)
    }

    /// Full SSO login: credentials -> service ticket -> OAuth1 -> OAuth2.
    async fn login(&self) -> Result<(OAuth1Token, OAuth2Token)> {
        let username = self.username.as_deref().ok_or_else(|| {
            AppError::Authentication("GARMIN_USERNAME is not set".to_string())
        })?;
        let password = self.password.as_deref().ok_or_else(|| {
            AppError::Authentication("GARMIN_PASSWORD is not set".to_string())
        })?;

        tracing::info!("Authenticating to Garmin Connect");
        tracing::debug!(username, "Using Garmin username");

        let ticket = self.sso_ticket(username, password).await?;
        let consumer = self.consumer().await?;
        let oauth1 = self.preauthorize(&consumer, &ticket).await?;
        let oauth2 = self.exchange(&consumer, &oauth1).await?;
        Ok((oauth1, oauth2))
    }

    async fn sso_ticket(&self, username: &str, password: &str) -> Result<String> {
        let embed_url = format!("{}/embed", self.sso_base);
        let signin_url = format!("{}/signin", self.sso_base);
        let signin_params = [
            ("id", "gauth-widget"),
            ("embedWidget", "true"),
            ("gauthHost", embed_url.as_str()),
            ("service", embed_url.as_str()),
            ("source", embed_url.as_str()),
            ("redirectAfterAccountLoginUrl", embed_url.as_str()),
            ("redirectAfterAccountCreationUrl", embed_url.as_str()),
        ];

        // Sets the SSO cookies
        self.http
            .get(&embed_url)
            .query(&[
                ("id", "gauth-widget"),
                ("embedWidget", "true"),
                ("gauthHost", self.sso_base.as_str()),
            ])
            .send()
            .await
            .map_err(auth_error)?;

        let page = self
            .http
            .get(&signin_url)
            .query(&signin_params)
            .send()
            .await
            .map_err(auth_error)?
            .text()
            .await
            .map_err(auth_error)?;
        let csrf = capture(r#"name="_csrf"\s+value="(.+?)""#, &page)
            .ok_or_else(|| AppError::Authentication("SSO page has no CSRF token".to_string()))?;

        let page = self
            .http
            .post(&signin_url)
            .query(&signin_params)
            .header(reqwest::header::REFERER, signin_url.as_str())
            .form(&[
                ("username", username),
                ("password", password),
                ("embed", "true"),
                ("_csrf", csrf.as_str()),
            ])
            .send()
            .await
            .map_err(auth_error)?
            .text()
            .await
            .map_err(auth_error)?;

        let title = capture(r"<title>(.+?)</title>", &page).unwrap_or_default();
        if title.contains("MFA") {
            return Err(AppError::Authentication(
                "Account requires multi-factor authentication, which is not supported".to_string(),
            ));
        }
        if title != "Success" {
            return Err(AppError::Authentication(format!(
                "SSO login rejected ({})",
                if title.is_empty() { "no title" } else { title.as_str() }
            )));
        }

        capture(r#"embed\?ticket=([^"]+)""#, &page)
            .ok_or_else(|| AppError::Authentication("SSO response has no ticket".to_string()))
    }

    async fn consumer(&self) -> Result<Consumer> {
        self.http
            .get(OAUTH_CONSUMER_URL)
            .send()
            .await
            .map_err(auth_error)?
            .error_for_status()
            .map_err(auth_error)?
            .json()
            .await
            .map_err(auth_error)
    }

    async fn preauthorize(&self, consumer: &Consumer, ticket: &str) -> Result<OAuth1Token> {
        let url = format!("{}/oauth-service/oauth/preauthorized", self.api_base);
        let login_url = format!("{}/embed", self.sso_base);
        let query = vec![
            ("ticket".to_string(), ticket.to_string()),
            ("login-url".to_string(), login_url),
            ("accepts-mfa-tokens".to_string(), "true".to_string()),
        ];
        let header = oauth1::authorization_header(consumer, None, "GET", &url, &query)
            .map_err(|_| AppError::Authentication("Failed to sign request".to_string()))?;

        let response = self
            .http
            .get(&url)
            .query(&query)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await
            .map_err(auth_error)?;
        if !response.status().is_success() {
            return Err(AppError::Authentication(format!(
                "OAuth1 preauthorization failed with status {}",
                response.status()
            )));
        }
        let body = response.text().await.map_err(auth_error)?;
        parse_oauth1_response(&body)
    }

    async fn exchange(&self, consumer: &Consumer, oauth1: &OAuth1Token) -> Result<OAuth2Token> {
        let url = format!("{}/oauth-service/oauth/exchange/user/2.0", self.api_base);
        let mut form = Vec::new();
        if let Some(mfa) = &oauth1.mfa_token {
            form.push(("mfa_token".to_string(), mfa.clone()));
        }
        let header = oauth1::authorization_header(
            consumer,
            Some((
                oauth1.oauth_token.as_str(),
                oauth1.oauth_token_secret.as_str(),
            )),
            "POST",
            &url,
            &form,
        )
        .map_err(|_| AppError::Authentication("Failed to sign request".to_string()))?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, header)
            .form(&form)
            .send()
            .await
            .map_err(auth_error)?;
        if !response.status().is_success() {
            return Err(AppError::Authentication(format!(
                "OAuth2 exchange failed with status {}",
                response.status()
            )));
        }
        let token: OAuth2Token = response.json().await.map_err(auth_error)?;
        Ok(token.stamped(Utc::now().timestamp()))
    }

    /// Check response status and map failures onto the error taxonomy.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 401 {
            return Err(AppError::Authentication(
                "Garmin Connect rejected the session token".to_string(),
            ));
        }
        if status.as_u16() == 409 {
            return Err(AppError::RemoteConflict);
        }
        if status.as_u16() == 429 {
            tracing::warn!("Garmin Connect rate limit hit (429)");
        }
        Err(AppError::Remote(format!("HTTP {}: {}", status, body)))
    }
}

#[async_trait]
impl ActivityService for GarminConnectClient {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadOutcome> {
        let token = self.access_token().await?;
        let url = format!("{}/upload-service/upload", self.api_base);
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Remote(e.to_string()))?;

        match Self::check_response(response).await {
            Ok(_) => Ok(UploadOutcome::Uploaded),
            Err(e) if e.is_conflict() => Ok(UploadOutcome::Conflict),
            Err(e) => Err(e),
        }
    }

    async fn list_activities(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        activity_type: &str,
    ) -> Result<Vec<ActivitySummary>> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/activitylist-service/activities/search/activities",
            self.api_base
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("startDate", format_date(start)),
                ("endDate", format_date(end)),
                ("activityType", activity_type.to_string()),
                ("start", "0".to_string()),
                ("limit", "20".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Remote(e.to_string()))?;

        Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Remote(format!("JSON parse error: {}", e)))
    }

    async fn rename_activity(&self, activity_id: u64, name: &str) -> Result<()> {
        let token = self.access_token().await?;
        let url = format!("{}/activity-service/activity/{}", self.api_base, activity_id);
        let body = serde_json::json!({
            "activityId": activity_id,
            "activityName": name,
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Remote(e.to_string()))?;

        Self::check_response(response).await?;
        tracing::debug!(activity_id, name, "Activity name set");
        Ok(())
    }
}

fn auth_error(e: reqwest::Error) -> AppError {
    AppError::Authentication(e.to_string())
}

fn capture(pattern: &str, haystack: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse the form-encoded OAuth1 token response.
fn parse_oauth1_response(body: &str) -> Result<OAuth1Token> {
    let mut token = None;
    let mut secret = None;
    let mut mfa_token = None;
    let mut mfa_expiration = None;

    for pair in body.trim().split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "oauth_token" => token = Some(value),
            "oauth_token_secret" => secret = Some(value),
            "mfa_token" => mfa_token = Some(value),
            "mfa_expiration_timestamp" => mfa_expiration = Some(value),
            _ => {}
        }
    }

    match (token, secret) {
        (Some(oauth_token), Some(oauth_token_secret)) => Ok(OAuth1Token {
            oauth_token,
            oauth_token_secret,
            mfa_token,
            mfa_expiration_timestamp: mfa_expiration,
            domain: default_domain(),
        }),
        _ => Err(AppError::Authentication(
            "OAuth1 response is missing the token".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oauth1_response() {
        let token = parse_oauth1_response("oauth_token=abc&oauth_token_secret=d%2Fe\n").unwrap();
        assert_eq!(token.oauth_token, "abc");
        assert_eq!(token.oauth_token_secret, "d/e");
        assert_eq!(token.mfa_token, None);
        assert_eq!(token.domain, "garmin.com");
    }

    #[test]
    fn test_parse_oauth1_response_missing_secret() {
        assert!(matches!(
            parse_oauth1_response("oauth_token=abc"),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn test_oauth2_token_expiry() {
        let json = r#"{"token_type":"Bearer","access_token":"x","expires_in":3600,
                       "refresh_token":"r","refresh_token_expires_in":7200}"#;
        let token: OAuth2Token = serde_json::from_str(json).unwrap();
        let token = token.stamped(1_000);
        assert_eq!(token.expires_at, 4_600);
        assert_eq!(token.refresh_token_expires_at, 8_200);
        assert!(!token.is_expired(4_599));
        assert!(token.is_expired(4_600));
    }

    #[test]
    fn test_token_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join(".garth"));
        assert!(store.load_oauth2().is_none());

        let oauth1 = OAuth1Token {
            oauth_token: "t".to_string(),
            oauth_token_secret: "s".to_string(),
            mfa_token: None,
            mfa_expiration_timestamp: None,
            domain: default_domain(),
        };
        let oauth2: OAuth2Token = serde_json::from_str(
            r#"{"token_type":"Bearer","access_token":"a","expires_in":10,"expires_at":99}"#,
        )
        .unwrap();
        store.save_session(&oauth1, &oauth2).unwrap();

        assert_eq!(store.load_oauth1().unwrap().oauth_token, "t");
        assert_eq!(store.load_oauth2().unwrap().expires_at, 99);
    }

    #[test]
    fn test_corrupt_token_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OAUTH2_FILE), "not json").unwrap();
        let store = TokenStore::new(dir.path());
        assert!(store.load_oauth2().is_none());
    }

    #[test]
    fn test_capture_sso_fields() {
        let page = r#"<input type="hidden" name="_csrf" value="CSRF123" />
            <title>Success</title>
            var response_url = "https://sso.garmin.com/sso/embed?ticket=ST-0123-abc";"#;
        assert_eq!(
            capture(r#"name="_csrf"\s+value="(.+?)""#, page).as_deref(),
            Some("CSRF123")
        );
        assert_eq!(
            capture(r"<title>(.+?)</title>", page).as_deref(),
            Some("Success")
        );
        assert_eq!(
            capture(r#"embed\?ticket=([^"]+)""#, page).as_deref(),
            Some("ST-0123-abc")
        );
    }
}

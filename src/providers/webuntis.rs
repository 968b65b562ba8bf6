// ABOUTME: WebUntis adapter speaking the JSON-RPC session API
// ABOUTME: Maps timetable, substitution, message-of-day, and homework data into the canonical schema
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # WebUntis Adapter
//!
//! WebUntis exposes a JSON-RPC endpoint per school
//! (`https://<server>/WebUntis/jsonrpc.do?school=<school>`). `authenticate`
//! opens a server-side session bound to a `JSESSIONID` cookie; all further
//! calls ride on that cookie and `logout` invalidates it. The cookie store
//! lives inside the per-call HTTP client, so nothing survives the sync.
//!
//! Lesson numbers are not part of timetable entries; they are resolved
//! against the school's timegrid (`getTimegridUnits`).

use super::core::{require_field, PlatformAdapter, PlatformConfig, PlatformId};
use super::http;
use crate::config::EngineConfig;
use crate::diagnostics::{fetch_with_diagnostic, FetchError};
use crate::errors::{AppError, AppResult};
use crate::mapping::{
    classify_substitution, untis_date, untis_time, DEFAULT_SUBJECT,
};
use crate::models::{
    HomeworkData, LessonData, MessageData, PlatformCredentials, SubstitutionData,
    SubstitutionType, SyncCategory, SyncResult,
};
use crate::ssrf::validate_platform_url;
use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

/// JSON-RPC method-not-found, per spec
const RPC_METHOD_NOT_FOUND: i64 = -32601;

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    id: &'a str,
    method: &'a str,
    params: P,
    jsonrpc: &'a str,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct AuthenticateResult {
    #[serde(rename = "personId")]
    person_id: Option<i64>,
    #[serde(rename = "klasseId")]
    klasse_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NamedElement {
    name: Option<String>,
    #[serde(rename = "orgname")]
    org_name: Option<String>,
    #[serde(rename = "longname")]
    long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimetableEntry {
    date: u32,
    #[serde(rename = "startTime")]
    start_time: u32,
    #[serde(rename = "endTime")]
    end_time: u32,
    #[serde(default)]
    su: Vec<NamedElement>,
    #[serde(default)]
    te: Vec<NamedElement>,
    #[serde(default)]
    ro: Vec<NamedElement>,
}

#[derive(Debug, Deserialize)]
struct SubstitutionEntry {
    date: u32,
    #[serde(rename = "startTime")]
    start_time: u32,
    #[serde(rename = "type")]
    type_code: Option<String>,
    #[serde(default)]
    txt: Option<String>,
    #[serde(default)]
    su: Vec<NamedElement>,
    #[serde(default)]
    te: Vec<NamedElement>,
    #[serde(default)]
    ro: Vec<NamedElement>,
}

#[derive(Debug, Deserialize)]
struct TimegridDay {
    #[serde(rename = "timeUnits", default)]
    time_units: Vec<TimeUnit>,
}

#[derive(Debug, Deserialize)]
struct TimeUnit {
    #[serde(rename = "startTime")]
    start_time: u32,
}

#[derive(Debug, Deserialize)]
struct MessageOfDay {
    id: i64,
    subject: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HomeworkEntry {
    id: i64,
    subject: Option<String>,
    text: Option<String>,
    #[serde(rename = "dueDate")]
    due_date: u32,
    #[serde(default)]
    completed: bool,
}

/// WebUntis platform adapter
pub struct WebUntisAdapter {
    request_timeout: StdDuration,
    login_timeout: StdDuration,
    base_url: Option<String>,
}

impl WebUntisAdapter {
    /// Adapter with engine timeouts
    #[must_use]
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            request_timeout: engine.request_timeout,
            login_timeout: engine.login_timeout,
            base_url: None,
        }
    }

    /// Adapter pinned to an operator-injected base URL
    ///
    /// Used by integration tests against a local mock server; the SSRF guard
    /// only applies to user-supplied `server` config values, which this
    /// bypasses.
    #[must_use]
    pub fn with_base_url(engine: &EngineConfig, base_url: impl Into<String>) -> Self {
        Self {
            request_timeout: engine.request_timeout,
            login_timeout: engine.login_timeout,
            base_url: Some(base_url.into()),
        }
    }

    fn endpoint(&self, config: &PlatformConfig) -> AppResult<String> {
        let base = match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_owned(),
            None => {
                let server = require_field(config, "server")?;
                let base = format!("https://{server}");
                validate_platform_url(&base)?;
                base
            }
        };
        Ok(format!("{base}/WebUntis/jsonrpc.do"))
    }

    async fn rpc<T, P>(
        client: &Client,
        endpoint: &str,
        school: &str,
        method: &str,
        params: P,
    ) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        P: Serialize + Send,
    {
        let request = RpcRequest {
            id: "schulsync",
            method,
            params,
            jsonrpc: "2.0",
        };
        let response = client
            .post(endpoint)
            .query(&[("school", school)])
            .json(&request)
            .send()
            .await
            .map_err(FetchError::from)?;
        let parsed: RpcResponse<T> = http::decode_json(response).await?;
        if let Some(error) = parsed.error {
            if error.code == RPC_METHOD_NOT_FOUND {
                return Err(FetchError::NotSupported);
            }
            return Err(FetchError::Network(format!(
                "WebUntis RPC error {}: {}",
                error.code, error.message
            )));
        }
        parsed
            .result
            .ok_or_else(|| FetchError::Shape("RPC response carried neither result nor error".into()))
    }

    async fn login(
        &self,
        client: &Client,
        endpoint: &str,
        school: &str,
        credentials: &PlatformCredentials,
    ) -> AppResult<AuthenticateResult> {
        let params = json!({
            "user": credentials.username,
            "password": credentials.password,
            "client": "schulsync",
        });
        let attempt = Self::rpc::<AuthenticateResult, _>(
            client, endpoint, school, "authenticate", params,
        );
        match tokio::time::timeout(self.login_timeout, attempt).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(FetchError::Network(message))) if message.contains("RPC error") => {
                Err(AppError::auth_failed(message))
            }
            Ok(Err(error)) => {
                Err(AppError::upstream(format!("WebUntis login failed: {error}")))
            }
            Err(_) => Err(AppError::upstream("WebUntis login timed out")),
        }
    }

    async fn fetch_timegrid(
        client: &Client,
        endpoint: &str,
        school: &str,
    ) -> Result<Vec<TimeUnit>, FetchError> {
        let days: Vec<TimegridDay> =
            Self::rpc(client, endpoint, school, "getTimegridUnits", json!([])).await?;
        Ok(days.into_iter().next().map(|d| d.time_units).unwrap_or_default())
    }

    /// Resolve a start time to its 1-based period number via the timegrid
    fn period_for(start_time: u32, grid: &[TimeUnit]) -> u32 {
        if let Some(index) = grid.iter().position(|unit| unit.start_time == start_time) {
            return u32::try_from(index).unwrap_or(0) + 1;
        }
        let earlier = grid.iter().filter(|unit| unit.start_time < start_time).count();
        u32::try_from(earlier).unwrap_or(0).max(1)
    }

    async fn fetch_lessons(
        client: &Client,
        endpoint: &str,
        school: &str,
        element_id: i64,
        element_type: u8,
        start: u32,
        end: u32,
    ) -> Result<Vec<LessonData>, FetchError> {
        let grid = Self::fetch_timegrid(client, endpoint, school).await?;
        let params = json!({
            "id": element_id,
            "type": element_type,
            "startDate": start,
            "endDate": end,
        });
        let entries: Vec<TimetableEntry> =
            Self::rpc(client, endpoint, school, "getTimetable", params).await?;

        let lessons = entries
            .into_iter()
            .map(|entry| {
                let date = untis_date(entry.date);
                LessonData {
                    subject: first_name(&entry.su).unwrap_or_else(|| DEFAULT_SUBJECT.to_owned()),
                    teacher: first_name(&entry.te),
                    room: first_name(&entry.ro),
                    day_of_week: crate::mapping::school_day_of_week(&date),
                    lesson_number: Self::period_for(entry.start_time, &grid),
                    start_time: untis_time(entry.start_time),
                    end_time: untis_time(entry.end_time),
                }
            })
            .collect();
        Ok(lessons)
    }

    async fn fetch_substitutions(
        client: &Client,
        endpoint: &str,
        school: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<SubstitutionData>, FetchError> {
        let grid = Self::fetch_timegrid(client, endpoint, school).await?;
        let params = json!({
            "startDate": start,
            "endDate": end,
            "departmentId": 0,
        });
        let entries: Vec<SubstitutionEntry> =
            Self::rpc(client, endpoint, school, "getSubstitutions", params).await?;

        let substitutions = entries
            .into_iter()
            .map(|entry| {
                let kind = match entry.type_code.as_deref() {
                    Some("cancel") => SubstitutionType::Cancelled,
                    Some("subst") => SubstitutionType::Substituted,
                    Some("rmchg") => SubstitutionType::RoomChange,
                    other => classify_substitution(&format!(
                        "{} {}",
                        other.unwrap_or_default(),
                        entry.txt.as_deref().unwrap_or_default()
                    )),
                };
                SubstitutionData {
                    date: untis_date(entry.date),
                    lesson_number: Self::period_for(entry.start_time, &grid),
                    original_subject: original_name(&entry.su),
                    new_subject: first_name(&entry.su),
                    original_teacher: original_name(&entry.te),
                    new_teacher: first_name(&entry.te),
                    new_room: first_name(&entry.ro),
                    kind,
                    info_text: entry.txt.filter(|t| !t.is_empty()),
                }
            })
            .collect();
        Ok(substitutions)
    }

    async fn fetch_messages(
        client: &Client,
        endpoint: &str,
        school: &str,
        today: u32,
    ) -> Result<Vec<MessageData>, FetchError> {
        let entries: Vec<MessageOfDay> = Self::rpc(
            client,
            endpoint,
            school,
            "getMessagesOfDay",
            json!({ "date": today }),
        )
        .await?;
        let messages = entries
            .into_iter()
            .map(|entry| MessageData {
                id: entry.id.to_string(),
                title: entry.subject.unwrap_or_else(|| "Mitteilung".to_owned()),
                body: entry.text.unwrap_or_default(),
                sender: None,
                date: untis_date(today),
                read: false,
            })
            .collect();
        Ok(messages)
    }

    async fn fetch_homework(
        client: &Client,
        endpoint: &str,
        school: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<HomeworkData>, FetchError> {
        let params = json!({ "startDate": start, "endDate": end });
        let entries: Vec<HomeworkEntry> =
            Self::rpc(client, endpoint, school, "getHomeWorks", params).await?;
        let homework = entries
            .into_iter()
            .map(|entry| HomeworkData {
                id: entry.id.to_string(),
                subject: entry.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_owned()),
                description: entry.text.unwrap_or_default(),
                due_date: untis_date(entry.due_date),
                completed: entry.completed,
            })
            .collect();
        Ok(homework)
    }
}

/// Current-name of the first element ("name"), long name preferred for subjects
fn first_name(elements: &[NamedElement]) -> Option<String> {
    elements.first().and_then(|e| {
        e.long_name
            .clone()
            .or_else(|| e.name.clone())
            .filter(|n| !n.is_empty())
    })
}

/// Pre-substitution name of the first element ("orgname")
fn original_name(elements: &[NamedElement]) -> Option<String> {
    elements
        .first()
        .and_then(|e| e.org_name.clone().filter(|n| !n.is_empty()))
}

#[async_trait]
impl PlatformAdapter for WebUntisAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::WebUntis
    }

    async fn sync(
        &self,
        config: &PlatformConfig,
        credentials: PlatformCredentials,
    ) -> AppResult<SyncResult> {
        let school = require_field(config, "school")?.to_owned();
        let endpoint = self.endpoint(config)?;
        let client = http::session_client(self.request_timeout)?;

        let session = self
            .login(&client, &endpoint, &school, &credentials)
            .await?;
        info!("WebUntis session opened for school {school}");

        // Student id from config wins; otherwise the session's own person,
        // otherwise the class timetable.
        let (element_id, element_type) = match config.get("student_id").and_then(|s| s.parse().ok())
        {
            Some(id) => (id, 5),
            None => match (session.person_id, session.klasse_id) {
                (Some(id), _) => (id, 5),
                (None, Some(id)) => (id, 1),
                (None, None) => {
                    // Session is open; close it before aborting.
                    Self::logout(&client, &endpoint, &school).await;
                    return Err(AppError::config_invalid(
                        "WebUntis session has no student or class to query; set `student_id`",
                    ));
                }
            },
        };

        let monday = {
            let today = Utc::now().date_naive();
            today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
        };
        let to_untis = |d: chrono::NaiveDate| -> u32 {
            d.format("%Y%m%d").to_string().parse().unwrap_or(0)
        };
        let (start, end) = (to_untis(monday), to_untis(monday + Duration::days(4)));
        let today = to_untis(Utc::now().date_naive());

        let (lessons, substitutions, messages, homework) = tokio::join!(
            fetch_with_diagnostic(
                SyncCategory::Lessons,
                Self::fetch_lessons(&client, &endpoint, &school, element_id, element_type, start, end),
            ),
            fetch_with_diagnostic(
                SyncCategory::Substitutions,
                Self::fetch_substitutions(&client, &endpoint, &school, start, end),
            ),
            fetch_with_diagnostic(
                SyncCategory::Messages,
                Self::fetch_messages(&client, &endpoint, &school, today),
            ),
            fetch_with_diagnostic(
                SyncCategory::Homework,
                Self::fetch_homework(&client, &endpoint, &school, start, end),
            ),
        );

        Self::logout(&client, &endpoint, &school).await;

        Ok(SyncResult {
            lessons: lessons.0,
            substitutions: substitutions.0,
            messages: messages.0,
            homework: homework.0,
            diagnostics: vec![lessons.1, substitutions.1, messages.1, homework.1],
        })
    }
}

impl WebUntisAdapter {
    /// Best-effort session invalidation
    async fn logout(client: &Client, endpoint: &str, school: &str) {
        match Self::rpc::<serde_json::Value, _>(client, endpoint, school, "logout", json!([])).await
        {
            Ok(_) => debug!("WebUntis session closed"),
            Err(error) => warn!("WebUntis logout failed (ignored): {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_resolution_against_grid() {
        let grid = vec![
            TimeUnit { start_time: 755 },
            TimeUnit { start_time: 845 },
            TimeUnit { start_time: 950 },
        ];
        assert_eq!(WebUntisAdapter::period_for(755, &grid), 1);
        assert_eq!(WebUntisAdapter::period_for(950, &grid), 3);
        // Unknown start time falls back to position ordering
        assert_eq!(WebUntisAdapter::period_for(900, &grid), 2);
        assert_eq!(WebUntisAdapter::period_for(700, &grid), 1);
    }

    #[test]
    fn test_missing_config_fails_before_network() {
        let adapter = WebUntisAdapter::new(&EngineConfig::default());
        let config = PlatformConfig::new();
        assert!(adapter.endpoint(&config).is_err());
    }

    #[test]
    fn test_private_server_is_blocked() {
        let adapter = WebUntisAdapter::new(&EngineConfig::default());
        let mut config = PlatformConfig::new();
        config.insert("server".into(), "192.168.1.10".into());
        let error = adapter.endpoint(&config).unwrap_err();
        assert!(error.to_string().contains("Private"));
    }
}

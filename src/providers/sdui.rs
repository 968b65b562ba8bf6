// ABOUTME: Sdui adapter against the fixed vendor API with bearer-token auth
// ABOUTME: Splits the timetable feed into regular lessons and substitution entries
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Sdui Adapter
//!
//! Sdui is a hosted service behind `https://api.sdui.app`, so no user config
//! reaches the SSRF guard; the school is selected by its `school` slug during
//! login. All responses wrap their payload in a `data` envelope. The
//! timetable feed carries both regular and changed lessons; entries with a
//! change kind (`CANCLED`, `SUBSTITUTION`, `BOOKABLE_CHANGE`, the vendor's
//! own spelling) become substitutions, the rest become lessons. Sdui has no
//! homework module, so that category reports `not_supported`.

use super::core::{require_field, PlatformAdapter, PlatformConfig, PlatformId};
use super::http;
use crate::config::EngineConfig;
use crate::diagnostics::{fetch_with_diagnostic, FetchError};
use crate::errors::{AppError, AppResult};
use crate::mapping::{
    classify_substitution, date_from_timestamp, school_day_of_week, DEFAULT_END_TIME,
    DEFAULT_START_TIME, DEFAULT_SUBJECT,
};
use crate::models::{
    HomeworkData, LessonData, MessageData, PlatformCredentials, SubstitutionData, SubstitutionType,
    SyncCategory, SyncResult,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

/// Vendor API host; Sdui is not self-hosted
const DEFAULT_BASE_URL: &str = "https://api.sdui.app";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    access_token: String,
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct TimetableData {
    #[serde(default)]
    lessons: Vec<TimetableLesson>,
}

#[derive(Debug, Deserialize)]
struct TimetableLesson {
    /// Change marker, absent or "REGULAR" for plan lessons
    kind: Option<String>,
    /// Lesson slot within the day, 1-based
    #[serde(default)]
    number: u32,
    /// Start of the slot as a unix timestamp
    begins_at: Option<i64>,
    ends_at: Option<i64>,
    subject: Option<NamedRef>,
    #[serde(default)]
    teachers: Vec<NamedRef>,
    room: Option<NamedRef>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: Option<String>,
    shortcut: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    id: i64,
    title: String,
    #[serde(default)]
    content: String,
    author: Option<NamedRef>,
    published_at: i64,
    #[serde(default)]
    is_read: bool,
}

impl NamedRef {
    fn label(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.shortcut.clone())
            .filter(|s| !s.is_empty())
    }
}

fn is_change(kind: Option<&str>) -> bool {
    matches!(
        kind,
        // "CANCLED" is the vendor's spelling, kept verbatim
        Some("CANCLED" | "CANCELLED" | "SUBSTITUTION" | "BOOKABLE_CHANGE" | "EVENT_CHANGE")
    )
}

fn change_kind(kind: &str, comment: Option<&str>) -> SubstitutionType {
    match kind {
        "CANCLED" | "CANCELLED" => SubstitutionType::Cancelled,
        "SUBSTITUTION" => SubstitutionType::Substituted,
        _ => classify_substitution(comment.unwrap_or(kind)),
    }
}

fn time_of_day(secs: Option<i64>, fallback: &str) -> String {
    secs.and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map_or_else(|| fallback.to_owned(), |t| t.format("%H:%M").to_string())
}

/// Sdui platform adapter
pub struct SduiAdapter {
    request_timeout: StdDuration,
    login_timeout: StdDuration,
    base_url: String,
}

impl SduiAdapter {
    /// Adapter against the vendor API with engine timeouts
    #[must_use]
    pub fn new(engine: &EngineConfig) -> Self {
        Self::with_base_url(engine, DEFAULT_BASE_URL)
    }

    /// Adapter pinned to an operator-injected base URL (integration tests)
    #[must_use]
    pub fn with_base_url(engine: &EngineConfig, base_url: impl Into<String>) -> Self {
        Self {
            request_timeout: engine.request_timeout,
            login_timeout: engine.login_timeout,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    async fn login(
        &self,
        client: &Client,
        school: &str,
        credentials: &PlatformCredentials,
    ) -> AppResult<LoginData> {
        let body = serde_json::json!({
            "identifier": credentials.username,
            "password": credentials.password,
            "slink": school,
        });
        let attempt = client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&body)
            .send();
        let response = match tokio::time::timeout(self.login_timeout, attempt).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                return Err(AppError::upstream(format!("Sdui login failed: {error}")))
            }
            Err(_) => return Err(AppError::upstream("Sdui login timed out")),
        };

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(AppError::auth_failed("Sdui rejected the credentials"));
        }
        let envelope: Envelope<LoginData> = http::decode_json(response)
            .await
            .map_err(|error| AppError::upstream(format!("Sdui login failed: {error}")))?;
        Ok(envelope.data)
    }

    async fn fetch_timetable(
        client: &Client,
        base: &str,
        token: &str,
        user_id: i64,
    ) -> Result<Vec<TimetableLesson>, FetchError> {
        let response = client
            .get(format!("{base}/v1/users/{user_id}/timetable"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(FetchError::from)?;
        let envelope: Envelope<TimetableData> = http::decode_json(response).await?;
        Ok(envelope.data.lessons)
    }

    async fn fetch_lessons(
        client: &Client,
        base: &str,
        token: &str,
        user_id: i64,
    ) -> Result<Vec<LessonData>, FetchError> {
        let entries = Self::fetch_timetable(client, base, token, user_id).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| !is_change(entry.kind.as_deref()))
            .map(|entry| LessonData {
                subject: entry
                    .subject
                    .as_ref()
                    .and_then(NamedRef::label)
                    .unwrap_or_else(|| DEFAULT_SUBJECT.to_owned()),
                teacher: entry.teachers.first().and_then(NamedRef::label),
                room: entry.room.as_ref().and_then(NamedRef::label),
                day_of_week: school_day_of_week(&date_from_timestamp(
                    entry.begins_at.unwrap_or_default(),
                )),
                lesson_number: entry.number.max(1),
                start_time: time_of_day(entry.begins_at, DEFAULT_START_TIME),
                end_time: time_of_day(entry.ends_at, DEFAULT_END_TIME),
            })
            .collect())
    }

    async fn fetch_substitutions(
        client: &Client,
        base: &str,
        token: &str,
        user_id: i64,
    ) -> Result<Vec<SubstitutionData>, FetchError> {
        let entries = Self::fetch_timetable(client, base, token, user_id).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| is_change(entry.kind.as_deref()))
            .map(|entry| {
                let kind = entry.kind.as_deref().unwrap_or_default();
                SubstitutionData {
                    date: date_from_timestamp(entry.begins_at.unwrap_or_default()),
                    lesson_number: entry.number.max(1),
                    original_subject: entry.subject.as_ref().and_then(NamedRef::label),
                    new_subject: None,
                    original_teacher: None,
                    new_teacher: entry.teachers.first().and_then(NamedRef::label),
                    new_room: entry.room.as_ref().and_then(NamedRef::label),
                    kind: change_kind(kind, entry.comment.as_deref()),
                    info_text: entry.comment.filter(|c| !c.is_empty()),
                }
            })
            .collect())
    }

    async fn fetch_messages(
        client: &Client,
        base: &str,
        token: &str,
    ) -> Result<Vec<MessageData>, FetchError> {
        let response = client
            .get(format!("{base}/v1/news"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(FetchError::from)?;
        let envelope: Envelope<Vec<NewsItem>> = http::decode_json(response).await?;
        Ok(envelope
            .data
            .into_iter()
            .map(|item| MessageData {
                id: item.id.to_string(),
                title: item.title,
                body: item.content,
                sender: item.author.as_ref().and_then(NamedRef::label),
                date: date_from_timestamp(item.published_at),
                read: item.is_read,
            })
            .collect())
    }

    async fn logout(client: &Client, base: &str, token: &str) {
        let result = client
            .post(format!("{base}/v1/auth/logout"))
            .bearer_auth(token)
            .send()
            .await;
        match result {
            Ok(_) => debug!("Sdui token invalidated"),
            Err(error) => warn!("Sdui logout failed (ignored): {error}"),
        }
    }
}

#[async_trait]
impl PlatformAdapter for SduiAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Sdui
    }

    async fn sync(
        &self,
        config: &PlatformConfig,
        credentials: PlatformCredentials,
    ) -> AppResult<SyncResult> {
        let school = require_field(config, "school")?;
        let client = http::client(self.request_timeout)?;

        let session = self.login(&client, school, &credentials).await?;
        info!("Sdui token obtained");

        let base = self.base_url.as_str();
        let (lessons, substitutions, messages, homework) = tokio::join!(
            fetch_with_diagnostic(
                SyncCategory::Lessons,
                Self::fetch_lessons(&client, base, &session.access_token, session.user_id),
            ),
            fetch_with_diagnostic(
                SyncCategory::Substitutions,
                Self::fetch_substitutions(&client, base, &session.access_token, session.user_id),
            ),
            fetch_with_diagnostic(
                SyncCategory::Messages,
                Self::fetch_messages(&client, base, &session.access_token),
            ),
            fetch_with_diagnostic(SyncCategory::Homework, async {
                Err::<Vec<HomeworkData>, _>(FetchError::NotSupported)
            }),
        );

        Self::logout(&client, base, &session.access_token).await;

        Ok(SyncResult {
            lessons: lessons.0,
            substitutions: substitutions.0,
            messages: messages.0,
            homework: homework.0,
            diagnostics: vec![lessons.1, substitutions.1, messages.1, homework.1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_detection() {
        assert!(is_change(Some("CANCLED")));
        assert!(is_change(Some("SUBSTITUTION")));
        assert!(!is_change(Some("REGULAR")));
        assert!(!is_change(None));
    }

    #[test]
    fn test_change_kind_mapping() {
        assert_eq!(change_kind("CANCLED", None), SubstitutionType::Cancelled);
        assert_eq!(
            change_kind("SUBSTITUTION", None),
            SubstitutionType::Substituted
        );
        assert_eq!(
            change_kind("EVENT_CHANGE", Some("Raumänderung")),
            SubstitutionType::RoomChange
        );
        assert_eq!(change_kind("EVENT_CHANGE", None), SubstitutionType::Other);
    }

    #[test]
    fn test_time_of_day() {
        // 2026-03-02T08:00:00Z
        assert_eq!(time_of_day(Some(1_772_438_400), "08:00"), "08:00");
        assert_eq!(time_of_day(None, DEFAULT_START_TIME), DEFAULT_START_TIME);
    }

    #[tokio::test]
    async fn test_sync_requires_school() {
        let adapter = SduiAdapter::new(&EngineConfig::default());
        let config = PlatformConfig::new();
        let credentials = PlatformCredentials::new("parent", "secret");
        // Fails on the missing `school` key, before any network activity.
        let result = adapter.sync(&config, credentials).await;
        assert!(result.is_err());
    }
}

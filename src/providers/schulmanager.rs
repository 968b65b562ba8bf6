// ABOUTME: Schulmanager Online adapter using the bundled module-call API
// ABOUTME: Derives lessons and substitutions from actual-lesson data, homework from the classbook
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Schulmanager Online Adapter
//!
//! Schulmanager runs on a fixed vendor host. `/api/login` answers with a JWT
//! and the account's associated students; data endpoints are batched behind
//! `/api/calls`, where each request names a module and endpoint. Lessons and
//! substitutions both derive from `schedules/get-actual-lessons`: entries
//! flagged cancelled or substituted feed the substitution category, the rest
//! form the timetable. There is no parent-facing messages API, so that
//! category reports `not_supported`.

use super::core::{PlatformAdapter, PlatformConfig, PlatformId};
use super::http;
use crate::config::EngineConfig;
use crate::diagnostics::{fetch_with_diagnostic, FetchError};
use crate::errors::{AppError, AppResult};
use crate::mapping::{self, DEFAULT_END_TIME, DEFAULT_START_TIME, DEFAULT_SUBJECT};
use crate::models::{
    HomeworkData, LessonData, MessageData, PlatformCredentials, SubstitutionData,
    SubstitutionType, SyncCategory, SyncResult,
};
use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

/// Fixed vendor host; Schulmanager is not self-hosted
const DEFAULT_BASE_URL: &str = "https://login.schulmanager-online.de";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    jwt: String,
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    #[serde(rename = "associatedStudent")]
    associated_student: Option<StudentRef>,
    #[serde(rename = "associatedParents", default)]
    associated_parents: Vec<ParentRef>,
}

#[derive(Debug, Deserialize)]
struct ParentRef {
    #[serde(default)]
    students: Vec<StudentRef>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct StudentRef {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallsResponse<T> {
    results: Vec<CallResult<T>>,
}

#[derive(Debug, Deserialize)]
struct CallResult<T> {
    status: u16,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ActualLesson {
    /// Lesson day as "YYYY-MM-DD"
    date: String,
    #[serde(rename = "classHour")]
    class_hour: Option<ClassHour>,
    #[serde(rename = "actualLesson")]
    actual_lesson: Option<LessonDetails>,
    #[serde(rename = "originalLessons", default)]
    original_lessons: Vec<LessonDetails>,
    #[serde(rename = "isCancelled", default)]
    is_cancelled: bool,
    #[serde(rename = "isSubstitution", default)]
    is_substitution: bool,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClassHour {
    number: u32,
    from: Option<String>,
    until: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LessonDetails {
    subject: Option<SubjectRef>,
    #[serde(default)]
    teachers: Vec<TeacherRef>,
    room: Option<RoomRef>,
}

#[derive(Debug, Deserialize)]
struct SubjectRef {
    name: Option<String>,
    abbreviation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeacherRef {
    abbreviation: Option<String>,
    lastname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoomRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HomeworkItem {
    id: i64,
    subject: Option<String>,
    homework: String,
    /// Due date as "YYYY-MM-DD"
    date: String,
    #[serde(default)]
    completed: bool,
}

/// Schulmanager Online platform adapter
pub struct SchulmanagerAdapter {
    request_timeout: StdDuration,
    login_timeout: StdDuration,
    base_url: String,
}

impl SchulmanagerAdapter {
    /// Adapter against the vendor host
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
        credentials: &PlatformCredentials,
    ) -> AppResult<LoginResponse> {
        let body = json!({
            "emailOrUsername": credentials.username,
            "password": credentials.password,
        });
        let attempt = client
            .post(format!("{}/api/login", self.base_url))
            .json(&body)
            .send();
        let response = match tokio::time::timeout(self.login_timeout, attempt).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                return Err(AppError::upstream(format!(
                    "Schulmanager login failed: {error}"
                )))
            }
            Err(_) => return Err(AppError::upstream("Schulmanager login timed out")),
        };

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::auth_failed(
                "Schulmanager rejected the credentials",
            ));
        }
        http::decode_json(response).await.map_err(|error| match error {
            FetchError::Http { status } if status == 401 || status == 403 => {
                AppError::auth_failed("Schulmanager rejected the credentials")
            }
            other => AppError::upstream(format!("Schulmanager login failed: {other}")),
        })
    }

    /// Issue one bundled call and unwrap its single result
    async fn call<T: DeserializeOwned>(
        client: &Client,
        base_url: &str,
        jwt: &str,
        module: &str,
        endpoint: &str,
        parameters: serde_json::Value,
    ) -> Result<T, FetchError> {
        let body = json!({
            "bundleVersion": "schulsync",
            "requests": [{
                "moduleName": module,
                "endpointName": endpoint,
                "parameters": parameters,
            }],
        });
        let response = client
            .post(format!("{base_url}/api/calls"))
            .bearer_auth(jwt)
            .json(&body)
            .send()
            .await
            .map_err(FetchError::from)?;
        let parsed: CallsResponse<T> = http::decode_json(response).await?;
        let result = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Shape("bundled call returned no results".into()))?;
        if !(200..300).contains(&result.status) {
            return Err(FetchError::Http {
                status: result.status,
            });
        }
        result
            .data
            .ok_or_else(|| FetchError::Shape("bundled call result carried no data".into()))
    }

    async fn fetch_actual_lessons(
        client: &Client,
        base_url: &str,
        jwt: &str,
        student_id: i64,
    ) -> Result<Vec<ActualLesson>, FetchError> {
        let today = Utc::now().date_naive();
        let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let friday = monday + Duration::days(4);
        Self::call(
            client,
            base_url,
            jwt,
            "schedules",
            "get-actual-lessons",
            json!({
                "student": { "id": student_id },
                "start": monday.format("%Y-%m-%d").to_string(),
                "end": friday.format("%Y-%m-%d").to_string(),
            }),
        )
        .await
    }

    async fn fetch_lessons(
        client: &Client,
        base_url: &str,
        jwt: &str,
        student_id: i64,
    ) -> Result<Vec<LessonData>, FetchError> {
        let entries = Self::fetch_actual_lessons(client, base_url, jwt, student_id).await?;
        Ok(entries
            .iter()
            .filter(|entry| !entry.is_cancelled)
            .map(|entry| {
                let details = entry.actual_lesson.as_ref();
                LessonData {
                    subject: details
                        .and_then(subject_name)
                        .unwrap_or_else(|| DEFAULT_SUBJECT.to_owned()),
                    teacher: details.and_then(teacher_name),
                    room: details.and_then(room_name),
                    day_of_week: mapping::school_day_of_week(&entry.date),
                    lesson_number: entry.class_hour.as_ref().map_or(1, |h| h.number),
                    start_time: entry
                        .class_hour
                        .as_ref()
                        .and_then(|h| h.from.as_deref().map(trim_seconds))
                        .unwrap_or_else(|| DEFAULT_START_TIME.to_owned()),
                    end_time: entry
                        .class_hour
                        .as_ref()
                        .and_then(|h| h.until.as_deref().map(trim_seconds))
                        .unwrap_or_else(|| DEFAULT_END_TIME.to_owned()),
                }
            })
            .collect())
    }

    async fn fetch_substitutions(
        client: &Client,
        base_url: &str,
        jwt: &str,
        student_id: i64,
    ) -> Result<Vec<SubstitutionData>, FetchError> {
        let entries = Self::fetch_actual_lessons(client, base_url, jwt, student_id).await?;
        Ok(entries
            .iter()
            .filter(|entry| entry.is_cancelled || entry.is_substitution)
            .map(|entry| {
                let original = entry.original_lessons.first();
                let actual = entry.actual_lesson.as_ref();
                let kind = if entry.is_cancelled {
                    SubstitutionType::Cancelled
                } else {
                    SubstitutionType::Substituted
                };
                SubstitutionData {
                    date: entry.date.clone(),
                    lesson_number: entry.class_hour.as_ref().map_or(1, |h| h.number),
                    original_subject: original.and_then(subject_name),
                    new_subject: actual.and_then(subject_name),
                    original_teacher: original.and_then(teacher_name),
                    new_teacher: actual.and_then(teacher_name),
                    new_room: actual.and_then(room_name),
                    kind,
                    info_text: entry.comment.clone().filter(|c| !c.is_empty()),
                }
            })
            .collect())
    }

    async fn fetch_homework(
        client: &Client,
        base_url: &str,
        jwt: &str,
        student_id: i64,
    ) -> Result<Vec<HomeworkData>, FetchError> {
        let items: Vec<HomeworkItem> = Self::call(
            client,
            base_url,
            jwt,
            "classbook",
            "get-homework",
            json!({ "student": { "id": student_id } }),
        )
        .await?;
        Ok(items
            .into_iter()
            .map(|item| HomeworkData {
                id: item.id.to_string(),
                subject: item.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_owned()),
                description: item.homework,
                due_date: item.date,
                completed: item.completed,
            })
            .collect())
    }

    async fn logout(client: &Client, base_url: &str, jwt: &str) {
        match client
            .post(format!("{base_url}/api/logout"))
            .bearer_auth(jwt)
            .send()
            .await
        {
            Ok(_) => debug!("Schulmanager session closed"),
            Err(error) => warn!("Schulmanager logout failed (ignored): {error}"),
        }
    }

    /// Pick the student this sync is for: explicit config wins, then the
    /// account's own student, then the first parent-associated student.
    fn resolve_student(config: &PlatformConfig, user: &LoginUser) -> AppResult<i64> {
        if let Some(raw) = config.get("student_id") {
            return raw
                .parse()
                .map_err(|_| AppError::config_invalid("student_id must be numeric"));
        }
        if let Some(student) = user.associated_student {
            return Ok(student.id);
        }
        user.associated_parents
            .iter()
            .flat_map(|parent| parent.students.iter())
            .map(|student| student.id)
            .next()
            .ok_or_else(|| {
                AppError::config_invalid(
                    "Schulmanager account has no associated student; set `student_id`",
                )
            })
    }
}

/// "HH:MM:SS" to "HH:MM"; already-short values pass through
fn trim_seconds(time: &str) -> String {
    time.get(0..5).unwrap_or(time).to_owned()
}

fn subject_name(details: &LessonDetails) -> Option<String> {
    details.subject.as_ref().and_then(|subject| {
        subject
            .name
            .clone()
            .or_else(|| subject.abbreviation.clone())
            .filter(|n| !n.is_empty())
    })
}

fn teacher_name(details: &LessonDetails) -> Option<String> {
    details.teachers.first().and_then(|teacher| {
        teacher
            .lastname
            .clone()
            .or_else(|| teacher.abbreviation.clone())
            .filter(|n| !n.is_empty())
    })
}

fn room_name(details: &LessonDetails) -> Option<String> {
    details
        .room
        .as_ref()
        .and_then(|room| room.name.clone().filter(|n| !n.is_empty()))
}

#[async_trait]
impl PlatformAdapter for SchulmanagerAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Schulmanager
    }

    async fn sync(
        &self,
        config: &PlatformConfig,
        credentials: PlatformCredentials,
    ) -> AppResult<SyncResult> {
        let client = http::client(self.request_timeout)?;

        let login = self.login(&client, &credentials).await?;
        let student_id = match Self::resolve_student(config, &login.user) {
            Ok(id) => id,
            Err(error) => {
                Self::logout(&client, &self.base_url, &login.jwt).await;
                return Err(error);
            }
        };
        info!("Schulmanager session opened for student {student_id}");

        let jwt = login.jwt.as_str();
        let base = self.base_url.as_str();
        let (lessons, substitutions, messages, homework) = tokio::join!(
            fetch_with_diagnostic(
                SyncCategory::Lessons,
                Self::fetch_lessons(&client, base, jwt, student_id),
            ),
            fetch_with_diagnostic(
                SyncCategory::Substitutions,
                Self::fetch_substitutions(&client, base, jwt, student_id),
            ),
            fetch_with_diagnostic(SyncCategory::Messages, async {
                Err::<Vec<MessageData>, _>(FetchError::NotSupported)
            }),
            fetch_with_diagnostic(
                SyncCategory::Homework,
                Self::fetch_homework(&client, base, jwt, student_id),
            ),
        );

        Self::logout(&client, base, jwt).await;

        Ok(SyncResult {
            lessons: lessons.0,
            substitutions: substitutions.0,
            messages: messages.0,
            homework: homework.0,
            diagnostics: vec![lessons.1, substitutions.1, messages.1, homework.1],
        })
    }
}

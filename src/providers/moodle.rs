// ABOUTME: Moodle adapter using the mobile-service token and REST web service API
// ABOUTME: Maps assignments to homework and user messages; Moodle has no timetable
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Moodle Adapter
//!
//! Moodle instances are self-hosted, so the base URL is user config and runs
//! through the SSRF guard. Auth is the mobile-app token flow
//! (`/login/token.php`); data calls go to `/webservice/rest/server.php` with
//! the token as a query parameter. Moodle web-service errors come back as
//! HTTP 200 with an `exception` payload, which this adapter surfaces as
//! fetch failures. Timetables and substitution plans do not exist in Moodle,
//! so both categories report `not_supported`.
//!
//! Mobile tokens have no revocation endpoint; "logout" is dropping the token
//! with the call frame.

use super::core::{require_field, PlatformAdapter, PlatformConfig, PlatformId};
use super::http;
use crate::config::EngineConfig;
use crate::diagnostics::{fetch_with_diagnostic, FetchError};
use crate::errors::{AppError, AppResult};
use crate::mapping::date_from_timestamp;
use crate::models::{
    HomeworkData, LessonData, MessageData, PlatformCredentials, SubstitutionData, SyncCategory,
    SyncResult,
};
use crate::ssrf::validate_platform_url;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

/// Web service the mobile token is scoped to
const MOODLE_SERVICE: &str = "moodle_mobile_app";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsError {
    exception: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SiteInfo {
    userid: i64,
}

#[derive(Debug, Deserialize)]
struct AssignmentsResponse {
    #[serde(default)]
    courses: Vec<AssignmentCourse>,
}

#[derive(Debug, Deserialize)]
struct AssignmentCourse {
    fullname: Option<String>,
    #[serde(default)]
    assignments: Vec<Assignment>,
}

#[derive(Debug, Deserialize)]
struct Assignment {
    id: i64,
    name: String,
    #[serde(default)]
    intro: String,
    /// Unix timestamp; 0 means no due date
    #[serde(default)]
    duedate: i64,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: i64,
    subject: Option<String>,
    smallmessage: Option<String>,
    fullmessage: Option<String>,
    userfromfullname: Option<String>,
    timecreated: i64,
    #[serde(default)]
    read: bool,
}

/// Moodle platform adapter
pub struct MoodleAdapter {
    request_timeout: StdDuration,
    login_timeout: StdDuration,
    base_url: Option<String>,
}

impl MoodleAdapter {
    /// Adapter with engine timeouts
    #[must_use]
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            request_timeout: engine.request_timeout,
            login_timeout: engine.login_timeout,
            base_url: None,
        }
    }

    /// Adapter pinned to an operator-injected base URL (integration tests)
    #[must_use]
    pub fn with_base_url(engine: &EngineConfig, base_url: impl Into<String>) -> Self {
        Self {
            request_timeout: engine.request_timeout,
            login_timeout: engine.login_timeout,
            base_url: Some(base_url.into()),
        }
    }

    fn base(&self, config: &PlatformConfig) -> AppResult<String> {
        match &self.base_url {
            Some(base) => Ok(base.trim_end_matches('/').to_owned()),
            None => {
                let url = require_field(config, "url")?;
                validate_platform_url(url)?;
                Ok(url.trim_end_matches('/').to_owned())
            }
        }
    }

    async fn login(
        &self,
        client: &Client,
        base: &str,
        credentials: &PlatformCredentials,
    ) -> AppResult<String> {
        let attempt = client
            .get(format!("{base}/login/token.php"))
            .query(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                ("service", MOODLE_SERVICE),
            ])
            .send();
        let response = match tokio::time::timeout(self.login_timeout, attempt).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                return Err(AppError::upstream(format!("Moodle login failed: {error}")))
            }
            Err(_) => return Err(AppError::upstream("Moodle login timed out")),
        };

        let parsed: TokenResponse = http::decode_json(response)
            .await
            .map_err(|error| AppError::upstream(format!("Moodle login failed: {error}")))?;
        match (parsed.token, parsed.error) {
            (Some(token), _) => Ok(token),
            (None, Some(error)) => Err(AppError::auth_failed(format!(
                "Moodle rejected the credentials: {error}"
            ))),
            (None, None) => Err(AppError::upstream(
                "Moodle token response carried neither token nor error",
            )),
        }
    }

    /// Call one web-service function; Moodle reports errors inside 200 bodies
    async fn ws_call<T: DeserializeOwned>(
        client: &Client,
        base: &str,
        token: &str,
        function: &str,
        extra: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("wstoken", token.to_owned()),
            ("wsfunction", function.to_owned()),
            ("moodlewsrestformat", "json".to_owned()),
        ];
        query.extend(extra.iter().cloned());

        let response = client
            .get(format!("{base}/webservice/rest/server.php"))
            .query(&query)
            .send()
            .await
            .map_err(FetchError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if let Ok(error) = serde_json::from_slice::<WsError>(&bytes) {
            if let Some(exception) = error.exception {
                return Err(FetchError::Network(format!(
                    "Moodle {function} failed: {exception}: {}",
                    error.message.unwrap_or_default()
                )));
            }
        }
        serde_json::from_slice(&bytes).map_err(FetchError::from)
    }

    async fn fetch_homework(
        client: &Client,
        base: &str,
        token: &str,
    ) -> Result<Vec<HomeworkData>, FetchError> {
        let response: AssignmentsResponse =
            Self::ws_call(client, base, token, "mod_assign_get_assignments", &[]).await?;
        let mut homework = Vec::new();
        for course in response.courses {
            let subject = course
                .fullname
                .unwrap_or_else(|| crate::mapping::DEFAULT_SUBJECT.to_owned());
            for assignment in course.assignments {
                homework.push(HomeworkData {
                    id: assignment.id.to_string(),
                    subject: subject.clone(),
                    description: if assignment.intro.is_empty() {
                        assignment.name
                    } else {
                        assignment.intro
                    },
                    due_date: date_from_timestamp(assignment.duedate),
                    // Completion tracking needs a separate per-assignment
                    // call; treat everything as open.
                    completed: false,
                });
            }
        }
        Ok(homework)
    }

    async fn fetch_messages(
        client: &Client,
        base: &str,
        token: &str,
    ) -> Result<Vec<MessageData>, FetchError> {
        let site: SiteInfo =
            Self::ws_call(client, base, token, "core_webservice_get_site_info", &[]).await?;
        let response: MessagesResponse = Self::ws_call(
            client,
            base,
            token,
            "core_message_get_messages",
            &[
                ("useridto", site.userid.to_string()),
                ("read", "0".to_owned()),
            ],
        )
        .await?;
        Ok(response
            .messages
            .into_iter()
            .map(|message| MessageData {
                id: message.id.to_string(),
                title: message.subject.unwrap_or_else(|| "Nachricht".to_owned()),
                body: message
                    .fullmessage
                    .or(message.smallmessage)
                    .unwrap_or_default(),
                sender: message.userfromfullname,
                date: date_from_timestamp(message.timecreated),
                read: message.read,
            })
            .collect())
    }
}

#[async_trait]
impl PlatformAdapter for MoodleAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Moodle
    }

    async fn sync(
        &self,
        config: &PlatformConfig,
        credentials: PlatformCredentials,
    ) -> AppResult<SyncResult> {
        let base = self.base(config)?;
        let client = http::client(self.request_timeout)?;

        let token = self.login(&client, &base, &credentials).await?;
        info!("Moodle token obtained");

        let (lessons, substitutions, messages, homework) = tokio::join!(
            fetch_with_diagnostic(SyncCategory::Lessons, async {
                Err::<Vec<LessonData>, _>(FetchError::NotSupported)
            }),
            fetch_with_diagnostic(SyncCategory::Substitutions, async {
                Err::<Vec<SubstitutionData>, _>(FetchError::NotSupported)
            }),
            fetch_with_diagnostic(
                SyncCategory::Messages,
                Self::fetch_messages(&client, &base, &token),
            ),
            fetch_with_diagnostic(
                SyncCategory::Homework,
                Self::fetch_homework(&client, &base, &token),
            ),
        );

        // Mobile tokens cannot be revoked server-side; the token dies here.
        debug!("Moodle sync finished, dropping token");

        Ok(SyncResult {
            lessons: lessons.0,
            substitutions: substitutions.0,
            messages: messages.0,
            homework: homework.0,
            diagnostics: vec![lessons.1, substitutions.1, messages.1, homework.1],
        })
    }
}

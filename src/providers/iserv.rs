// ABOUTME: IServ adapter for self-hosted school instances with form login
// ABOUTME: Guards the user-supplied instance URL and maps news, tasks, and substitution plans
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # IServ Adapter
//!
//! IServ is self-hosted per school, so the instance URL comes from user
//! config and must pass the SSRF guard before the first request. Login is a
//! form POST that establishes a session cookie; data comes from the JSON
//! endpoints under `/iserv/api/`. IServ has no timetable API, so the lessons
//! category reports `not_supported`.

use super::core::{require_field, PlatformAdapter, PlatformConfig, PlatformId};
use super::http;
use crate::config::EngineConfig;
use crate::diagnostics::{fetch_with_diagnostic, FetchError};
use crate::errors::{AppError, AppResult};
use crate::mapping::{classify_substitution, DEFAULT_SUBJECT};
use crate::models::{
    HomeworkData, MessageData, PlatformCredentials, SubstitutionData, SyncCategory, SyncResult,
};
use crate::ssrf::validate_platform_url;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct NewsItem {
    uuid: String,
    title: String,
    #[serde(default)]
    text: String,
    author: Option<String>,
    /// Publication date as "YYYY-MM-DD"
    date: String,
    #[serde(default)]
    seen: bool,
}

#[derive(Debug, Deserialize)]
struct TaskItem {
    id: i64,
    title: String,
    #[serde(default)]
    description: String,
    subject: Option<String>,
    /// Due date as "YYYY-MM-DD"
    #[serde(rename = "endDate")]
    end_date: String,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct SubstitutionItem {
    /// Affected day as "YYYY-MM-DD"
    date: String,
    lesson: u32,
    course: Option<String>,
    subject: Option<String>,
    teacher: Option<String>,
    substitute: Option<String>,
    room: Option<String>,
    /// Vendor status text, e.g. "Entfall" or "Vertretung"
    #[serde(rename = "type")]
    type_text: Option<String>,
    comment: Option<String>,
}

/// IServ platform adapter
pub struct IServAdapter {
    request_timeout: StdDuration,
    login_timeout: StdDuration,
    base_url: Option<String>,
}

impl IServAdapter {
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
    ) -> AppResult<()> {
        let form = [
            ("_username", credentials.username.as_str()),
            ("_password", credentials.password.as_str()),
        ];
        let attempt = client.post(format!("{base}/iserv/app/login")).form(&form).send();
        let response = match tokio::time::timeout(self.login_timeout, attempt).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                return Err(AppError::upstream(format!("IServ login failed: {error}")))
            }
            Err(_) => return Err(AppError::upstream("IServ login timed out")),
        };

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AppError::auth_failed("IServ rejected the credentials"));
        }
        if !status.is_success() && !status.is_redirection() {
            return Err(AppError::upstream(format!(
                "IServ login answered with HTTP {status}"
            )));
        }
        // A failed form login bounces back to the login page.
        if response.url().path().contains("/app/login") {
            return Err(AppError::auth_failed("IServ rejected the credentials"));
        }
        Ok(())
    }

    async fn fetch_messages(client: &Client, base: &str) -> Result<Vec<MessageData>, FetchError> {
        let response = client
            .get(format!("{base}/iserv/api/news"))
            .send()
            .await
            .map_err(FetchError::from)?;
        let items: Vec<NewsItem> = http::decode_json(response).await?;
        Ok(items
            .into_iter()
            .map(|item| MessageData {
                id: item.uuid,
                title: item.title,
                body: item.text,
                sender: item.author,
                date: item.date,
                read: item.seen,
            })
            .collect())
    }

    async fn fetch_homework(client: &Client, base: &str) -> Result<Vec<HomeworkData>, FetchError> {
        let response = client
            .get(format!("{base}/iserv/api/tasks"))
            .send()
            .await
            .map_err(FetchError::from)?;
        let items: Vec<TaskItem> = http::decode_json(response).await?;
        Ok(items
            .into_iter()
            .map(|item| HomeworkData {
                id: item.id.to_string(),
                subject: item.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_owned()),
                description: if item.description.is_empty() {
                    item.title
                } else {
                    item.description
                },
                due_date: item.end_date,
                completed: item.done,
            })
            .collect())
    }

    async fn fetch_substitutions(
        client: &Client,
        base: &str,
    ) -> Result<Vec<SubstitutionData>, FetchError> {
        let response = client
            .get(format!("{base}/iserv/api/substitutions"))
            .send()
            .await
            .map_err(FetchError::from)?;
        let items: Vec<SubstitutionItem> = http::decode_json(response).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let classification_text = format!(
                    "{} {}",
                    item.type_text.as_deref().unwrap_or_default(),
                    item.comment.as_deref().unwrap_or_default()
                );
                SubstitutionData {
                    date: item.date,
                    lesson_number: item.lesson,
                    original_subject: item.subject.or(item.course),
                    new_subject: None,
                    original_teacher: item.teacher,
                    new_teacher: item.substitute,
                    new_room: item.room,
                    kind: classify_substitution(&classification_text),
                    info_text: item.comment.filter(|c| !c.is_empty()),
                }
            })
            .collect())
    }

    async fn logout(client: &Client, base: &str) {
        match client.get(format!("{base}/iserv/app/logout")).send().await {
            Ok(_) => debug!("IServ session closed"),
            Err(error) => warn!("IServ logout failed (ignored): {error}"),
        }
    }
}

#[async_trait]
impl PlatformAdapter for IServAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::IServ
    }

    async fn sync(
        &self,
        config: &PlatformConfig,
        credentials: PlatformCredentials,
    ) -> AppResult<SyncResult> {
        let base = self.base(config)?;
        let client = http::session_client(self.request_timeout)?;

        self.login(&client, &base, &credentials).await?;
        info!("IServ session opened");

        let (lessons, substitutions, messages, homework) = tokio::join!(
            fetch_with_diagnostic(SyncCategory::Lessons, async {
                Err::<Vec<crate::models::LessonData>, _>(FetchError::NotSupported)
            }),
            fetch_with_diagnostic(
                SyncCategory::Substitutions,
                Self::fetch_substitutions(&client, &base),
            ),
            fetch_with_diagnostic(SyncCategory::Messages, Self::fetch_messages(&client, &base)),
            fetch_with_diagnostic(SyncCategory::Homework, Self::fetch_homework(&client, &base)),
        );

        Self::logout(&client, &base).await;

        Ok(SyncResult {
            lessons: lessons.0,
            substitutions: substitutions.0,
            messages: messages.0,
            homework: homework.0,
            diagnostics: vec![lessons.1, substitutions.1, messages.1, homework.1],
        })
    }
}

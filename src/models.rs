// ABOUTME: Canonical data models shared by all platform adapters
// ABOUTME: Defines the schema every platform's native shapes are mapped into
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Canonical Schema
//!
//! Every platform adapter maps its native API shapes into the types defined
//! here. Consumers (storage layer, dashboard) only ever see these types;
//! nothing platform-specific leaks past the adapter boundary.
//!
//! Ordering inside the collections is fetch order and carries no meaning —
//! consumers re-sort for display.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroize;

/// One of the four data categories a sync fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncCategory {
    Lessons,
    Substitutions,
    Messages,
    Homework,
}

impl SyncCategory {
    /// Stable wire name of this category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lessons => "lessons",
            Self::Substitutions => "substitutions",
            Self::Messages => "messages",
            Self::Homework => "homework",
        }
    }
}

impl fmt::Display for SyncCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-stable diagnostic codes for category-level outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// Category fetched and mapped successfully
    Ok,
    /// Upstream answered with a non-2xx status
    HttpError,
    /// Payload did not match the expected contract
    ShapeMismatch,
    /// Network failure, timeout, or any other unclassified error
    NetworkError,
    /// The platform cannot provide this category at all
    NotSupported,
}

/// Structured, non-fatal record of one category's fetch outcome
///
/// Invariant: a sync produces exactly one diagnostic per attempted category.
/// The orchestrator filters `ok` diagnostics before the result reaches the
/// caller, so only anomalies surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDiagnostic {
    /// Which category this diagnostic describes
    pub category: SyncCategory,
    /// Outcome classification
    pub code: DiagnosticCode,
    /// HTTP status for `http_error` outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Human-readable detail (expectation message, network error text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SyncDiagnostic {
    /// Successful-category diagnostic
    #[must_use]
    pub const fn ok(category: SyncCategory) -> Self {
        Self {
            category,
            code: DiagnosticCode::Ok,
            http_status: None,
            detail: None,
        }
    }

    /// Whether this diagnostic reports a clean fetch
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == DiagnosticCode::Ok
    }
}

/// Classification of a substitution entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionType {
    Cancelled,
    Substituted,
    RoomChange,
    Other,
}

/// One recurring timetable slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonData {
    /// Subject name; degrades to "Unbekannt" when the platform omits it
    pub subject: String,
    pub teacher: Option<String>,
    pub room: Option<String>,
    /// ISO weekday, 1 (Monday) through 5 (Friday)
    pub day_of_week: u8,
    /// Position of the lesson within the school day, 1-based
    pub lesson_number: u32,
    /// Start time as "HH:MM"
    pub start_time: String,
    /// End time as "HH:MM"
    pub end_time: String,
}

/// One substitution-plan entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionData {
    /// Affected day as "YYYY-MM-DD"
    pub date: String,
    pub lesson_number: u32,
    pub original_subject: Option<String>,
    pub new_subject: Option<String>,
    pub original_teacher: Option<String>,
    pub new_teacher: Option<String>,
    pub new_room: Option<String>,
    /// Normalized classification; unmatched vendor text degrades to `other`
    #[serde(rename = "type")]
    pub kind: SubstitutionType,
    pub info_text: Option<String>,
}

/// One platform message or announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    /// Platform-scoped message id
    pub id: String,
    pub title: String,
    pub body: String,
    pub sender: Option<String>,
    /// Message date as "YYYY-MM-DD"
    pub date: String,
    pub read: bool,
}

/// One homework assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkData {
    /// Platform-scoped assignment id
    pub id: String,
    pub subject: String,
    pub description: String,
    /// Due date as "YYYY-MM-DD"
    pub due_date: String,
    pub completed: bool,
}

/// Aggregated outcome of one sync invocation
///
/// Created fresh per call and owned by the caller once returned; the engine
/// retains nothing from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub lessons: Vec<LessonData>,
    pub substitutions: Vec<SubstitutionData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<MessageData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub homework: Vec<HomeworkData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<SyncDiagnostic>,
}

impl SyncResult {
    /// Whether every attempted category completed cleanly
    #[must_use]
    pub fn is_full_success(&self) -> bool {
        self.diagnostics.iter().all(SyncDiagnostic::is_ok)
    }
}

/// Ephemeral login credentials for one platform account
///
/// Lifecycle contract: constructed at call entry, moved into exactly one
/// `sync` invocation, never persisted, never logged. Username, password, and
/// extra field values are zeroized when the value is dropped at the end of
/// that call.
pub struct PlatformCredentials {
    pub username: String,
    pub password: String,
    /// Additional platform-specific fields (student id, school token, ...)
    pub extra: HashMap<String, String>,
}

impl PlatformCredentials {
    /// Credentials with only username and password
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            extra: HashMap::new(),
        }
    }

    /// Attach an extra platform-specific credential field
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Drop for PlatformCredentials {
    fn drop(&mut self) {
        self.username.zeroize();
        self.password.zeroize();
        for (_, mut value) in self.extra.drain() {
            value.zeroize();
        }
    }
}

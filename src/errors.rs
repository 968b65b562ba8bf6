// ABOUTME: Unified error handling for the sync engine with stable error codes
// ABOUTME: Maps engine failures onto the HTTP statuses the outer handler uses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Unified Error Handling
//!
//! Every fatal engine failure is an [`AppError`] carrying an [`ErrorCode`].
//! The codes are wire-stable: the outer HTTP handler maps them to status
//! codes (401 auth, 429 rate limit, 502 upstream, 400 config/URL) without
//! inspecting messages. Category-level fetch failures are *not* errors in
//! this sense; they are absorbed into diagnostics (see [`crate::diagnostics`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Platform rejected the supplied credentials
    #[serde(rename = "AUTH_FAILED")]
    AuthFailed,
    /// A required platform config field is missing
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing,
    /// A config value is present but unusable (unknown platform, bad URL, ...)
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid,
    /// User-supplied host failed SSRF validation
    #[serde(rename = "URL_BLOCKED")]
    UrlBlocked,
    /// Too many sync attempts inside the rate-limit window
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,
    /// The platform could not be reached or answered with a server error
    #[serde(rename = "UPSTREAM_ERROR")]
    UpstreamError,
    /// Anything that should not happen
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code the outer handler should answer with
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ConfigMissing | Self::ConfigInvalid | Self::UrlBlocked => 400,
            Self::AuthFailed => 401,
            Self::RateLimitExceeded => 429,
            Self::UpstreamError => 502,
            Self::InternalError => 500,
        }
    }

    /// Get a user-facing description of this error class
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthFailed => "Authentication with the school platform failed",
            Self::ConfigMissing => "A required connection field is missing",
            Self::ConfigInvalid => "The connection configuration is invalid",
            Self::UrlBlocked => "The supplied server address is not allowed",
            Self::RateLimitExceeded => "Too many sync attempts, please retry later",
            Self::UpstreamError => "The school platform did not respond properly",
            Self::InternalError => "An internal error occurred",
        }
    }
}

/// Unified error type for the sync engine
#[derive(Debug, Error)]
pub struct AppError {
    /// Stable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Source error for chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach a source error for chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Platform login rejected
    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthFailed, message)
    }

    /// Required config field missing
    pub fn config_missing(field: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissing,
            format!("missing required config field `{field}`"),
        )
    }

    /// Invalid config value
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Host blocked by the SSRF guard
    pub fn url_blocked(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UrlBlocked, message)
    }

    /// Sliding-window rate limit hit
    pub fn rate_limited(limit: u32) -> Self {
        Self::new(
            ErrorCode::RateLimitExceeded,
            format!("rate limit of {limit} attempts exceeded"),
        )
    }

    /// Upstream platform unreachable or broken
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamError, message)
    }

    /// Internal engine error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, error.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

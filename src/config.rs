// ABOUTME: Environment-based configuration for the sync engine
// ABOUTME: Handles rate-limit and timeout tuning via SCHULSYNC_* variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment-based engine configuration
//!
//! The engine is a library; everything here has a hardcoded default so that
//! embedding it requires zero configuration. Deployments tune behaviour via
//! `SCHULSYNC_*` environment variables.

use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// Default number of sync attempts allowed per caller per window
pub const DEFAULT_RATE_LIMIT: u32 = 10;
/// Default rate-limit window
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 900;
/// Default timeout for a single platform HTTP request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
/// Default timeout for the login step (the single point of failure)
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for the sync engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sync attempts allowed per caller key within `rate_window`
    pub rate_limit: u32,
    /// Sliding rate-limit window
    pub rate_window: Duration,
    /// Timeout applied to every platform HTTP request
    pub request_timeout: Duration,
    /// Timeout applied to the login request specifically
    pub login_timeout: Duration,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self {
            rate_limit: parse_env_u64("SCHULSYNC_RATE_LIMIT", u64::from(DEFAULT_RATE_LIMIT))
                .try_into()
                .unwrap_or(DEFAULT_RATE_LIMIT),
            rate_window: Duration::from_secs(parse_env_u64(
                "SCHULSYNC_RATE_WINDOW_SECS",
                DEFAULT_RATE_WINDOW_SECS,
            )),
            request_timeout: Duration::from_secs(parse_env_u64(
                "SCHULSYNC_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            login_timeout: Duration::from_secs(parse_env_u64(
                "SCHULSYNC_LOGIN_TIMEOUT_SECS",
                DEFAULT_LOGIN_TIMEOUT_SECS,
            )),
        };

        info!(
            "Engine configured: rate limit {}/{}s, request timeout {}s, login timeout {}s",
            config.rate_limit,
            config.rate_window.as_secs(),
            config.request_timeout.as_secs(),
            config.login_timeout.as_secs()
        );

        config
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            login_timeout: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
        }
    }
}

/// Parse a numeric environment variable, falling back to `default`
fn parse_env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid value for {key}: {raw}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

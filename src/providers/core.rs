// ABOUTME: Core adapter trait and config-field schema for school platform integrations
// ABOUTME: Defines the single contract every platform variant implements
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Platform Adapter Contract
//!
//! [`PlatformAdapter::sync`] is the one interface every platform implements
//! and the seam where tests substitute a fake adapter. The contract:
//!
//! - Missing required config aborts immediately, before any network call.
//! - Login failure is fatal for the whole sync (nothing was fetched yet).
//! - After login, category fetch failures are non-fatal: the category comes
//!   back empty with a diagnostic, siblings are unaffected.
//! - Logout/token invalidation is attempted on every exit path after login,
//!   best-effort.
//! - Credentials are moved into the call and become unreachable (and are
//!   zeroized) when it returns.

use crate::errors::{AppError, AppResult};
use crate::models::{PlatformCredentials, SyncResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Per-connection platform configuration (server URL, school id, ...)
pub type PlatformConfig = HashMap<String, String>;

/// Closed set of supported platform identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformId {
    WebUntis,
    IServ,
    Schulmanager,
    Moodle,
    Sdui,
}

impl PlatformId {
    /// All supported platforms, registration order
    pub const ALL: [Self; 5] = [
        Self::WebUntis,
        Self::IServ,
        Self::Schulmanager,
        Self::Moodle,
        Self::Sdui,
    ];

    /// Stable wire identifier of this platform
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebUntis => "webuntis",
            Self::IServ => "iserv",
            Self::Schulmanager => "schulmanager",
            Self::Moodle => "moodle",
            Self::Sdui => "sdui",
        }
    }

    /// Human-readable platform name for UI surfaces
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::WebUntis => "WebUntis",
            Self::IServ => "IServ",
            Self::Schulmanager => "Schulmanager Online",
            Self::Moodle => "Moodle",
            Self::Sdui => "Sdui",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webuntis" => Ok(Self::WebUntis),
            "iserv" => Ok(Self::IServ),
            "schulmanager" => Ok(Self::Schulmanager),
            "moodle" => Ok(Self::Moodle),
            "sdui" => Ok(Self::Sdui),
            other => Err(AppError::config_invalid(format!(
                "unsupported platform: {other}"
            ))),
        }
    }
}

/// Declarative description of one connection-form field
///
/// Rendered by the external UI; the registry does not validate these against
/// the adapter — each adapter independently checks its own required keys.
#[derive(Debug, Clone, Copy)]
pub struct ConfigField {
    /// Config map key the value is stored under
    pub key: &'static str,
    /// Form label
    pub label: &'static str,
    /// Whether the field must be filled
    pub required: bool,
    /// Help text shown next to the field
    pub help: &'static str,
}

/// Core school-platform adapter trait
///
/// Implementations must be `Send + Sync`; all per-sync state is local to one
/// `sync` call.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Which platform this adapter talks to
    fn id(&self) -> PlatformId;

    /// Perform one full sync for one child account
    ///
    /// # Errors
    ///
    /// Fatal only for config, SSRF, and login failures. Category-level fetch
    /// failures after login never surface here; they are reflected in the
    /// returned [`SyncResult::diagnostics`].
    async fn sync(
        &self,
        config: &PlatformConfig,
        credentials: PlatformCredentials,
    ) -> AppResult<SyncResult>;
}

/// Fetch a required key from the config map
///
/// # Errors
///
/// Returns a config error naming the missing field; adapters call this before
/// any network activity.
pub fn require_field<'a>(config: &'a PlatformConfig, key: &str) -> AppResult<&'a str> {
    config
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::config_missing(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_id_round_trip() {
        for id in PlatformId::ALL {
            assert_eq!(id.as_str().parse::<PlatformId>().unwrap(), id);
        }
    }

    #[test]
    fn test_unknown_platform_is_config_error() {
        let error = "schoolfox".parse::<PlatformId>().unwrap_err();
        assert_eq!(error.code, crate::errors::ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_require_field_rejects_blank_values() {
        let mut config = PlatformConfig::new();
        config.insert("server".into(), "  ".into());
        assert!(require_field(&config, "server").is_err());

        config.insert("server".into(), "hepta.webuntis.com".into());
        assert_eq!(require_field(&config, "server").unwrap(), "hepta.webuntis.com");
    }
}

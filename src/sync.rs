// ABOUTME: Caller-facing sync orchestrator gating and dispatching platform syncs
// ABOUTME: Rate-limit check, adapter resolution, and diagnostic filtering in one entry point
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Sync Orchestrator
//!
//! The one entry point callers use. Order matters: the rate limiter runs
//! before anything else so a throttled caller costs no network activity, then
//! the registry resolves the adapter, then credentials move by value into
//! exactly one `sync` call. Clean (`ok`) diagnostics are filtered out before
//! the result is returned; callers only see anomalies.

use crate::config::EngineConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{PlatformCredentials, SyncResult};
use crate::providers::{AdapterRegistry, PlatformConfig, PlatformId};
use crate::rate_limiting::SlidingWindowLimiter;
use std::sync::Arc;
use tracing::{debug, info};

/// Orchestrates one platform sync per call on behalf of an identified caller
pub struct SyncOrchestrator {
    registry: Arc<AdapterRegistry>,
    limiter: Arc<SlidingWindowLimiter>,
    rate_limit: u32,
    rate_window: std::time::Duration,
}

impl SyncOrchestrator {
    /// Orchestrator with its own registry and limiter
    #[must_use]
    pub fn new(engine: &EngineConfig) -> Self {
        Self::with_parts(
            engine,
            Arc::new(AdapterRegistry::new(engine)),
            Arc::new(SlidingWindowLimiter::new()),
        )
    }

    /// Orchestrator over injected collaborators (test seam)
    #[must_use]
    pub fn with_parts(
        engine: &EngineConfig,
        registry: Arc<AdapterRegistry>,
        limiter: Arc<SlidingWindowLimiter>,
    ) -> Self {
        Self {
            registry,
            limiter,
            rate_limit: engine.rate_limit,
            rate_window: engine.rate_window,
        }
    }

    /// Run one sync for `caller_key` against `platform`
    ///
    /// Credentials are consumed by this call and zeroized when it returns,
    /// whatever the outcome.
    ///
    /// # Errors
    ///
    /// Rate-limit denial, unknown platform, missing or invalid config, SSRF
    /// rejection, and login failure are fatal. Per-category fetch problems
    /// are not errors; they arrive as diagnostics on the [`SyncResult`].
    pub async fn sync(
        &self,
        caller_key: &str,
        platform: PlatformId,
        config: &PlatformConfig,
        credentials: PlatformCredentials,
    ) -> AppResult<SyncResult> {
        let decision = self
            .limiter
            .check(caller_key, self.rate_limit, self.rate_window);
        if !decision.allowed {
            return Err(AppError::rate_limited(self.rate_limit));
        }
        debug!(
            platform = %platform,
            remaining = decision.remaining,
            "sync admitted"
        );

        let adapter = self.registry.get(platform).ok_or_else(|| {
            AppError::config_invalid(format!("no adapter registered for {platform}"))
        })?;

        let mut result = adapter.sync(config, credentials).await?;
        result.diagnostics.retain(|d| !d.is_ok());

        info!(
            platform = %platform,
            lessons = result.lessons.len(),
            substitutions = result.substitutions.len(),
            messages = result.messages.len(),
            homework = result.homework.len(),
            anomalies = result.diagnostics.len(),
            "sync finished"
        );
        Ok(result)
    }
}

// ABOUTME: Sliding-window rate limiter gating sync attempts per caller identity
// ABOUTME: Process-wide concurrent state with a best-effort background sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Sliding-Window Rate Limiting
//!
//! Each caller key owns an independent history of attempt timestamps. A check
//! drops timestamps older than the window, then either rejects (at or over
//! the limit, attempt not recorded) or records the attempt and reports the
//! remaining budget.
//!
//! The per-key state is the engine's only cross-call shared mutable state.
//! Correctness never depends on the sweep: a stale-but-present history still
//! computes correctly because every check filters on read.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether this attempt may proceed
    pub allowed: bool,
    /// Attempts left in the window after this one
    pub remaining: u32,
}

/// Injectable time source so tests can advance the clock deterministically
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source used in production
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Sliding-window rate limiter keyed by caller identity
pub struct SlidingWindowLimiter {
    entries: DashMap<String, Vec<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// Limiter on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Limiter on an injected clock (tests)
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Check and record one attempt for `key`
    ///
    /// Denied attempts are not recorded, so a caller hammering a saturated
    /// key does not extend their own lockout.
    #[must_use]
    pub fn check(&self, key: &str, limit: u32, window: std::time::Duration) -> RateLimitDecision {
        let now = self.clock.now();
        let window = Duration::from_std(window).unwrap_or_else(|_| Duration::seconds(i64::MAX));
        let cutoff = now - window;

        let mut entry = self.entries.entry(key.to_owned()).or_default();
        entry.retain(|stamp| *stamp > cutoff);

        let used = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        if used >= limit {
            debug!("Rate limit hit for key {key}: {used}/{limit} in window");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
            };
        }

        entry.push(now);
        RateLimitDecision {
            allowed: true,
            remaining: limit - (used + 1),
        }
    }

    /// Drop keys whose entire history has aged out of `window`
    ///
    /// Housekeeping only; bounds memory for long-running processes.
    pub fn sweep(&self, window: std::time::Duration) {
        let window = Duration::from_std(window).unwrap_or_else(|_| Duration::seconds(i64::MAX));
        let cutoff = self.clock.now() - window;
        self.entries
            .retain(|_, stamps| stamps.iter().any(|stamp| *stamp > cutoff));
    }

    /// Number of keys currently tracked
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    /// Spawn a background task sweeping every `interval`
    ///
    /// Best-effort eviction; abort the returned handle on shutdown.
    #[must_use]
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: std::time::Duration,
        window: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                limiter.sweep(window);
            }
        })
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    struct TestClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl TestClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, duration: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += duration;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    const WINDOW: StdDuration = StdDuration::from_secs(60);

    #[test]
    fn test_remaining_counts_down_then_denies() {
        let limiter = SlidingWindowLimiter::new();
        assert_eq!(
            limiter.check("a", 3, WINDOW),
            RateLimitDecision {
                allowed: true,
                remaining: 2
            }
        );
        assert_eq!(limiter.check("a", 3, WINDOW).remaining, 1);
        assert_eq!(limiter.check("a", 3, WINDOW).remaining, 0);
        let denied = limiter.check("a", 3, WINDOW);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[test]
    fn test_window_expiry_resets_budget() {
        let clock = TestClock::new();
        let limiter = SlidingWindowLimiter::with_clock(clock.clone());
        for _ in 0..3 {
            assert!(limiter.check("a", 3, WINDOW).allowed);
        }
        assert!(!limiter.check("a", 3, WINDOW).allowed);

        clock.advance(Duration::seconds(61));
        let decision = limiter.check("a", 3, WINDOW);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = SlidingWindowLimiter::new();
        for _ in 0..3 {
            let _ = limiter.check("a", 3, WINDOW);
        }
        assert!(!limiter.check("a", 3, WINDOW).allowed);
        assert!(limiter.check("b", 3, WINDOW).allowed);
    }

    #[test]
    fn test_sweep_drops_aged_keys_only() {
        let clock = TestClock::new();
        let limiter = SlidingWindowLimiter::with_clock(clock.clone());
        let _ = limiter.check("old", 3, WINDOW);
        clock.advance(Duration::seconds(120));
        let _ = limiter.check("fresh", 3, WINDOW);

        limiter.sweep(WINDOW);
        assert_eq!(limiter.tracked_keys(), 1);
        // Stale history was already invisible to checks before the sweep
        assert_eq!(limiter.check("old", 3, WINDOW).remaining, 2);
    }
}

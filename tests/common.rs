// ABOUTME: Shared test utilities for integration tests
// ABOUTME: Provides logging setup and canned config/credential builders
#![allow(dead_code)]
//! Shared test utilities for `schulsync`

use schulsync::models::PlatformCredentials;
use schulsync::providers::PlatformConfig;
use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        // Check for TEST_LOG environment variable to control test logging level
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN, // Default to WARN for quiet tests
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Credentials fixture; values are placeholders for mocked upstreams
pub fn test_credentials() -> PlatformCredentials {
    PlatformCredentials::new("eltern@example.de", "korrektes-passwort")
}

/// Config map from key/value pairs
pub fn config_of(pairs: &[(&str, &str)]) -> PlatformConfig {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

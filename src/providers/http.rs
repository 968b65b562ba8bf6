// ABOUTME: Shared HTTP client construction and JSON decoding for platform adapters
// ABOUTME: Applies conservative timeouts and maps responses onto the fetch-error taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP plumbing for adapters
//!
//! All platform traffic goes through clients built here so every request
//! carries a timeout; no engine operation may block indefinitely.

use crate::diagnostics::FetchError;
use crate::errors::{AppError, AppResult};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Client for token/bearer-style platforms
///
/// # Errors
///
/// Returns an internal error if the TLS backend fails to initialize.
pub fn client(timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
        .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))
}

/// Client with a per-call cookie store for session-cookie platforms
///
/// The cookie store lives exactly as long as the client, which lives exactly
/// as long as one `sync` call, so no session material survives the call.
///
/// # Errors
///
/// Returns an internal error if the TLS backend fails to initialize.
pub fn session_client(timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .cookie_store(true)
        .build()
        .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))
}

/// Decode a JSON response body, classifying failures
///
/// Non-2xx statuses become [`FetchError::Http`]; undecodable bodies become
/// [`FetchError::Shape`] with the decoder's expectation message.
///
/// # Errors
///
/// See above; transport failures while reading the body are network errors.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
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
    serde_json::from_slice(&bytes).map_err(FetchError::from)
}

// ABOUTME: Per-category diagnostic wrapper isolating fetch failures from the sync
// ABOUTME: Turns any category error into an empty result plus a structured diagnostic
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Diagnostic Wrapper
//!
//! [`fetch_with_diagnostic`] is the sole mechanism keeping a category-level
//! failure from failing the whole sync. It never lets an error escape: a
//! failed fetch becomes an empty collection plus a [`SyncDiagnostic`]
//! preserving the failure class, HTTP status, and detail text.

use crate::models::{DiagnosticCode, SyncCategory, SyncDiagnostic};
use std::future::Future;
use thiserror::Error;
use tracing::debug;

/// Classified failure of one category fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-2xx status
    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },
    /// Payload decoded but did not match the expected contract
    #[error("unexpected payload shape: {0}")]
    Shape(String),
    /// Network failure, timeout, or any unclassified error
    #[error("{0}")]
    Network(String),
    /// The platform cannot provide this category
    #[error("not supported by this platform")]
    NotSupported,
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            Self::Http {
                status: status.as_u16(),
            }
        } else if error.is_decode() {
            Self::Shape(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

// Stringly failures from deep inside an adapter still classify as network
// errors with a non-empty detail.
impl From<String> for FetchError {
    fn from(message: String) -> Self {
        Self::Network(message)
    }
}

impl From<anyhow::Error> for FetchError {
    fn from(error: anyhow::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        Self::Shape(error.to_string())
    }
}

impl FetchError {
    /// Build the diagnostic describing this failure for `category`
    #[must_use]
    pub fn into_diagnostic(self, category: SyncCategory) -> SyncDiagnostic {
        match self {
            Self::Http { status } => SyncDiagnostic {
                category,
                code: DiagnosticCode::HttpError,
                http_status: Some(status),
                detail: None,
            },
            Self::Shape(detail) => SyncDiagnostic {
                category,
                code: DiagnosticCode::ShapeMismatch,
                http_status: None,
                detail: Some(detail),
            },
            Self::Network(detail) => SyncDiagnostic {
                category,
                code: DiagnosticCode::NetworkError,
                http_status: None,
                detail: Some(if detail.is_empty() {
                    "unknown network error".to_owned()
                } else {
                    detail
                }),
            },
            Self::NotSupported => SyncDiagnostic {
                category,
                code: DiagnosticCode::NotSupported,
                http_status: None,
                detail: None,
            },
        }
    }
}

/// Run one category fetch, converting failure into `([], diagnostic)`
///
/// On success the fetched data passes through unchanged with an `ok`
/// diagnostic. This function cannot fail; isolation between sibling category
/// fetches rests on that.
pub async fn fetch_with_diagnostic<T, F>(
    category: SyncCategory,
    fetch: F,
) -> (Vec<T>, SyncDiagnostic)
where
    F: Future<Output = Result<Vec<T>, FetchError>>,
{
    match fetch.await {
        Ok(data) => (data, SyncDiagnostic::ok(category)),
        Err(error) => {
            debug!("Category {category} fetch failed: {error}");
            (Vec::new(), error.into_diagnostic(category))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_data_through() {
        let (data, diag) = fetch_with_diagnostic(SyncCategory::Lessons, async {
            Ok(vec![1, 2, 3])
        })
        .await;
        assert_eq!(data, vec![1, 2, 3]);
        assert!(diag.is_ok());
        assert_eq!(diag.category, SyncCategory::Lessons);
    }

    #[tokio::test]
    async fn test_http_error_preserves_status() {
        let (data, diag) = fetch_with_diagnostic::<u8, _>(SyncCategory::Substitutions, async {
            Err(FetchError::Http { status: 503 })
        })
        .await;
        assert!(data.is_empty());
        assert_eq!(diag.code, DiagnosticCode::HttpError);
        assert_eq!(diag.http_status, Some(503));
    }

    #[tokio::test]
    async fn test_stringly_failure_becomes_network_error() {
        let (data, diag) = fetch_with_diagnostic::<u8, _>(SyncCategory::Messages, async {
            Err(FetchError::from("connection reset".to_owned()))
        })
        .await;
        assert!(data.is_empty());
        assert_eq!(diag.code, DiagnosticCode::NetworkError);
        assert_eq!(diag.detail.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn test_empty_detail_still_nonempty() {
        let (_, diag) = fetch_with_diagnostic::<u8, _>(SyncCategory::Homework, async {
            Err(FetchError::Network(String::new()))
        })
        .await;
        assert!(!diag.detail.unwrap().is_empty());
    }
}

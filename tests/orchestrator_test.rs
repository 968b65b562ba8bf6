// ABOUTME: Integration tests for the sync orchestrator using a fake adapter
// ABOUTME: Covers rate gating, adapter dispatch, and ok-diagnostic filtering

mod common;

use async_trait::async_trait;
use schulsync::config::EngineConfig;
use schulsync::errors::{AppError, AppResult, ErrorCode};
use schulsync::models::{
    DiagnosticCode, LessonData, PlatformCredentials, SyncCategory, SyncDiagnostic, SyncResult,
};
use schulsync::providers::{AdapterRegistry, PlatformAdapter, PlatformConfig, PlatformId};
use schulsync::rate_limiting::SlidingWindowLimiter;
use schulsync::sync::SyncOrchestrator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Test double behind the adapter seam
struct FakeAdapter {
    calls: Arc<AtomicUsize>,
    fail_login: bool,
}

impl FakeAdapter {
    fn lesson() -> LessonData {
        LessonData {
            subject: "Mathematik".into(),
            teacher: Some("Fr. Weber".into()),
            room: Some("B204".into()),
            day_of_week: 1,
            lesson_number: 3,
            start_time: "09:50".into(),
            end_time: "10:35".into(),
        }
    }
}

#[async_trait]
impl PlatformAdapter for FakeAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::WebUntis
    }

    async fn sync(
        &self,
        _config: &PlatformConfig,
        _credentials: PlatformCredentials,
    ) -> AppResult<SyncResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login {
            return Err(AppError::auth_failed("bad credentials"));
        }
        Ok(SyncResult {
            lessons: vec![Self::lesson()],
            substitutions: Vec::new(),
            messages: Vec::new(),
            homework: Vec::new(),
            diagnostics: vec![
                SyncDiagnostic::ok(SyncCategory::Lessons),
                SyncDiagnostic {
                    category: SyncCategory::Substitutions,
                    code: DiagnosticCode::HttpError,
                    http_status: Some(500),
                    detail: None,
                },
                SyncDiagnostic::ok(SyncCategory::Messages),
                SyncDiagnostic::ok(SyncCategory::Homework),
            ],
        })
    }
}

fn orchestrator_with_fake(
    engine: &EngineConfig,
    fake: FakeAdapter,
) -> SyncOrchestrator {
    let mut registry = AdapterRegistry::new(engine);
    registry.register(Arc::new(fake));
    SyncOrchestrator::with_parts(
        engine,
        Arc::new(registry),
        Arc::new(SlidingWindowLimiter::new()),
    )
}

#[tokio::test]
async fn test_ok_diagnostics_are_filtered_from_the_result() {
    common::init_test_logging();
    let engine = EngineConfig::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = orchestrator_with_fake(
        &engine,
        FakeAdapter {
            calls: calls.clone(),
            fail_login: false,
        },
    );

    let result = orchestrator
        .sync(
            "parent-1",
            PlatformId::WebUntis,
            &PlatformConfig::new(),
            common::test_credentials(),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.lessons.len(), 1);
    // Only the anomaly survives the filter.
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].category, SyncCategory::Substitutions);
    assert_eq!(result.diagnostics[0].http_status, Some(500));
}

#[tokio::test]
async fn test_login_failure_propagates_as_auth_error() {
    let engine = EngineConfig::default();
    let orchestrator = orchestrator_with_fake(
        &engine,
        FakeAdapter {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_login: true,
        },
    );

    let error = orchestrator
        .sync(
            "parent-1",
            PlatformId::WebUntis,
            &PlatformConfig::new(),
            common::test_credentials(),
        )
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::AuthFailed);
    assert_eq!(error.code.http_status(), 401);
}

#[tokio::test]
async fn test_rate_limit_blocks_before_the_adapter_runs() {
    let engine = EngineConfig {
        rate_limit: 1,
        ..EngineConfig::default()
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = orchestrator_with_fake(
        &engine,
        FakeAdapter {
            calls: calls.clone(),
            fail_login: false,
        },
    );

    let first = orchestrator
        .sync(
            "parent-1",
            PlatformId::WebUntis,
            &PlatformConfig::new(),
            common::test_credentials(),
        )
        .await;
    assert!(first.is_ok());

    let second = orchestrator
        .sync(
            "parent-1",
            PlatformId::WebUntis,
            &PlatformConfig::new(),
            common::test_credentials(),
        )
        .await
        .unwrap_err();
    assert_eq!(second.code, ErrorCode::RateLimitExceeded);
    // The adapter never saw the throttled attempt.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_throttled_caller_does_not_block_others() {
    let engine = EngineConfig {
        rate_limit: 1,
        ..EngineConfig::default()
    };
    let orchestrator = orchestrator_with_fake(
        &engine,
        FakeAdapter {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_login: false,
        },
    );
    let config = PlatformConfig::new();

    let _ = orchestrator
        .sync("parent-a", PlatformId::WebUntis, &config, common::test_credentials())
        .await;
    assert!(orchestrator
        .sync("parent-a", PlatformId::WebUntis, &config, common::test_credentials())
        .await
        .is_err());

    assert!(orchestrator
        .sync("parent-b", PlatformId::WebUntis, &config, common::test_credentials())
        .await
        .is_ok());
}

// ABOUTME: End-to-end WebUntis sync test against a mocked JSON-RPC endpoint
// ABOUTME: Verifies partial success when one category fails upstream

mod common;

use schulsync::config::EngineConfig;
use schulsync::errors::ErrorCode;
use schulsync::models::{DiagnosticCode, SyncCategory};
use schulsync::providers::webuntis::WebUntisAdapter;
use schulsync::providers::PlatformAdapter;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RPC_PATH: &str = "/WebUntis/jsonrpc.do";

async fn mock_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "schulsync", "result": result })),
        )
        .mount(server)
        .await;
}

fn untis_config() -> schulsync::providers::PlatformConfig {
    common::config_of(&[("school", "gym-musterstadt"), ("student_id", "101")])
}

#[tokio::test]
async fn test_failed_category_yields_partial_result() {
    common::init_test_logging();
    let server = MockServer::start().await;

    mock_rpc(
        &server,
        "authenticate",
        json!({ "sessionId": "x", "personId": 101, "personType": 5 }),
    )
    .await;
    mock_rpc(
        &server,
        "getTimegridUnits",
        json!([{ "day": 2, "timeUnits": [
            { "name": "1", "startTime": 755, "endTime": 840 },
            { "name": "2", "startTime": 845, "endTime": 930 },
        ]}]),
    )
    .await;
    mock_rpc(
        &server,
        "getTimetable",
        json!([{
            "id": 1,
            "date": 20_260_302,
            "startTime": 845,
            "endTime": 930,
            "su": [{ "id": 4, "name": "M", "longname": "Mathematik" }],
            "te": [{ "id": 9, "name": "WEB", "longname": "Weber" }],
            "ro": [{ "id": 2, "name": "B204" }],
        }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(body_partial_json(json!({ "method": "getSubstitutions" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mock_rpc(&server, "getMessagesOfDay", json!([])).await;
    mock_rpc(&server, "getHomeWorks", json!([])).await;
    mock_rpc(&server, "logout", json!({})).await;

    let adapter = WebUntisAdapter::with_base_url(&EngineConfig::default(), server.uri());
    let result = adapter
        .sync(&untis_config(), common::test_credentials())
        .await
        .unwrap();

    assert_eq!(result.lessons.len(), 1);
    let lesson = &result.lessons[0];
    assert_eq!(lesson.subject, "Mathematik");
    assert_eq!(lesson.teacher.as_deref(), Some("Weber"));
    assert_eq!(lesson.room.as_deref(), Some("B204"));
    assert_eq!(lesson.day_of_week, 1, "2026-03-02 is a Monday");
    assert_eq!(lesson.lesson_number, 2, "845 is the second timegrid slot");
    assert_eq!(lesson.start_time, "08:45");
    assert_eq!(lesson.end_time, "09:30");

    assert!(result.substitutions.is_empty());

    let anomalies: Vec<_> = result.diagnostics.iter().filter(|d| !d.is_ok()).collect();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].category, SyncCategory::Substitutions);
    assert_eq!(anomalies[0].code, DiagnosticCode::HttpError);
    assert_eq!(anomalies[0].http_status, Some(500));
}

#[tokio::test]
async fn test_rpc_error_on_login_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(body_partial_json(json!({ "method": "authenticate" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "schulsync",
            "error": { "code": -8504, "message": "bad credentials" },
        })))
        .mount(&server)
        .await;

    let adapter = WebUntisAdapter::with_base_url(&EngineConfig::default(), server.uri());
    let error = adapter
        .sync(&untis_config(), common::test_credentials())
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::AuthFailed);
}

#[tokio::test]
async fn test_unknown_rpc_method_reports_not_supported() {
    let server = MockServer::start().await;

    mock_rpc(&server, "authenticate", json!({ "personId": 101 })).await;
    mock_rpc(&server, "getTimegridUnits", json!([])).await;
    mock_rpc(&server, "getTimetable", json!([])).await;
    mock_rpc(&server, "getSubstitutions", json!([])).await;
    mock_rpc(&server, "getMessagesOfDay", json!([])).await;
    // Older instances do not expose the homework endpoint at all.
    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(body_partial_json(json!({ "method": "getHomeWorks" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "schulsync",
            "error": { "code": -32_601, "message": "Method not found" },
        })))
        .mount(&server)
        .await;
    mock_rpc(&server, "logout", json!({})).await;

    let adapter = WebUntisAdapter::with_base_url(&EngineConfig::default(), server.uri());
    let result = adapter
        .sync(&untis_config(), common::test_credentials())
        .await
        .unwrap();

    assert!(result.homework.is_empty());
    let homework_diag = result
        .diagnostics
        .iter()
        .find(|d| d.category == SyncCategory::Homework)
        .unwrap();
    assert_eq!(homework_diag.code, DiagnosticCode::NotSupported);
}

#[tokio::test]
async fn test_logout_is_attempted_after_fetches() {
    let server = MockServer::start().await;

    mock_rpc(&server, "authenticate", json!({ "personId": 101 })).await;
    mock_rpc(&server, "getTimegridUnits", json!([])).await;
    mock_rpc(&server, "getTimetable", json!([])).await;
    mock_rpc(&server, "getSubstitutions", json!([])).await;
    mock_rpc(&server, "getMessagesOfDay", json!([])).await;
    mock_rpc(&server, "getHomeWorks", json!([])).await;
    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(body_partial_json(json!({ "method": "logout" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "schulsync", "result": {} })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let adapter = WebUntisAdapter::with_base_url(&EngineConfig::default(), server.uri());
    let result = adapter
        .sync(&untis_config(), common::test_credentials())
        .await
        .unwrap();
    assert!(result.is_full_success());
}

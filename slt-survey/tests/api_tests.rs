//! Integration tests for slt-survey API endpoints
//!
//! Tests cover:
//! - Health endpoint and survey page
//! - Session lifecycle (create, answer, contact, validate, abandon, expiry, capacity)
//! - Submission: rejected, accepted (rows persisted, state reset), sink failure
//!   (state preserved)
//! - Media proxy with per-item retrieval errors

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use slt_common::catalog::ContentRef;
use slt_common::media::{MediaFetcher, RetrievalError};
use slt_common::sink::{Ack, PersistenceError, Row, RowSink};
use slt_common::{AnswerKind, Catalog, Dimension, Item, Section};
use slt_survey::sessions::SessionRegistry;
use slt_survey::sinks::SqliteSink;
use slt_survey::{build_router, AppState};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

/// Serves the reference text as the payload; `missing*` references fail
struct FakeFetcher;

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, reference: &ContentRef) -> Result<Vec<u8>, RetrievalError> {
        if reference.as_str().starts_with("missing") {
            return Err(RetrievalError::Status {
                reference: reference.to_string(),
                status: 404,
            });
        }
        Ok(format!("RIFF:{}", reference).into_bytes())
    }
}

/// Sink that is always down
struct DownSink;

#[async_trait]
impl RowSink for DownSink {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn append_rows(&self, _rows: &[Row]) -> Result<Ack, PersistenceError> {
        Err(PersistenceError::Http("service unavailable".to_string()))
    }
}

/// Test helper: two binary pairs plus a compound rating section
fn test_catalog() -> Catalog {
    let pairs = Section::single(
        "pairs",
        "Same speaker?",
        AnswerKind::BinaryChoice,
        vec![
            Item::new(["p1a.wav", "p1b.wav"]),
            Item::new(["p2a.wav", "missing.wav"]),
        ],
    );
    let quality = Section {
        id: "quality".to_string(),
        title: "Quality".to_string(),
        instructions: String::new(),
        dimensions: vec![
            Dimension::new("score", "Rate", AnswerKind::OrdinalRating { min: 1, max: 5 }),
            Dimension::new(
                "gender",
                "Speaker",
                AnswerKind::CategoricalClass {
                    labels: vec!["Male".to_string(), "Female".to_string()],
                },
            ),
        ],
        items: vec![Item::new(["q1.wav"])],
    };
    Catalog::new(vec![pairs, quality]).unwrap()
}

fn setup_app(sink: Arc<dyn RowSink>) -> Router {
    let state = AppState::new(test_catalog(), sink, Arc::new(FakeFetcher));
    build_router(state)
}

/// Test helper: build a request with an optional JSON body
fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: send a request and return status + parsed JSON (Null if empty)
async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn new_session(app: &Router) -> String {
    let (status, body) = send(app, request("POST", "/api/sessions", None)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

async fn answer(app: &Router, id: &str, section: &str, item: usize, dim: Option<&str>, value: &str) -> StatusCode {
    let body = json!({
        "section_id": section,
        "item_index": item,
        "dimension": dim,
        "value": value,
    });
    send(app, request("PUT", &format!("/api/sessions/{}/answers", id), Some(body)))
        .await
        .0
}

async fn set_contact(app: &Router, id: &str, contact: &str) {
    let (status, _) = send(
        app,
        request(
            "PUT",
            &format!("/api/sessions/{}/contact", id),
            Some(json!({ "contact": contact })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

async fn answer_everything(app: &Router, id: &str) {
    assert_eq!(answer(app, id, "pairs", 0, None, "Yes").await, StatusCode::NO_CONTENT);
    assert_eq!(answer(app, id, "pairs", 1, None, "No").await, StatusCode::NO_CONTENT);
    assert_eq!(answer(app, id, "quality", 0, Some("score"), "4").await, StatusCode::NO_CONTENT);
    assert_eq!(answer(app, id, "quality", 0, Some("gender"), "Female").await, StatusCode::NO_CONTENT);
    set_contact(app, id, "a@b.co").await;
}

// =============================================================================
// Health and page
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(Arc::new(SqliteSink::in_memory().await.unwrap()));
    let (status, body) = send(&app, request("GET", "/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "slt-survey");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn test_root_serves_html() {
    let app = setup_app(Arc::new(SqliteSink::in_memory().await.unwrap()));
    let response = app.oneshot(request("GET", "/", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_catalog_endpoint_lists_sections_in_order() {
    let app = setup_app(Arc::new(SqliteSink::in_memory().await.unwrap()));
    let (status, body) = send(&app, request("GET", "/api/catalog", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sections"][0]["id"], "pairs");
    assert_eq!(body["sections"][1]["dimensions"][0]["kind"], "ordinal_rating");
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_invalid_value_rejected_at_store_boundary() {
    let app = setup_app(Arc::new(SqliteSink::in_memory().await.unwrap()));
    let id = new_session(&app).await;

    let body = json!({"section_id": "pairs", "item_index": 0, "value": "Maybe"});
    let (status, body) =
        send(&app, request("PUT", &format!("/api/sessions/{}/answers", id), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_VALUE");

    assert_eq!(
        answer(&app, &id, "quality", 0, Some("score"), "6").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(answer(&app, &id, "pairs", 9, None, "Yes").await, StatusCode::BAD_REQUEST);
    // Compound sections must name the dimension
    assert_eq!(answer(&app, &id, "quality", 0, None, "3").await, StatusCode::BAD_REQUEST);

    let (_, snapshot) = send(&app, request("GET", &format!("/api/sessions/{}", id), None)).await;
    assert_eq!(snapshot["answered"], 0);
    assert_eq!(snapshot["total"], 4);
}

#[tokio::test]
async fn test_validation_reports_all_deficiencies_in_catalog_order() {
    let app = setup_app(Arc::new(SqliteSink::in_memory().await.unwrap()));
    let id = new_session(&app).await;
    answer(&app, &id, "quality", 0, Some("gender"), "Male").await;
    answer(&app, &id, "pairs", 1, None, "Yes").await;
    set_contact(&app, &id, "not-an-email").await;

    let (status, body) =
        send(&app, request("GET", &format!("/api/sessions/{}/validation", id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "invalid");
    assert_eq!(
        body["deficiencies"],
        json!([
            {"type": "malformed_contact"},
            {"type": "missing_answer", "section_id": "pairs", "item_index": 0, "dimension": "pairs"},
            {"type": "missing_answer", "section_id": "quality", "item_index": 0, "dimension": "score"},
        ])
    );
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let app = setup_app(Arc::new(SqliteSink::in_memory().await.unwrap()));
    let uri = format!("/api/sessions/{}/submit", uuid::Uuid::new_v4());
    let (status, body) = send(&app, request("POST", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_session_limit_returns_503_until_one_is_released() {
    let state = AppState::new(
        test_catalog(),
        Arc::new(SqliteSink::in_memory().await.unwrap()),
        Arc::new(FakeFetcher),
    )
    .with_sessions(SessionRegistry::with_capacity(1));
    let app = build_router(state);

    let id = new_session(&app).await;
    let (status, body) = send(&app, request("POST", "/api/sessions", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    send(&app, request("DELETE", &format!("/api/sessions/{}", id), None)).await;
    new_session(&app).await;
}

#[tokio::test]
async fn test_expired_session_is_404() {
    let state = AppState::new(
        test_catalog(),
        Arc::new(SqliteSink::in_memory().await.unwrap()),
        Arc::new(FakeFetcher),
    );
    let sessions = state.sessions.clone();
    let app = build_router(state);

    let id = new_session(&app).await;
    assert_eq!(sessions.evict_idle(std::time::Duration::ZERO).await, 1);

    assert_eq!(answer(&app, &id, "pairs", 0, None, "Yes").await, StatusCode::NOT_FOUND);
    let (_, health) = send(&app, request("GET", "/health", None)).await;
    assert_eq!(health["active_sessions"], 0);
}

#[tokio::test]
async fn test_abandoned_session_writes_nothing() {
    let sink = Arc::new(SqliteSink::in_memory().await.unwrap());
    let app = setup_app(sink.clone());
    let id = new_session(&app).await;
    answer_everything(&app, &id).await;

    let (status, _) = send(&app, request("DELETE", &format!("/api/sessions/{}", id), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request("GET", &format!("/api/sessions/{}", id), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(sink.count_rows().await.unwrap(), 0);
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_incomplete_submission_rejected_twice_identically() {
    let sink = Arc::new(SqliteSink::in_memory().await.unwrap());
    let app = setup_app(sink.clone());
    let id = new_session(&app).await;
    answer(&app, &id, "pairs", 0, None, "Yes").await;

    let uri = format!("/api/sessions/{}/submit", id);
    let (status, first) = send(&app, request("POST", &uri, None)).await;
    let (_, second) = send(&app, request("POST", &uri, None)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(first["status"], "rejected");
    assert_eq!(first, second);
    // contact + pairs/1 + two quality dimensions
    assert_eq!(first["deficiencies"].as_array().unwrap().len(), 4);
    assert_eq!(first["deficiencies"][0]["type"], "missing_contact");
    assert_eq!(sink.count_rows().await.unwrap(), 0);
}

#[tokio::test]
async fn test_accepted_submission_persists_rows_and_resets() {
    let sink = Arc::new(SqliteSink::in_memory().await.unwrap());
    let app = setup_app(sink.clone());
    let id = new_session(&app).await;
    answer_everything(&app, &id).await;

    let (status, body) =
        send(&app, request("POST", &format!("/api/sessions/{}/submit", id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["rows_written"], 3);

    let rows = sink.stored_rows().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].section_id, "pairs");
    assert_eq!(rows[1].item_number, 2);
    assert_eq!(rows[1].media, ["p2a.wav", "missing.wav"]);
    assert_eq!(rows[1].answers, [("pairs".to_string(), "No".to_string())]);
    assert_eq!(
        rows[2].answers,
        [
            ("score".to_string(), "4".to_string()),
            ("gender".to_string(), "Female".to_string())
        ]
    );

    // Session is reusable and back to its fresh state
    let (_, snapshot) = send(&app, request("GET", &format!("/api/sessions/{}", id), None)).await;
    assert_eq!(snapshot["answered"], 0);
    assert_eq!(snapshot["contact"], "");
}

#[tokio::test]
async fn test_sink_failure_preserves_answers() {
    let app = setup_app(Arc::new(DownSink));
    let id = new_session(&app).await;
    answer_everything(&app, &id).await;

    let (status, body) =
        send(&app, request("POST", &format!("/api/sessions/{}/submit", id), None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "persistence_failed");
    assert!(body["cause"].as_str().unwrap().contains("service unavailable"));
    assert!(body["message"].as_str().unwrap().contains("preserved"));

    let (_, snapshot) = send(&app, request("GET", &format!("/api/sessions/{}", id), None)).await;
    assert_eq!(snapshot["answered"], 4);
    assert_eq!(snapshot["contact"], "a@b.co");
}

// =============================================================================
// Media
// =============================================================================

#[tokio::test]
async fn test_media_served_from_catalog() {
    let app = setup_app(Arc::new(SqliteSink::in_memory().await.unwrap()));
    let response = app
        .oneshot(request("GET", "/media?ref=p1a.wav", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "audio/wav");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"RIFF:p1a.wav");
}

#[tokio::test]
async fn test_media_failure_is_per_item() {
    let app = setup_app(Arc::new(SqliteSink::in_memory().await.unwrap()));

    let (status, body) = send(&app, request("GET", "/media?ref=missing.wav", None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "BAD_GATEWAY");

    let (status, _) = send(&app, request("GET", "/media?ref=p2a.wav", None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, request("GET", "/media?ref=elsewhere.wav", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//! Google Sheets row sink
//!
//! Sends the whole batch in a single `values:append` request. A request refused
//! with 401 is retried once with a fresh token; nothing was written by the
//! refused request, so the retry cannot duplicate rows.
//!
//! # API Reference
//! - Endpoint: `POST /v4/spreadsheets/{id}/values/{range}:append`
//! - Documentation: https://developers.google.com/sheets/api/reference/rest/v4/spreadsheets.values/append

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::json;
use slt_common::sink::{Ack, PersistenceError, Row, RowSink};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::auth::TokenProvider;

/// Sheets API base URL
const SHEETS_API_URL: &str = "https://sheets.googleapis.com";

pub struct SheetsSink {
    /// HTTP client for API requests
    http_client: Client,
    base_url: String,
    spreadsheet_id: String,
    /// A1 range naming the target sheet
    range: String,
    /// Bearer token source
    tokens: Arc<dyn TokenProvider>,
}

impl SheetsSink {
    pub fn new(
        spreadsheet_id: String,
        range: String,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            base_url: SHEETS_API_URL.to_string(),
            spreadsheet_id,
            range,
            tokens,
        })
    }

    /// Point the sink at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn append_url(&self) -> Result<Url, PersistenceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PersistenceError::Http(format!("Invalid Sheets base URL: {}", e)))?;
        let append_segment = format!("{}:append", self.range);
        url.path_segments_mut()
            .map_err(|_| PersistenceError::Http("Sheets base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                append_segment.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }

    async fn post_append(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<Response, PersistenceError> {
        let token = self.tokens.access_token().await?;
        self.http_client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| PersistenceError::Http(e.to_string()))
    }
}

#[async_trait]
impl RowSink for SheetsSink {
    fn name(&self) -> &'static str {
        "sheets"
    }

    async fn append_rows(&self, rows: &[Row]) -> Result<Ack, PersistenceError> {
        let url = self.append_url()?;
        let body = json!({ "values": rows.iter().map(Row::cells).collect::<Vec<_>>() });
        debug!(rows = rows.len(), "Appending rows to Google Sheets");

        let mut response = self.post_append(url.clone(), &body).await?;
        if response.status() == StatusCode::UNAUTHORIZED && self.tokens.invalidate().await {
            warn!("Sheets API refused the access token, retrying with a fresh one");
            response = self.post_append(url, &body).await?;
        }

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("no error message")
                .to_string();
            return Err(PersistenceError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let rows_written = body
            .get("updates")
            .and_then(|u| u.get("updatedRows"))
            .and_then(|n| n.as_u64())
            .map_or(rows.len(), |n| n as usize);

        Ok(Ack { rows_written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::auth::{ServiceAccountKey, ServiceAccountTokenProvider, StaticToken};
    use axum::{extract::Path, http::HeaderMap, routing::post, Json, Router};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Captured = Arc<Mutex<Vec<(String, String, Value)>>>;

    const TEST_KEY: &str = include_str!("../../tests/fixtures/service_account_key.pem");

    /// Local stand-in for the Sheets API plus its token endpoint.
    ///
    /// Appends fail with 403 when the range is `Locked` and with 401 for the
    /// tokens `expired` and `tok-1` (the first one `/token` hands out).
    async fn spawn_fake_sheets(captured: Captured) -> String {
        let issued = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/token",
                post(move || {
                    let n = issued.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        Json(json!({ "access_token": format!("tok-{}", n), "expires_in": 3600 }))
                    }
                }),
            )
            .route(
                "/v4/spreadsheets/:id/values/:range",
                post(
                    move |Path((id, range)): Path<(String, String)>,
                          headers: HeaderMap,
                          Json(body): Json<Value>| {
                        let captured = captured.clone();
                        async move {
                            let auth = headers
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string();
                            let rows = body["values"].as_array().map_or(0, Vec::len);
                            captured
                                .lock()
                                .unwrap()
                                .push((format!("{}/{}", id, range), auth.clone(), body));
                            if auth == "Bearer expired" || auth == "Bearer tok-1" {
                                return (
                                    axum::http::StatusCode::UNAUTHORIZED,
                                    Json(json!({"error": {"message": "Request had invalid authentication credentials."}})),
                                );
                            }
                            if range.starts_with("Locked") {
                                return (
                                    axum::http::StatusCode::FORBIDDEN,
                                    Json(json!({"error": {"message": "sheet is protected"}})),
                                );
                            }
                            (
                                axum::http::StatusCode::OK,
                                Json(json!({"updates": {"updatedRows": rows}})),
                            )
                        }
                    },
                ),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn row(item_number: usize) -> Row {
        Row {
            contact: "a@b.co".to_string(),
            section_id: "pairs".to_string(),
            item_number,
            media: vec!["x.wav".to_string(), "y.wav".to_string()],
            answers: vec![("same".to_string(), "Yes".to_string())],
        }
    }

    fn sink(base_url: &str, range: &str) -> SheetsSink {
        SheetsSink::new(
            "sheet-id".to_string(),
            range.to_string(),
            Arc::new(StaticToken::new("token-123")),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(base_url)
    }

    #[test]
    fn test_append_url() {
        let url = sink("https://sheets.googleapis.com", "Sheet1").append_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/Sheet1:append\
             ?valueInputOption=RAW&insertDataOption=INSERT_ROWS"
        );
    }

    #[tokio::test]
    async fn test_batch_sent_in_one_request() {
        let captured = Captured::default();
        let base_url = spawn_fake_sheets(captured.clone()).await;

        let ack = sink(&base_url, "Sheet1")
            .append_rows(&[row(1), row(2)])
            .await
            .unwrap();
        assert_eq!(ack.rows_written, 2);

        let requests = captured.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (path, auth, body) = &requests[0];
        assert_eq!(path, "sheet-id/Sheet1:append");
        assert_eq!(auth, "Bearer token-123");
        assert_eq!(
            body["values"][1],
            json!(["a@b.co", "pairs", "2", "x.wav", "y.wav", "Yes"])
        );
    }

    #[tokio::test]
    async fn test_refused_append_is_reported() {
        let captured = Captured::default();
        let base_url = spawn_fake_sheets(captured).await;

        let err = sink(&base_url, "Locked")
            .append_rows(&[row(1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Rejected { status: 403, ref message } if message == "sheet is protected"
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let err = sink("http://127.0.0.1:1", "Sheet1")
            .append_rows(&[row(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Http(_)));
    }

    #[tokio::test]
    async fn test_static_token_refused_is_not_retried() {
        let captured = Captured::default();
        let base_url = spawn_fake_sheets(captured.clone()).await;

        let sink = SheetsSink::new(
            "sheet-id".to_string(),
            "Sheet1".to_string(),
            Arc::new(StaticToken::new("expired")),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(&base_url);

        let err = sink.append_rows(&[row(1)]).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Rejected { status: 401, .. }));
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_service_account_token_is_replaced() {
        let captured = Captured::default();
        let base_url = spawn_fake_sheets(captured.clone()).await;

        let key = ServiceAccountKey {
            client_email: "survey@demo.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY.to_string(),
            token_uri: format!("{}/token", base_url),
        };
        let tokens = ServiceAccountTokenProvider::new(key, Duration::from_secs(5)).unwrap();
        let sink = SheetsSink::new(
            "sheet-id".to_string(),
            "Sheet1".to_string(),
            Arc::new(tokens),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(&base_url);

        let ack = sink.append_rows(&[row(1), row(2)]).await.unwrap();
        assert_eq!(ack.rows_written, 2);
        // The replacement token stays cached for later submissions
        sink.append_rows(&[row(3)]).await.unwrap();

        let auths: Vec<String> = captured
            .lock()
            .unwrap()
            .iter()
            .map(|(_, auth, _)| auth.clone())
            .collect();
        assert_eq!(auths, ["Bearer tok-1", "Bearer tok-2", "Bearer tok-2"]);
    }
}

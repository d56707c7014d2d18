//! Session API handlers
//!
//! These handlers are the only writers of session state. Each request locks
//! exactly one session, applies one discrete event and releases it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use slt_common::store::ResponseStore;
use slt_common::{submit, validate, Catalog, SubmissionResult, ValidationResult};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::sessions::SessionHandle;
use crate::AppState;

/// POST /api/sessions response
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

/// GET /api/sessions/:id response
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub contact: String,
    pub answered: usize,
    pub total: usize,
    pub responses: ResponseStore,
}

/// PUT /api/sessions/:id/answers request
#[derive(Debug, Deserialize)]
pub struct SetAnswerRequest {
    pub section_id: String,
    pub item_index: usize,
    /// Omit for single-dimension sections
    #[serde(default)]
    pub dimension: Option<String>,
    pub value: String,
}

/// PUT /api/sessions/:id/contact request
#[derive(Debug, Deserialize)]
pub struct SetContactRequest {
    pub contact: String,
}

/// POST /api/sessions/:id/submit response
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(flatten)]
    pub result: SubmissionResult,
    pub message: String,
}

async fn session_handle(state: &AppState, session_id: Uuid) -> ApiResult<SessionHandle> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", session_id)))
}

/// GET /api/catalog
pub async fn get_catalog(State(state): State<AppState>) -> Json<Catalog> {
    Json(state.catalog.as_ref().clone())
}

/// POST /api/sessions
pub async fn create_session(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let session_id = state.sessions.create(&state.catalog).await.ok_or_else(|| {
        ApiError::ServiceUnavailable("Too many open sessions, please try again later".to_string())
    })?;
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { session_id })))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionSnapshot>> {
    let handle = session_handle(&state, session_id).await?;
    let session = handle.lock().await;

    Ok(Json(SessionSnapshot {
        session_id: session.id,
        created_at: session.created_at,
        contact: session.contact().to_string(),
        answered: session.store().answered_count(),
        total: session.store().slot_count(),
        responses: session.store().clone(),
    }))
}

/// DELETE /api/sessions/:id
///
/// Abandons the session; nothing is persisted.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.sessions.remove(session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Session not found: {}", session_id)))
    }
}

/// PUT /api/sessions/:id/answers
pub async fn set_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SetAnswerRequest>,
) -> ApiResult<StatusCode> {
    let handle = session_handle(&state, session_id).await?;
    let mut session = handle.lock().await;

    session
        .set_raw_answer(
            &state.catalog,
            &request.section_id,
            request.item_index,
            request.dimension.as_deref(),
            &request.value,
        )
        .map_err(|e| {
            tracing::debug!(session_id = %session_id, error = %e, "Answer rejected");
            ApiError::from(e)
        })?;

    tracing::debug!(
        session_id = %session_id,
        section_id = %request.section_id,
        item_index = request.item_index,
        "Answer recorded"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/sessions/:id/contact
pub async fn set_contact(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SetContactRequest>,
) -> ApiResult<StatusCode> {
    let handle = session_handle(&state, session_id).await?;
    handle.lock().await.set_contact(request.contact);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/:id/validation
pub async fn get_validation(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ValidationResult>> {
    let handle = session_handle(&state, session_id).await?;
    let session = handle.lock().await;
    Ok(Json(validate(session.store(), &state.catalog, session.contact())))
}

/// POST /api/sessions/:id/submit
///
/// The session stays locked until the sink has answered, so no answer can
/// change between validation and reset.
pub async fn submit_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let handle = session_handle(&state, session_id).await?;
    let mut session = handle.lock().await;

    let result = submit(&mut *session, &state.catalog, state.sink.as_ref()).await;

    let (status, message) = match &result {
        SubmissionResult::Accepted { .. } => (
            StatusCode::OK,
            "All responses recorded. Thank you.".to_string(),
        ),
        SubmissionResult::Rejected { deficiencies } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!(
                "Please answer all items and enter a valid email to submit ({} problem{}).",
                deficiencies.len(),
                if deficiencies.len() == 1 { "" } else { "s" }
            ),
        ),
        SubmissionResult::PersistenceFailed { .. } => (
            StatusCode::BAD_GATEWAY,
            "Your responses could not be saved. Your answers are preserved and it is safe to submit again."
                .to_string(),
        ),
    };

    Ok((status, Json(SubmitResponse { result, message })))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/catalog", get(get_catalog))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/answers", put(set_answer))
        .route("/api/sessions/:id/contact", put(set_contact))
        .route("/api/sessions/:id/validation", get(get_validation))
        .route("/api/sessions/:id/submit", post(submit_session))
}

//! Media proxy endpoint
//!
//! Serves stimulus audio through the write-once cache. A failed fetch only
//! affects the one player that asked for it.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use slt_common::catalog::ContentRef;

use crate::error::{ApiError, ApiResult};
use crate::media::content_type_for;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    #[serde(rename = "ref")]
    pub reference: String,
}

/// GET /media?ref=<content reference>
///
/// Only references that appear in the catalog are served.
pub async fn get_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> ApiResult<Response> {
    let reference = ContentRef::new(query.reference);

    let known = state
        .catalog
        .sections()
        .iter()
        .flat_map(|s| s.items.iter())
        .any(|item| item.media.contains(&reference));
    if !known {
        return Err(ApiError::NotFound(format!(
            "Media reference not in catalog: {}",
            reference
        )));
    }

    let bytes = state.media.get(&reference).await.map_err(|e| {
        tracing::warn!(reference = %reference, error = %e, "Media retrieval failed");
        ApiError::BadGateway(e.to_string())
    })?;

    Ok((
        [(header::CONTENT_TYPE, content_type_for(&reference))],
        bytes.to_vec(),
    )
        .into_response())
}

pub fn media_routes() -> Router<AppState> {
    Router::new().route("/media", get(get_media))
}

//! slt-survey library - Subjective Listening Test web service
//!
//! Serves the survey page, keeps one in-memory session per participant and
//! forwards complete submissions to the configured row sink.

use axum::Router;
use slt_common::media::MediaFetcher;
use slt_common::sink::RowSink;
use slt_common::Catalog;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod media;
pub mod sessions;
pub mod sinks;

pub use crate::error::{ApiError, ApiResult};

use crate::media::MediaCache;
use crate::sessions::SessionRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Immutable item catalog
    pub catalog: Arc<Catalog>,
    /// Per-participant session state
    pub sessions: SessionRegistry,
    /// Append-only destination for submitted rows
    pub sink: Arc<dyn RowSink>,
    /// Write-once media cache in front of the fetcher
    pub media: MediaCache,
}

impl AppState {
    /// Create new application state
    pub fn new(catalog: Catalog, sink: Arc<dyn RowSink>, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            sessions: SessionRegistry::new(),
            sink,
            media: MediaCache::new(fetcher),
        }
    }

    /// Replace the default session registry
    pub fn with_sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = sessions;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::session_routes())
        .merge(api::media_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Row sink implementations
//!
//! - `sqlite`: local append-only table (default)
//! - `sheets`: Google Sheets `values:append`
//! - `auth`: access tokens for the Sheets sink

pub mod auth;
pub mod sheets;
pub mod sqlite;

pub use sheets::SheetsSink;
pub use sqlite::SqliteSink;

use anyhow::{Context, Result};
use slt_common::config::SinkConfig;
use slt_common::sink::RowSink;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use self::auth::{ServiceAccountKey, ServiceAccountTokenProvider, StaticToken, TokenProvider};

/// Build the sink named by the configuration
pub async fn build_sink(config: &SinkConfig, timeout: Duration) -> Result<Arc<dyn RowSink>> {
    match config {
        SinkConfig::Sqlite { path } => {
            let sink = SqliteSink::open(path).await?;
            info!("Row sink: SQLite at {}", path.display());
            Ok(Arc::new(sink))
        }
        SinkConfig::Sheets {
            spreadsheet_id,
            range,
            credentials_path,
            token_env,
        } => {
            let tokens: Arc<dyn TokenProvider> = match credentials_path {
                Some(path) => {
                    let key = ServiceAccountKey::load(path).with_context(|| {
                        format!("Failed to read service-account key {}", path.display())
                    })?;
                    info!(client_email = %key.client_email, "Sheets sink using service account");
                    Arc::new(ServiceAccountTokenProvider::new(key, timeout)?)
                }
                None => {
                    let token = std::env::var(token_env).with_context(|| {
                        format!(
                            "Sheets sink needs credentials_path or a bearer token in ${}",
                            token_env
                        )
                    })?;
                    warn!("Sheets sink using a fixed bearer token; it will not be refreshed");
                    Arc::new(StaticToken::new(token))
                }
            };
            let sink = SheetsSink::new(spreadsheet_id.clone(), range.clone(), tokens, timeout)
                .context("Failed to create HTTP client for Sheets sink")?;
            info!("Row sink: Google Sheets {} ({})", spreadsheet_id, range);
            Ok(Arc::new(sink))
        }
    }
}

//! Media retrieval port
//!
//! Fetching never touches session state; a failed fetch is reported per item
//! and does not block answering other items.

use crate::catalog::ContentRef;
use async_trait::async_trait;
use thiserror::Error;

/// Per-item retrieval failure
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    /// Transport failure (DNS, connect, timeout, body read)
    #[error("Network error fetching {reference}: {message}")]
    Network { reference: String, message: String },

    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {reference}")]
    Status { reference: String, status: u16 },
}

/// Resolve a content reference to bytes
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, reference: &ContentRef) -> Result<Vec<u8>, RetrievalError>;
}

/// Turn a Google Drive share/preview link into a direct download URL
///
/// Links like `https://drive.google.com/file/d/<id>/preview` become
/// `https://drive.google.com/uc?export=download&id=<id>`. Anything else is
/// returned unchanged.
pub fn resolve_share_link(reference: &str) -> String {
    let Some(start) = reference.find("/d/") else {
        return reference.to_string();
    };
    let file_id: String = reference[start + 3..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if file_id.is_empty() {
        return reference.to_string();
    }
    format!("https://drive.google.com/uc?export=download&id={}", file_id)
}

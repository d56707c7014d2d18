//! Media retrieval over HTTP with a write-once cache
//!
//! Fetch results are keyed by content reference. A reference is fetched at
//! most once successfully; failures are not cached so a later request retries.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use slt_common::catalog::ContentRef;
use slt_common::media::{resolve_share_link, MediaFetcher, RetrievalError};
use slt_common::Catalog;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Fetches media over HTTP(S), resolving Drive share links first
pub struct HttpFetcher {
    http_client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, reference: &ContentRef) -> Result<Vec<u8>, RetrievalError> {
        let url = resolve_share_link(reference.as_str());
        debug!(reference = %reference, url = %url, "Fetching media");

        let network = |e: reqwest::Error| RetrievalError::Network {
            reference: reference.to_string(),
            message: e.to_string(),
        };

        let response = self.http_client.get(&url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Status {
                reference: reference.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(network)?;
        Ok(bytes.to_vec())
    }
}

/// Read-mostly cache of fetched payloads
#[derive(Clone)]
pub struct MediaCache {
    fetcher: Arc<dyn MediaFetcher>,
    entries: Arc<RwLock<HashMap<ContentRef, Arc<Vec<u8>>>>>,
}

impl MediaCache {
    pub fn new(fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            fetcher,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return cached bytes, fetching on first use
    pub async fn get(&self, reference: &ContentRef) -> Result<Arc<Vec<u8>>, RetrievalError> {
        if let Some(bytes) = self.entries.read().await.get(reference) {
            return Ok(Arc::clone(bytes));
        }

        // Fetch without holding the lock; a concurrent fetch of the same
        // reference may race, and the first writer wins.
        let bytes = Arc::new(self.fetcher.fetch(reference).await?);
        let mut entries = self.entries.write().await;
        let cached = entries.entry(reference.clone()).or_insert(bytes);
        Ok(Arc::clone(cached))
    }

    pub async fn contains(&self, reference: &ContentRef) -> bool {
        self.entries.read().await.contains_key(reference)
    }

    /// Fetch every reference concurrently, reporting per-reference outcomes
    pub async fn prefetch<'a, I>(&self, references: I) -> Vec<(ContentRef, Result<(), RetrievalError>)>
    where
        I: IntoIterator<Item = &'a ContentRef>,
    {
        let fetches = references.into_iter().map(|reference| async move {
            let outcome = self.get(reference).await.map(|_| ());
            (reference.clone(), outcome)
        });
        join_all(fetches).await
    }

    /// Warm the cache with every media reference in the catalog
    pub async fn prefetch_catalog(&self, catalog: &Catalog) {
        let mut references: Vec<&ContentRef> = catalog
            .sections()
            .iter()
            .flat_map(|s| s.items.iter())
            .flat_map(|item| item.media.iter())
            .collect();
        references.sort();
        references.dedup();

        let outcomes = self.prefetch(references).await;
        let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
        for (reference, outcome) in &outcomes {
            if let Err(e) = outcome {
                warn!(reference = %reference, error = %e, "Media prefetch failed");
            }
        }
        info!(
            fetched = outcomes.len() - failed,
            failed,
            "Media prefetch complete"
        );
    }
}

/// Guess a content type from the reference's file extension
pub fn content_type_for(reference: &ContentRef) -> &'static str {
    let path = reference.as_str().split(['?', '#']).next().unwrap_or_default();
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        // Drive links carry no extension; the stimuli are WAV
        _ => "audio/wav",
    }
}

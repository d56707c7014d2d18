//! Access tokens for the Google Sheets sink
//!
//! Two providers:
//! - `StaticToken`: a bearer token handed in from the environment, never refreshed
//! - `ServiceAccountTokenProvider`: signs an RS256 JWT with a service-account key
//!   and exchanges it at the key's `token_uri` (OAuth 2.0 JWT bearer grant)
//!
//! Service-account tokens are cached and refreshed shortly before they expire,
//! or immediately after the Sheets API refuses one.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use slt_common::sink::PersistenceError;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// OAuth scope for reading and writing spreadsheets
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Lifetime requested for the signed assertion (Google's maximum)
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Tokens closer than this to expiry are refreshed before use
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Source of bearer tokens for the Sheets API
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A token that is valid right now
    async fn access_token(&self) -> Result<String, PersistenceError>;

    /// Forget the current token after the API refused it.
    /// Returns `true` when a fresh one can be obtained.
    async fn invalidate(&self) -> bool;
}

/// Fixed bearer token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, PersistenceError> {
        Ok(self.0.clone())
    }

    async fn invalidate(&self) -> bool {
        false
    }
}

/// Fields of a Google service-account JSON key file that the exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Read a key file downloaded from the cloud console
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    http_client: Client,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    pub fn new(key: ServiceAccountKey, timeout: Duration) -> anyhow::Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            key,
            encoding_key,
            http_client: Client::builder().timeout(timeout).build()?,
            scope: SHEETS_SCOPE.to_string(),
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self) -> Result<String, PersistenceError> {
        #[derive(Debug, Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: u64,
            exp: u64,
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PersistenceError::Http(format!("System clock error: {}", e)))?
            .as_secs();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| PersistenceError::Http(format!("Signing token request failed: {}", e)))
    }

    async fn exchange(&self) -> Result<CachedToken, PersistenceError> {
        #[derive(Debug, Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let assertion = self.sign_assertion()?;
        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PersistenceError::Http(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read token response body".to_string());
            return Err(PersistenceError::Rejected {
                status: status.as_u16(),
                message: format!("Token exchange refused: {}", message),
            });
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| PersistenceError::Http(format!("Invalid token response: {}", e)))?;

        info!(
            client_email = %self.key.client_email,
            expires_in = payload.expires_in,
            "Obtained Sheets access token"
        );
        Ok(CachedToken {
            token: payload.access_token,
            expires_at: Instant::now() + Duration::from_secs(payload.expires_in),
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String, PersistenceError> {
        // Held across the exchange so concurrent submissions share one refresh
        let mut cached = self.cached.lock().await;

        if let Some(current) = cached.as_ref() {
            if current.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(current.token.clone());
            }
            debug!("Sheets access token near expiry, refreshing");
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self) -> bool {
        self.cached.lock().await.take();
        true
    }
}

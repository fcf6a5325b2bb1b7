//! OAuth2 access tokens for the FCM HTTP v1 API.
//!
//! A Google service-account key signs a short-lived JWT assertion which is
//! exchanged at the key's `token_uri` for a bearer token. Tokens are cached
//! and reused until shortly before they expire.

use super::ProviderError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a key given either inline as JSON or as a path to a JSON file.
    pub fn load(raw: &str) -> Result<Self, ProviderError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProviderError::Configuration(
                "FCM service account key not configured".to_string(),
            ));
        }

        let json = if raw.starts_with('{') {
            raw.to_string()
        } else {
            std::fs::read_to_string(raw).map_err(|e| {
                ProviderError::Configuration(format!(
                    "Failed to read service account key file {}: {}",
                    raw, e
                ))
            })?
        };

        serde_json::from_str(&json).map_err(|e| {
            ProviderError::Configuration(format!("Invalid service account key: {}", e))
        })
    }
}

pub enum TokenSource {
    ServiceAccount(ServiceAccountKey),
    /// Fixed bearer token, for emulators and tests.
    Static(String),
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

pub struct AccessTokens {
    source: TokenSource,
    client: Client,
    cached: RwLock<Option<CachedToken>>,
}

impl AccessTokens {
    pub fn new(source: TokenSource, client: Client) -> Self {
        Self {
            source,
            client,
            cached: RwLock::new(None),
        }
    }

    pub async fn bearer(&self) -> Result<String, ProviderError> {
        let key = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(key) => key,
        };

        if let Some(token) = self.cached.read().await.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.exchange(key).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<CachedToken, ProviderError> {
        let now = Utc::now();
        let assertion = sign_assertion(key, now)?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| {
                ProviderError::Connection(format!("Failed to reach token endpoint: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Authentication(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ProviderError::Authentication(format!("Failed to parse token response: {}", e))
        })?;

        tracing::debug!(
            client_email = %key.client_email,
            expires_in = token.expires_in,
            "Obtained FCM access token"
        );

        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, ProviderError> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: FCM_SCOPE,
        aud: &key.token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        ProviderError::Configuration(format!("Invalid service account private key: {}", e))
    })?;

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| ProviderError::Authentication(format!("Failed to sign assertion: {}", e)))
}

use super::credentials::{AccessTokens, ServiceAccountKey, TokenSource};
use super::{ProviderError, ProviderResponse, PushMessage, PushProvider};
use crate::config::FcmConfig;
use crate::services::metrics::record_provider_call;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const FCM_API_URL: &str = "https://fcm.googleapis.com/v1/projects";

pub struct FcmProvider {
    project_id: String,
    api_base: String,
    enabled: bool,
    client: Client,
    tokens: AccessTokens,
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
    data: &'a HashMap<String, String>,
    android: FcmAndroidConfig,
    apns: FcmApnsConfig,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct FcmAndroidConfig {
    priority: &'static str,
}

#[derive(Debug, Serialize)]
struct FcmApnsConfig {
    headers: HashMap<&'static str, &'static str>,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    error: FcmError,
}

#[derive(Debug, Deserialize)]
struct FcmError {
    message: String,
    #[serde(default)]
    status: String,
}

impl FcmProvider {
    /// Build the provider from configuration, loading the service-account key.
    ///
    /// The project id falls back to the one recorded in the key.
    pub fn new(config: &FcmConfig) -> Result<Self, ProviderError> {
        let key = ServiceAccountKey::load(&config.service_account_key)?;
        let project_id = if config.project_id.is_empty() {
            key.project_id.clone().unwrap_or_default()
        } else {
            config.project_id.clone()
        };

        if project_id.is_empty() {
            return Err(ProviderError::Configuration(
                "FCM project_id is not configured".to_string(),
            ));
        }

        let client = Client::new();
        Ok(Self {
            project_id,
            api_base: FCM_API_URL.to_string(),
            enabled: config.enabled,
            tokens: AccessTokens::new(TokenSource::ServiceAccount(key), client.clone()),
            client,
        })
    }

    /// Point the provider at an emulator or stub gateway with a fixed bearer token.
    pub fn with_static_token(
        api_base: impl Into<String>,
        project_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let client = Client::new();
        Self {
            project_id: project_id.into(),
            api_base: api_base.into(),
            enabled: true,
            tokens: AccessTokens::new(TokenSource::Static(token.into()), client.clone()),
            client,
        }
    }

    async fn post_message(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        let access_token = self.tokens.bearer().await?;

        let request = FcmRequest {
            message: FcmMessage {
                token: &push.device_token,
                notification: FcmNotification {
                    title: &push.title,
                    body: &push.body,
                },
                data: &push.data,
                android: FcmAndroidConfig { priority: "high" },
                apns: FcmApnsConfig {
                    headers: HashMap::from([("apns-priority", "10")]),
                },
            },
        };

        let url = format!("{}/{}/messages:send", self.api_base, self.project_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to connect to FCM: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let fcm_response: FcmResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse FCM response: {}", e))
        })?;

        Ok(ProviderResponse::success(fcm_response.name))
    }
}

fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<FcmErrorBody>(body)
        .map(|b| format!("{} ({})", b.error.message, b.error.status))
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::NOT_FOUND => ProviderError::InvalidRecipient(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(detail),
        _ => ProviderError::SendFailed(format!(
            "FCM API returned error status {}: {}",
            status, detail
        )),
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "FCM push provider is not enabled".to_string(),
            ));
        }

        match self.post_message(push).await {
            Ok(response) => {
                record_provider_call(self.name(), "success");
                tracing::info!(
                    provider_id = ?response.provider_id,
                    "Push notification sent successfully via FCM"
                );
                Ok(response)
            }
            Err(e) => {
                record_provider_call(self.name(), "failure");
                Err(e)
            }
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.enabled && self.project_id.is_empty() {
            return Err(ProviderError::Configuration(
                "FCM project_id is not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

/// Mock push provider for testing
pub struct MockPushProvider {
    enabled: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<PushMessage>>,
}

impl MockPushProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    /// Messages accepted so far, in send order.
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PushProvider for MockPushProvider {
    async fn send(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            record_provider_call(self.name(), "failure");
            return Err(ProviderError::NotEnabled(
                "Mock push provider is not enabled".to_string(),
            ));
        }

        let count = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(push.clone());
        }
        record_provider_call(self.name(), "success");

        tracing::info!(
            title = %push.title,
            body = %push.body,
            "[MOCK] Push notification would be sent"
        );

        Ok(ProviderResponse::success(Some(format!("mock-push-{}", count))))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn spawn_gateway(status: StatusCode, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));

        // The v1 path ends in `messages:send`, so match everything.
        let app = Router::new()
            .fallback(
                move |State(captured): State<Captured>,
                      headers: HeaderMap,
                      Json(body): Json<Value>| {
                    let reply = reply.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(|s| s.to_string());
                        captured.lock().unwrap().push((auth, body));
                        (status, Json(reply))
                    }
                },
            )
            .with_state(captured.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (format!("http://{}/projects", addr), captured)
    }

    fn message() -> PushMessage {
        PushMessage {
            device_token: "device-abc".to_string(),
            title: "New hire request".to_string(),
            body: "Sam from Acme wants to connect".to_string(),
            data: HashMap::from([
                ("type".to_string(), "hire_request".to_string()),
                ("requestId".to_string(), "req-1".to_string()),
                ("screen".to_string(), "/hire-requests".to_string()),
            ]),
        }
    }

    #[tokio::test]
    async fn fcm_posts_v1_message_with_bearer_token() {
        let (base, captured) = spawn_gateway(
            StatusCode::OK,
            json!({ "name": "projects/hire-app/messages/0:1" }),
        )
        .await;
        let provider = FcmProvider::with_static_token(base, "hire-app", "test-token");

        let response = provider.send(&message()).await.unwrap();
        assert!(response.success);
        assert_eq!(
            response.provider_id.as_deref(),
            Some("projects/hire-app/messages/0:1")
        );

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let (auth, body) = &captured[0];
        assert_eq!(auth.as_deref(), Some("Bearer test-token"));
        assert_eq!(body["message"]["token"], "device-abc");
        assert_eq!(body["message"]["notification"]["title"], "New hire request");
        assert_eq!(
            body["message"]["notification"]["body"],
            "Sam from Acme wants to connect"
        );
        assert_eq!(body["message"]["data"]["type"], "hire_request");
        assert_eq!(body["message"]["data"]["requestId"], "req-1");
        assert_eq!(body["message"]["data"]["screen"], "/hire-requests");
    }

    #[tokio::test]
    async fn fcm_unregistered_token_is_invalid_recipient() {
        let (base, _) = spawn_gateway(
            StatusCode::NOT_FOUND,
            json!({
                "error": {
                    "code": 404,
                    "message": "Requested entity was not found.",
                    "status": "NOT_FOUND"
                }
            }),
        )
        .await;
        let provider = FcmProvider::with_static_token(base, "hire-app", "test-token");

        let err = provider.send(&message()).await.unwrap_err();
        match err {
            ProviderError::InvalidRecipient(detail) => {
                assert!(detail.contains("NOT_FOUND"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fcm_server_error_is_send_failure() {
        let (base, _) = spawn_gateway(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;
        let provider = FcmProvider::with_static_token(base, "hire-app", "test-token");

        let err = provider.send(&message()).await.unwrap_err();
        assert!(matches!(err, ProviderError::SendFailed(_)));
    }

    #[test]
    fn fcm_new_requires_a_service_account_key() {
        let config = FcmConfig {
            project_id: "hire-app".to_string(),
            service_account_key: String::new(),
            enabled: true,
        };
        assert!(matches!(
            FcmProvider::new(&config),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn mock_records_messages_in_order() {
        let provider = MockPushProvider::new(true);
        provider.send(&message()).await.unwrap();
        let second = provider.send(&message()).await.unwrap();

        assert_eq!(provider.send_count(), 2);
        assert_eq!(second.provider_id.as_deref(), Some("mock-push-2"));
        assert_eq!(provider.sent().len(), 2);
    }

    #[tokio::test]
    async fn disabled_mock_rejects_sends() {
        let provider = MockPushProvider::new(false);
        let err = provider.send(&message()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotEnabled(_)));
        assert_eq!(provider.send_count(), 0);
    }
}

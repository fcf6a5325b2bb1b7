#![allow(dead_code)]

use hire_request_notifier::config::{FcmConfig, MongoConfig, NotifierConfig, TriggerConfig};
use hire_request_notifier::services::{InMemoryUserProfileStore, MockPushProvider};
use hire_request_notifier::startup::{AppState, Application};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn test_config() -> NotifierConfig {
    NotifierConfig {
        // Use random port for testing (port 0)
        common: CoreConfig {
            port: 0,
            log_level: "debug".to_string(),
        },
        mongodb: MongoConfig {
            uri: std::env::var("TEST_MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string()),
            database: "hire_test".to_string(),
            hire_requests_collection: "hireRequests".to_string(),
            users_collection: "users".to_string(),
        },
        fcm: FcmConfig {
            project_id: "test-project".to_string(),
            service_account_key: String::new(),
            enabled: false, // Use mock
        },
        trigger: TriggerConfig {
            change_stream_enabled: false,
        },
        otlp_endpoint: None,
    }
}

pub struct TestApp {
    pub address: String,
    pub profiles: Arc<InMemoryUserProfileStore>,
    pub push: Arc<MockPushProvider>,
    shutdown: CancellationToken,
}

impl TestApp {
    pub async fn spawn(profiles: InMemoryUserProfileStore, push: MockPushProvider) -> Self {
        let profiles = Arc::new(profiles);
        let push = Arc::new(push);
        let state = AppState::new(profiles.clone(), push.clone());

        let app = Application::with_state(&test_config(), state, None)
            .await
            .expect("Failed to build test application");

        let address = format!("http://127.0.0.1:{}", app.port());
        let shutdown = app.shutdown_token();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client.get(format!("{}/ready", address)).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            profiles,
            push,
            shutdown,
        }
    }

    pub async fn post_event(&self, body: serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/v1/events/hire-request-created", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

//! Application startup and lifecycle management.
//!
//! `Application::build` is the once-only initialisation: it opens the
//! MongoDB client, builds the push provider, wires both into the notifier
//! and binds the HTTP listener. `run_until_stopped` then serves HTTP and,
//! when enabled, watches the hire-request collection until shutdown.

use crate::config::NotifierConfig;
use crate::handlers::{health_check, hire_request_created, metrics_endpoint, readiness_check};
use crate::services::{
    EventHandler, FcmProvider, HireDb, HireRequestNotifier, MockPushProvider, PushProvider,
    UserProfileStore,
};
use crate::trigger::ChangeStreamTrigger;
use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn UserProfileStore>,
    pub push_provider: Arc<dyn PushProvider>,
    pub handler: Arc<dyn EventHandler>,
}

impl AppState {
    /// Wire a notifier over the given collaborators.
    pub fn new(profiles: Arc<dyn UserProfileStore>, push_provider: Arc<dyn PushProvider>) -> Self {
        let handler: Arc<dyn EventHandler> = Arc::new(HireRequestNotifier::new(
            profiles.clone(),
            push_provider.clone(),
        ));
        Self {
            profiles,
            push_provider,
            handler,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/v1/events/hire-request-created",
            post(hire_request_created),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_push_provider(config: &NotifierConfig) -> Result<Arc<dyn PushProvider>, AppError> {
    if config.fcm.enabled {
        let provider = FcmProvider::new(&config.fcm).map_err(|e| {
            tracing::error!("Failed to initialize FCM provider: {}", e);
            AppError::ConfigError(anyhow::Error::new(e))
        })?;
        tracing::info!("FCM push provider initialized");
        Ok(Arc::new(provider))
    } else {
        tracing::warn!("FCM provider disabled, using mock push provider; nothing is delivered");
        Ok(Arc::new(MockPushProvider::new(true)))
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    trigger: Option<ChangeStreamTrigger>,
    shutdown: CancellationToken,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: NotifierConfig) -> Result<Self, AppError> {
        let db = HireDb::connect(&config.mongodb).await?;
        let push_provider = build_push_provider(&config)?;

        let state = AppState::new(Arc::new(db.clone()), push_provider);

        let trigger = if config.trigger.change_stream_enabled {
            tracing::info!(
                collection = %db.hire_requests_collection(),
                "Change stream trigger enabled"
            );
            Some(ChangeStreamTrigger::new(
                db.hire_requests(),
                state.handler.clone(),
            ))
        } else {
            tracing::info!("Change stream trigger disabled, HTTP event delivery only");
            None
        };

        Self::with_state(&config, state, trigger).await
    }

    /// Bind the listener around already-built collaborators.
    pub async fn with_state(
        config: &NotifierConfig,
        state: AppState,
        trigger: Option<ChangeStreamTrigger>,
    ) -> Result<Self, AppError> {
        // Port 0 picks a random port for tests
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Hire request notifier: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
            trigger,
            shutdown: CancellationToken::new(),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Token that stops the server and the trigger when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the application until stopped.
    ///
    /// A change-stream failure ends the run with an error so the process
    /// supervisor can restart it.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        let http_shutdown = self.shutdown.clone();
        let server = axum::serve(self.listener, router)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await });

        let Some(trigger) = self.trigger else {
            return server.await;
        };

        let shutdown = self.shutdown;
        let trigger_shutdown = shutdown.clone();
        let trigger_run = trigger.run(async move { trigger_shutdown.cancelled().await });

        let (server_result, trigger_result) = tokio::join!(server.into_future(), async move {
            let result = trigger_run.await;
            // Take the HTTP side down with the trigger.
            shutdown.cancel();
            result
        });

        if let Err(e) = trigger_result {
            tracing::error!("Change stream trigger stopped: {}", e);
            return Err(std::io::Error::other(format!("Trigger error: {}", e)));
        }

        server_result
    }
}

//! The hire-request handler: one profile read, at most one push.

use crate::models::{HireRequest, HireRequestEvent};
use crate::services::metrics::record_event;
use crate::services::profiles::UserProfileStore;
use crate::services::providers::{ProviderError, PushMessage, PushProvider};
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const NOTIFICATION_TITLE: &str = "New hire request";
pub const NOTIFICATION_TYPE: &str = "hire_request";
pub const NOTIFICATION_SCREEN: &str = "/hire-requests";

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Invalid hire request {request_id}: {reason}")]
    InvalidPayload { request_id: String, reason: String },

    #[error("Profile lookup failed: {0}")]
    ProfileLookup(#[source] AppError),

    #[error("Push dispatch failed: {0}")]
    Dispatch(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event arrived without a document body.
    MissingPayload,
    /// The recipient has no registered device.
    MissingToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    Sent { provider_id: Option<String> },
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Skipped(SkipReason::MissingPayload) => "missing_payload",
            DispatchOutcome::Skipped(SkipReason::MissingToken) => "missing_token",
            DispatchOutcome::Sent { .. } => "sent",
        }
    }
}

impl From<NotifierError> for AppError {
    fn from(err: NotifierError) -> Self {
        match err {
            NotifierError::InvalidPayload { .. } => AppError::BadRequest(anyhow::Error::new(err)),
            NotifierError::ProfileLookup(_) | NotifierError::Dispatch(_) => {
                AppError::BadGateway(err.to_string())
            }
        }
    }
}

/// Callback invoked once per decoded creation event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: HireRequestEvent) -> Result<DispatchOutcome, NotifierError>;
}

/// Notification text for a hire request.
pub fn notification_body(request: &HireRequest) -> String {
    let from_name = request.sender_name();
    match request.sender_company() {
        "" => format!("{} sent you a hire request", from_name),
        company => format!("{} from {} wants to connect", from_name, company),
    }
}

/// Deep-link payload delivered alongside the notification.
pub fn notification_data(request_id: &str) -> HashMap<String, String> {
    HashMap::from([
        ("type".to_string(), NOTIFICATION_TYPE.to_string()),
        ("requestId".to_string(), request_id.to_string()),
        ("screen".to_string(), NOTIFICATION_SCREEN.to_string()),
    ])
}

/// Relays hire-request creations to the recipient's device.
///
/// Holds no state between events, so one instance serves any number of
/// concurrent invocations. There is no dedup: the same event handled twice
/// is dispatched twice.
pub struct HireRequestNotifier {
    profiles: Arc<dyn UserProfileStore>,
    push_provider: Arc<dyn PushProvider>,
}

impl HireRequestNotifier {
    pub fn new(profiles: Arc<dyn UserProfileStore>, push_provider: Arc<dyn PushProvider>) -> Self {
        Self {
            profiles,
            push_provider,
        }
    }

    async fn notify(&self, event: HireRequestEvent) -> Result<DispatchOutcome, NotifierError> {
        let Some(request) = event.data else {
            return Ok(DispatchOutcome::Skipped(SkipReason::MissingPayload));
        };

        let to_user_id = request
            .recipient()
            .ok_or_else(|| NotifierError::InvalidPayload {
                request_id: event.request_id.clone(),
                reason: "toUserId is missing".to_string(),
            })?;

        let profile = self
            .profiles
            .find_profile(to_user_id)
            .await
            .map_err(NotifierError::ProfileLookup)?;

        let Some(token) = profile.as_ref().and_then(|p| p.push_token()) else {
            return Ok(DispatchOutcome::Skipped(SkipReason::MissingToken));
        };

        let message = PushMessage {
            device_token: token.to_string(),
            title: NOTIFICATION_TITLE.to_string(),
            body: notification_body(&request),
            data: notification_data(&event.request_id),
        };

        let response = self.push_provider.send(&message).await?;

        Ok(DispatchOutcome::Sent {
            provider_id: response.provider_id,
        })
    }
}

#[async_trait]
impl EventHandler for HireRequestNotifier {
    #[tracing::instrument(skip(self, event), fields(request_id = %event.request_id))]
    async fn handle(&self, event: HireRequestEvent) -> Result<DispatchOutcome, NotifierError> {
        match self.notify(event).await {
            Ok(outcome) => {
                record_event(outcome.label());
                tracing::info!(outcome = outcome.label(), "Hire request handled");
                Ok(outcome)
            }
            Err(e) => {
                record_event("failed");
                tracing::error!(error = %e, "Hire request notification failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::services::profiles::InMemoryUserProfileStore;
    use crate::services::providers::MockPushProvider;

    struct Harness {
        profiles: Arc<InMemoryUserProfileStore>,
        push: Arc<MockPushProvider>,
        notifier: HireRequestNotifier,
    }

    fn harness(store: InMemoryUserProfileStore, push: MockPushProvider) -> Harness {
        let profiles = Arc::new(store);
        let push = Arc::new(push);
        let notifier = HireRequestNotifier::new(profiles.clone(), push.clone());
        Harness {
            profiles,
            push,
            notifier,
        }
    }

    fn registered() -> InMemoryUserProfileStore {
        InMemoryUserProfileStore::new().with_profile("cand-1", UserProfile::with_token("device-1"))
    }

    fn request(from_name: Option<&str>, from_company: Option<&str>) -> HireRequest {
        HireRequest {
            to_user_id: Some("cand-1".to_string()),
            from_name: from_name.map(str::to_string),
            from_company: from_company.map(str::to_string),
        }
    }

    #[test]
    fn body_names_company_when_present() {
        let body = notification_body(&request(Some("Sam"), Some("Acme")));
        assert_eq!(body, "Sam from Acme wants to connect");
    }

    #[test]
    fn body_without_company() {
        assert_eq!(
            notification_body(&request(Some("Sam"), Some(""))),
            "Sam sent you a hire request"
        );
        assert_eq!(
            notification_body(&request(Some("Sam"), None)),
            "Sam sent you a hire request"
        );
    }

    #[test]
    fn body_defaults_sender_name() {
        assert_eq!(
            notification_body(&request(None, None)),
            "Someone sent you a hire request"
        );
        assert_eq!(
            notification_body(&request(Some(""), Some("Acme"))),
            "Someone from Acme wants to connect"
        );
    }

    #[tokio::test]
    async fn missing_body_touches_nothing() {
        let h = harness(registered(), MockPushProvider::new(true));

        let outcome = h
            .notifier
            .handle(HireRequestEvent::new("req-1", None))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::MissingPayload));
        assert_eq!(h.profiles.lookup_count(), 0);
        assert_eq!(h.push.send_count(), 0);
    }

    #[tokio::test]
    async fn recipient_without_token_gets_nothing() {
        let store = InMemoryUserProfileStore::new().with_profile("cand-1", UserProfile::default());
        let h = harness(store, MockPushProvider::new(true));

        let outcome = h
            .notifier
            .handle(HireRequestEvent::new("req-1", Some(request(Some("Sam"), None))))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::MissingToken));
        assert_eq!(h.profiles.lookup_count(), 1);
        assert_eq!(h.push.send_count(), 0);
    }

    #[tokio::test]
    async fn unknown_recipient_is_treated_as_unregistered() {
        let h = harness(InMemoryUserProfileStore::new(), MockPushProvider::new(true));

        let outcome = h
            .notifier
            .handle(HireRequestEvent::new("req-1", Some(request(Some("Sam"), None))))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::MissingToken));
        assert_eq!(h.push.send_count(), 0);
    }

    #[tokio::test]
    async fn registered_recipient_gets_exactly_one_push() {
        let h = harness(registered(), MockPushProvider::new(true));

        let outcome = h
            .notifier
            .handle(HireRequestEvent::new(
                "req-77",
                Some(request(Some("Sam"), Some("Acme"))),
            ))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                provider_id: Some("mock-push-1".to_string())
            }
        );

        let sent = h.push.sent();
        assert_eq!(sent.len(), 1);
        let message = &sent[0];
        assert_eq!(message.device_token, "device-1");
        assert_eq!(message.title, "New hire request");
        assert_eq!(message.body, "Sam from Acme wants to connect");
        assert_eq!(message.data["type"], "hire_request");
        assert_eq!(message.data["requestId"], "req-77");
        assert_eq!(message.data["screen"], "/hire-requests");
        assert_eq!(message.data.len(), 3);
    }

    #[tokio::test]
    async fn same_event_twice_dispatches_twice() {
        let h = harness(registered(), MockPushProvider::new(true));
        let event = HireRequestEvent::new("req-1", Some(request(Some("Sam"), None)));

        h.notifier.handle(event.clone()).await.unwrap();
        h.notifier.handle(event).await.unwrap();

        assert_eq!(h.push.send_count(), 2);
    }

    #[tokio::test]
    async fn missing_recipient_is_invalid_payload() {
        let h = harness(registered(), MockPushProvider::new(true));
        let mut body = request(Some("Sam"), None);
        body.to_user_id = None;

        let err = h
            .notifier
            .handle(HireRequestEvent::new("req-1", Some(body)))
            .await
            .unwrap_err();

        assert!(matches!(err, NotifierError::InvalidPayload { .. }));
        assert_eq!(h.profiles.lookup_count(), 0);
        assert_eq!(h.push.send_count(), 0);
    }

    #[tokio::test]
    async fn profile_store_failure_propagates_without_dispatch() {
        let h = harness(registered(), MockPushProvider::new(true));
        h.profiles.set_unavailable(true);

        let err = h
            .notifier
            .handle(HireRequestEvent::new("req-1", Some(request(Some("Sam"), None))))
            .await
            .unwrap_err();

        assert!(matches!(err, NotifierError::ProfileLookup(_)));
        assert_eq!(h.push.send_count(), 0);
    }

    #[tokio::test]
    async fn gateway_failure_propagates() {
        let h = harness(registered(), MockPushProvider::new(false));

        let err = h
            .notifier
            .handle(HireRequestEvent::new("req-1", Some(request(Some("Sam"), None))))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NotifierError::Dispatch(ProviderError::NotEnabled(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_events_are_independent() {
        let h = harness(registered(), MockPushProvider::new(true));
        let notifier = Arc::new(h.notifier);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let notifier = notifier.clone();
                tokio::spawn(async move {
                    notifier
                        .handle(HireRequestEvent::new(
                            format!("req-{}", i),
                            Some(request(Some("Sam"), None)),
                        ))
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut ids: Vec<_> = h
            .push
            .sent()
            .into_iter()
            .map(|m| m.data["requestId"].clone())
            .collect();
        ids.sort();
        assert_eq!(ids.len(), 8);
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}

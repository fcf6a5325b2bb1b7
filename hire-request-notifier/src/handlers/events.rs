use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use crate::models::{HireRequest, HireRequestEvent};
use crate::services::DispatchOutcome;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct EventParams {
    #[serde(rename = "requestId")]
    #[validate(length(min = 1, message = "requestId cannot be empty"))]
    pub request_id: String,
}

/// Creation event as delivered by a push-style trigger platform.
#[derive(Debug, Deserialize, Validate)]
pub struct HireRequestCreatedEvent {
    #[validate(nested)]
    pub params: EventParams,
    /// Null or omitted when the document no longer exists.
    #[serde(default)]
    pub data: Option<HireRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAck {
    pub request_id: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Handle one delivered event. Upstream failures answer 502 so the
/// delivering platform applies its own failure policy.
#[tracing::instrument(skip(state, event), fields(request_id = %event.params.request_id))]
pub async fn hire_request_created(
    State(state): State<AppState>,
    Json(event): Json<HireRequestCreatedEvent>,
) -> Result<Json<EventAck>, AppError> {
    event.validate()?;

    let request_id = event.params.request_id;
    let outcome = state
        .handler
        .handle(HireRequestEvent::new(request_id.clone(), event.data))
        .await?;

    let provider_id = match &outcome {
        DispatchOutcome::Sent { provider_id } => provider_id.clone(),
        DispatchOutcome::Skipped(_) => None,
    };

    Ok(Json(EventAck {
        request_id,
        outcome: outcome.label(),
        provider_id,
    }))
}

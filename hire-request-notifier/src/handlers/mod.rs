//! HTTP handlers for hire-request-notifier.
//!
//! Infrastructure probes plus the push-style event delivery endpoint.

pub mod events;
pub mod health;

pub use events::hire_request_created;
pub use health::{health_check, metrics_endpoint, readiness_check};

//! service-core: shared infrastructure for the notifier services.
pub mod config;
pub mod error;
pub mod observability;

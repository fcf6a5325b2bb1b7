//! Push notifications for newly created hire requests.
//!
//! Each creation event resolves the recipient's device token from their
//! user profile and sends at most one notification through the push
//! gateway. Events reach the notifier either from a MongoDB change stream
//! or over HTTP from a push-style trigger platform.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod trigger;

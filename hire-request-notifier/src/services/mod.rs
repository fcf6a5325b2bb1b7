pub mod database;
pub mod metrics;
pub mod notifier;
pub mod profiles;
pub mod providers;

pub use database::HireDb;
pub use metrics::{get_metrics, init_metrics, record_event, record_provider_call};
pub use notifier::{DispatchOutcome, EventHandler, HireRequestNotifier, NotifierError, SkipReason};
pub use profiles::{InMemoryUserProfileStore, UserProfileStore};
pub use providers::{
    FcmProvider, MockPushProvider, ProviderError, ProviderResponse, PushMessage, PushProvider,
};

use crate::models::UserProfile;
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

/// Keyed, read-only access to user profiles.
#[async_trait]
pub trait UserProfileStore: Send + Sync {
    /// `Ok(None)` when no user exists under `user_id`.
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

/// Profile store held in memory, for tests and local runs without MongoDB.
#[derive(Default)]
pub struct InMemoryUserProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
    lookups: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryUserProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, user_id: impl Into<String>, profile: UserProfile) -> Self {
        self.insert(user_id, profile);
        self
    }

    pub fn insert(&self, user_id: impl Into<String>, profile: UserProfile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(user_id.into(), profile);
        }
    }

    /// Make every subsequent call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "profile store unavailable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UserProfileStore for InMemoryUserProfileStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let profiles = self
            .profiles
            .read()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("profile map poisoned")))?;
        Ok(profiles.get(user_id).cloned())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_inserted_profiles_and_counts_lookups() {
        let store = InMemoryUserProfileStore::new().with_profile("u-1", UserProfile::with_token("t"));

        let found = store.find_profile("u-1").await.unwrap();
        let missing = store.find_profile("u-2").await.unwrap();

        assert_eq!(found, Some(UserProfile::with_token("t")));
        assert_eq!(missing, None);
        assert_eq!(store.lookup_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_fails_lookups_and_health() {
        let store = InMemoryUserProfileStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.find_profile("u-1").await,
            Err(AppError::DatabaseError(_))
        ));
        assert!(store.health_check().await.is_err());
    }
}

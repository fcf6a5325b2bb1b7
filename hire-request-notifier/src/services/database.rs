use crate::config::MongoConfig;
use crate::models::UserProfile;
use crate::services::profiles::UserProfileStore;
use async_trait::async_trait;
use mongodb::{
    bson::{doc, Document},
    Client as MongoClient, Collection, Database,
};
use service_core::error::AppError;

/// Handles onto the document store: the user profiles the notifier reads and
/// the hire-request collection the trigger watches. Nothing here writes.
#[derive(Clone)]
pub struct HireDb {
    client: MongoClient,
    db: Database,
    users_collection: String,
    hire_requests_collection: String,
}

impl HireDb {
    pub async fn connect(config: &MongoConfig) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(&config.uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(&config.database);
        tracing::info!(database = %config.database, "Successfully connected to MongoDB database");
        Ok(Self {
            client,
            db,
            users_collection: config.users_collection.clone(),
            hire_requests_collection: config.hire_requests_collection.clone(),
        })
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    pub fn users(&self) -> Collection<UserProfile> {
        self.db.collection(&self.users_collection)
    }

    /// Raw documents: the trigger decodes bodies itself so a malformed
    /// document fails one event rather than the whole stream.
    pub fn hire_requests(&self) -> Collection<Document> {
        self.db.collection(&self.hire_requests_collection)
    }

    pub fn hire_requests_collection(&self) -> &str {
        &self.hire_requests_collection
    }
}

#[async_trait]
impl UserProfileStore for HireDb {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.users()
            .find_one(doc! { "_id": user_id }, None)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, "Failed to load user profile: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })
    }

    async fn health_check(&self) -> Result<(), AppError> {
        HireDb::health_check(self).await
    }
}

use crate::models::{HireRequest, HireRequestEvent};
use crate::services::notifier::EventHandler;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::change_stream::event::{ChangeStreamEvent, OperationType};
use mongodb::Collection;
use service_core::error::AppError;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Change event carries no document key")]
    MissingDocumentKey,

    #[error("Hire request {request_id} could not be decoded: {source}")]
    Decode {
        request_id: String,
        #[source]
        source: bson::de::Error,
    },
}

/// Request id for a change event: the created document's `_id`.
pub fn request_id_from_key(document_key: Option<&Document>) -> Option<String> {
    let id = document_key?.get("_id")?;
    Some(match id {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.clone().into_relaxed_extjson().to_string(),
    })
}

/// Build the handler's event from the parts of an insert notification.
///
/// A missing full document is not an error: the handler treats it as a
/// request deleted before it could be processed.
pub fn decode_insert(
    document_key: Option<&Document>,
    full_document: Option<Document>,
) -> Result<HireRequestEvent, TriggerError> {
    let request_id = request_id_from_key(document_key).ok_or(TriggerError::MissingDocumentKey)?;

    let data = full_document
        .map(bson::from_document::<HireRequest>)
        .transpose()
        .map_err(|source| TriggerError::Decode {
            request_id: request_id.clone(),
            source,
        })?;

    Ok(HireRequestEvent { request_id, data })
}

/// Watches one collection for inserts and hands each to the handler on its
/// own task. Events are neither ordered nor deduplicated; a failing event is
/// logged by the handler and does not stop the stream.
pub struct ChangeStreamTrigger {
    collection: Collection<Document>,
    handler: Arc<dyn EventHandler>,
}

impl ChangeStreamTrigger {
    pub fn new(collection: Collection<Document>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            collection,
            handler,
        }
    }

    /// Run until `shutdown` resolves or the stream fails, then wait for
    /// in-flight events to finish.
    pub async fn run<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        let pipeline = [doc! { "$match": { "operationType": "insert" } }];
        let mut stream = self.collection.watch(pipeline, None).await.map_err(|e| {
            tracing::error!(
                collection = %self.collection.name(),
                "Failed to open change stream: {}", e
            );
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;

        tracing::info!(
            collection = %self.collection.name(),
            "Watching for created hire requests"
        );

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                change = stream.try_next() => match change {
                    Ok(Some(change)) => self.dispatch(&mut tasks, change),
                    Ok(None) => {
                        break Err(AppError::DatabaseError(anyhow::anyhow!(
                            "change stream closed by server"
                        )));
                    }
                    Err(e) => {
                        tracing::error!("Change stream failed: {}", e);
                        break Err(AppError::DatabaseError(anyhow::anyhow!(e.to_string())));
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Hire request task panicked: {}", e);
                    }
                }
            }
        };

        tracing::info!(in_flight = tasks.len(), "Draining hire request tasks");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Hire request task panicked: {}", e);
            }
        }

        result
    }

    fn dispatch(&self, tasks: &mut JoinSet<()>, change: ChangeStreamEvent<Document>) {
        if !matches!(change.operation_type, OperationType::Insert) {
            tracing::debug!(operation = ?change.operation_type, "Ignoring change event");
            return;
        }

        let event = match decode_insert(change.document_key.as_ref(), change.full_document) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Dropping undecodable hire request event");
                return;
            }
        };

        let handler = self.handler.clone();
        tasks.spawn(async move {
            // Outcome and failure are logged by the handler.
            let _ = handler.handle(event).await;
        });
    }
}

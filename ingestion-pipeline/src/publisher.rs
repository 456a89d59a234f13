use tracing::info;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::index_document::IndexDocument;

/// Publish ingested documents to the search index.
///
/// The batch is applied create-or-replace, so publishing the same file
/// again updates documents in place. Index-side failures surface as
/// `IndexUploadFailed` with the backend's error detail.
pub async fn publish(db: &SurrealDbClient, documents: &[IndexDocument]) -> Result<(), AppError> {
    IndexDocument::upsert_batch(db, documents)
        .await
        .map_err(|e| AppError::IndexUploadFailed(e.to_string()))?;

    info!(documents = documents.len(), "documents published to index");
    Ok(())
}

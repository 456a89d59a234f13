pub mod answer;

use tracing::warn;

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::index_document::IndexDocument;
use common::utils::embedding::EmbeddingProvider;

pub const DEFAULT_TOP_K: usize = 3;

/// Whether a search failure means the index cannot serve knn queries, as
/// opposed to a transient or data error. Covers a missing HNSW index and
/// backends that reject the knn operator outright.
fn is_capability_error(err: &surrealdb::Error) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("index") || message.contains("operator")
}

/// Retrieve context for a question: embed the query, take the `k` nearest
/// documents and join their contents into one context string.
///
/// When the index cannot serve vector queries the lookup degrades to a
/// single text-search pass over document content. Query embedding results
/// are never cached.
pub async fn retrieve(
    db: &SurrealDbClient,
    provider: &EmbeddingProvider,
    question: &str,
    k: usize,
) -> Result<String, AppError> {
    let embedding = provider.embed(question).await?;

    match IndexDocument::vector_search(db, &embedding, k).await {
        Ok(hits) => Ok(join_contents(hits.iter().map(|hit| hit.content.as_str()))),
        Err(e) if is_capability_error(&e) => {
            warn!(error = %e, "vector search unavailable, falling back to text search");
            let hits = IndexDocument::text_search(db, question, k).await?;
            Ok(join_contents(hits.iter().map(|hit| hit.content.as_str())))
        }
        Err(e) => Err(e.into()),
    }
}

fn join_contents<'a>(contents: impl Iterator<Item = &'a str>) -> String {
    contents.collect::<Vec<_>>().join(" ")
}

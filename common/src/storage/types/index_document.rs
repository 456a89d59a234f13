use surrealdb::Error;

use crate::storage::db::SurrealDbClient;
use crate::stored_object;

/// Size of the candidate set the HNSW index examines per knn lookup.
const KNN_EF: usize = 40;

stored_object!(IndexDocument, "document", {
    content: String,
    embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_name: Option<String>
});

/// A document row returned by a knn lookup, with its distance to the query.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredDocument {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub project_name: Option<String>,
    pub distance: f32,
}

#[derive(Serialize)]
struct UpsertRow {
    id: String,
    content: String,
    embedding: Vec<f32>,
    project_name: Option<String>,
}

impl IndexDocument {
    pub fn new(
        id: String,
        content: String,
        embedding: Vec<f32>,
        project_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            content,
            embedding,
            project_name,
        }
    }

    /// Create-or-replace a batch of documents in one round trip.
    ///
    /// Re-ingesting a file overwrites the same ordinal ids rather than
    /// accumulating duplicates.
    pub async fn upsert_batch(db: &SurrealDbClient, docs: &[IndexDocument]) -> Result<(), Error> {
        if docs.is_empty() {
            return Ok(());
        }

        let rows: Vec<UpsertRow> = docs
            .iter()
            .map(|doc| UpsertRow {
                id: doc.id.clone(),
                content: doc.content.clone(),
                embedding: doc.embedding.clone(),
                project_name: doc.project_name.clone(),
            })
            .collect();

        db.query(
            "FOR $row IN $rows {
                UPSERT type::thing('document', $row.id) CONTENT {
                    content: $row.content,
                    embedding: $row.embedding,
                    project_name: $row.project_name,
                    created_at: time::now(),
                    updated_at: time::now()
                };
            };",
        )
        .bind(("rows", rows))
        .await?
        .check()?;

        Ok(())
    }

    /// Nearest-neighbour lookup over the HNSW index, closest first.
    ///
    /// Fails when no matching index exists, which callers treat as the
    /// signal to fall back to plain text search.
    pub async fn vector_search(
        db: &SurrealDbClient,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>, Error> {
        let mut response = db
            .query(format!(
                "SELECT *, vector::distance::knn() AS distance FROM document \
                 WHERE embedding <|{k},{KNN_EF}|> $embedding ORDER BY distance"
            ))
            .bind(("embedding", embedding.to_vec()))
            .await?;

        response.take(0)
    }

    /// Case-insensitive substring match over document content.
    pub async fn text_search(
        db: &SurrealDbClient,
        query: &str,
        k: usize,
    ) -> Result<Vec<IndexDocument>, Error> {
        let mut response = db
            .query(format!(
                "SELECT * FROM document \
                 WHERE string::contains(string::lowercase(content), string::lowercase($query)) \
                 LIMIT {k}"
            ))
            .bind(("query", query.to_owned()))
            .await?;

        response.take(0)
    }

    /// Distinct project names across the index, sorted.
    pub async fn list_project_names(db: &SurrealDbClient) -> Result<Vec<String>, Error> {
        let mut response = db
            .query("SELECT VALUE project_name FROM document WHERE project_name != NONE")
            .await?;

        let names: Vec<String> = response.take(0)?;
        let unique: std::collections::BTreeSet<String> = names.into_iter().collect();
        Ok(unique.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::embedding::EmbeddingProvider;
    use uuid::Uuid;

    async fn test_db() -> SurrealDbClient {
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb")
    }

    fn doc(id: &str, content: &str, embedding: Vec<f32>, project: Option<&str>) -> IndexDocument {
        IndexDocument::new(
            id.to_string(),
            content.to_string(),
            embedding,
            project.map(str::to_owned),
        )
    }

    #[tokio::test]
    async fn upsert_batch_replaces_existing_ordinals() {
        let db = test_db().await;

        let first = vec![doc("0", "original content", vec![1.0, 0.0], None)];
        IndexDocument::upsert_batch(&db, &first)
            .await
            .expect("first upsert");

        let second = vec![doc("0", "replaced content", vec![0.0, 1.0], Some("ProjectX"))];
        IndexDocument::upsert_batch(&db, &second)
            .await
            .expect("second upsert");

        let all = db
            .get_all_stored_items::<IndexDocument>()
            .await
            .expect("fetch all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "replaced content");
        assert_eq!(all[0].project_name.as_deref(), Some("ProjectX"));
    }

    #[tokio::test]
    async fn upsert_batch_with_no_docs_is_a_no_op() {
        let db = test_db().await;
        IndexDocument::upsert_batch(&db, &[])
            .await
            .expect("empty upsert");
        let all = db
            .get_all_stored_items::<IndexDocument>()
            .await
            .expect("fetch all");
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn vector_search_orders_by_distance() {
        let db = test_db().await;
        let provider = EmbeddingProvider::new_hashed(16);
        db.ensure_document_index(16).await.expect("build index");

        let near = provider.embed("quarterly budget").await.expect("embed");
        let far = provider.embed("unrelated topic entirely").await.expect("embed");
        let docs = vec![
            doc("0", "quarterly budget", near.clone(), None),
            doc("1", "unrelated topic entirely", far, None),
        ];
        IndexDocument::upsert_batch(&db, &docs).await.expect("upsert");

        let query = provider.embed("quarterly budget").await.expect("embed");
        let hits = IndexDocument::vector_search(&db, &query, 2)
            .await
            .expect("vector search");

        assert!(!hits.is_empty());
        assert_eq!(hits[0].id, "0");
        assert!(hits[0].distance <= hits.last().map(|h| h.distance).unwrap_or(f32::MAX));
    }

    #[tokio::test]
    async fn vector_search_without_index_errors() {
        let db = test_db().await;
        let docs = vec![doc("0", "anything", vec![1.0, 0.0], None)];
        IndexDocument::upsert_batch(&db, &docs).await.expect("upsert");

        let result = IndexDocument::vector_search(&db, &[1.0, 0.0], 1).await;
        assert!(result.is_err(), "knn without an index should be rejected");
    }

    #[tokio::test]
    async fn text_search_is_case_insensitive() {
        let db = test_db().await;
        let docs = vec![
            doc("0", "ProjectX 42", vec![1.0], Some("ProjectX")),
            doc("1", "other row", vec![0.5], None),
        ];
        IndexDocument::upsert_batch(&db, &docs).await.expect("upsert");

        let hits = IndexDocument::text_search(&db, "projectx", 5)
            .await
            .expect("text search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "0");
    }

    #[tokio::test]
    async fn list_project_names_dedupes_and_sorts() {
        let db = test_db().await;
        let docs = vec![
            doc("0", "a", vec![1.0], Some("Beta")),
            doc("1", "b", vec![1.0], Some("Alpha")),
            doc("2", "c", vec![1.0], Some("Beta")),
            doc("3", "d", vec![1.0], None),
        ];
        IndexDocument::upsert_batch(&db, &docs).await.expect("upsert");

        let names = IndexDocument::list_project_names(&db)
            .await
            .expect("list projects");
        assert_eq!(names, vec!["Alpha".to_string(), "Beta".to_string()]);
    }
}

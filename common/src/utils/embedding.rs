use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Instant,
};

use async_openai::{types::CreateEmbeddingRequestArgs, Client};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{error::AppError, storage::embedding_cache::EmbeddingCache, utils::config::AppConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAI,
    Hashed,
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        Self::OpenAI
    }
}

/// Produces fixed-length embedding vectors for arbitrary text.
///
/// The OpenAI backend talks to a remote embedding endpoint; the hashed
/// backend is a deterministic local bag-of-words projection used for tests
/// and offline runs.
#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
    #[cfg(any(test, feature = "test-utils"))]
    Recording {
        dimension: usize,
        fail_marker: Option<String>,
        calls: Arc<std::sync::atomic::AtomicUsize>,
    },
}

impl EmbeddingProvider {
    pub fn new_openai(
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    ) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            },
        }
    }

    pub fn new_hashed(dimension: usize) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
        }
    }

    /// A hashed backend that counts remote-equivalent calls and can be told
    /// to fail for any text containing `fail_marker`. Returns the provider
    /// together with the shared call counter.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_recording(
        dimension: usize,
        fail_marker: Option<&str>,
    ) -> (Self, Arc<std::sync::atomic::AtomicUsize>) {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        (
            EmbeddingProvider {
                inner: EmbeddingInner::Recording {
                    dimension: dimension.max(1),
                    fail_marker: fail_marker.map(str::to_owned),
                    calls: calls.clone(),
                },
            },
            calls,
        )
    }

    pub fn from_config(
        config: &AppConfig,
        openai_client: Option<Arc<Client<async_openai::config::OpenAIConfig>>>,
    ) -> Result<Self, AppError> {
        match config.embedding_backend {
            EmbeddingBackend::Hashed => {
                Ok(Self::new_hashed(config.embedding_dimensions as usize))
            }
            EmbeddingBackend::OpenAI => {
                let client = openai_client.ok_or_else(|| {
                    AppError::Validation(
                        "openai embedding backend requires an OpenAI client".to_string(),
                    )
                })?;
                Ok(Self::new_openai(
                    client,
                    config.embedding_model.clone(),
                    config.embedding_dimensions,
                ))
            }
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::OpenAI { .. } => "openai",
            EmbeddingInner::Hashed { .. } => "hashed",
            #[cfg(any(test, feature = "test-utils"))]
            EmbeddingInner::Recording { .. } => "recording",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
            EmbeddingInner::Hashed { dimension } => *dimension,
            #[cfg(any(test, feature = "test-utils"))]
            EmbeddingInner::Recording { dimension, .. } => *dimension,
        }
    }

    /// Embed a single text.
    ///
    /// Remote transport or API failures surface as `EmbeddingRequestFailed`;
    /// a response that carries no embedding data is `EmbeddingResponseInvalid`.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            #[cfg(any(test, feature = "test-utils"))]
            EmbeddingInner::Recording {
                dimension,
                fail_marker,
                calls,
            } => {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if let Some(marker) = fail_marker {
                    if text.contains(marker.as_str()) {
                        return Err(AppError::EmbeddingRequestFailed(format!(
                            "simulated failure for text containing '{marker}'"
                        )));
                    }
                }
                Ok(hashed_embedding(text, *dimension))
            }
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input([text])
                    .dimensions(*dimensions)
                    .build()
                    .map_err(|e| AppError::EmbeddingRequestFailed(e.to_string()))?;

                let response = client
                    .embeddings()
                    .create(request)
                    .await
                    .map_err(|e| AppError::EmbeddingRequestFailed(e.to_string()))?;

                response
                    .data
                    .first()
                    .map(|item| item.embedding.clone())
                    .ok_or_else(|| {
                        AppError::EmbeddingResponseInvalid(
                            "no embedding data received from API".to_string(),
                        )
                    })
            }
        }
    }
}

/// Cache-aware embedding: a hit returns the stored vector without touching
/// the remote service or dirtying the cache; a miss calls the provider,
/// records the elapsed time and stores the result under `record_hash`.
pub async fn embed_with_cache(
    provider: &EmbeddingProvider,
    text: &str,
    record_hash: &str,
    cache: &mut EmbeddingCache,
) -> Result<Vec<f32>, AppError> {
    if let Some(hit) = cache.get(record_hash) {
        debug!(record_hash, "embedding cache hit");
        return Ok(hit.clone());
    }

    let started = Instant::now();
    let embedding = provider.embed(text).await?;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        text_len = text.len(),
        "embedding generated"
    );
    cache.insert(record_hash.to_owned(), embedding.clone());
    Ok(embedding)
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    for token in tokens(text) {
        let idx = bucket(&token, dim);
        vector[idx] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}

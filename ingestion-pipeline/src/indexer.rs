use std::path::Path;

use tracing::{error, info};

use common::error::AppError;
use common::storage::embedding_cache::{CacheLocks, EmbeddingCache};
use common::storage::store::StorageManager;
use common::storage::types::index_document::IndexDocument;
use common::utils::embedding::{embed_with_cache, EmbeddingProvider};
use common::utils::hashing::{content_digest, file_digest};

use crate::spreadsheet::{read_spreadsheet, SheetData};

/// Turns a spreadsheet on disk into index documents, one per data row.
///
/// Embeddings are served from the per-file cache where possible; rows whose
/// embedding fails are logged and skipped rather than failing the file.
#[derive(Clone)]
pub struct TabularIngestor {
    storage: StorageManager,
    provider: EmbeddingProvider,
    locks: CacheLocks,
}

impl TabularIngestor {
    pub fn new(storage: StorageManager, provider: EmbeddingProvider) -> Self {
        Self {
            storage,
            provider,
            locks: CacheLocks::new(),
        }
    }

    /// Ingest a spreadsheet file.
    ///
    /// A missing path is `FileNotFound` and a sheet without data rows is
    /// `EmptySource`, both checked before any hashing or embedding work.
    pub async fn ingest(&self, path: &Path) -> Result<Vec<IndexDocument>, AppError> {
        if !path.is_file() {
            return Err(AppError::FileNotFound(path.display().to_string()));
        }

        let sheet = read_spreadsheet(path)?;
        if sheet.rows.is_empty() {
            return Err(AppError::EmptySource(path.display().to_string()));
        }

        let file_hash = file_digest(path)?;
        self.ingest_sheet(&file_hash, &sheet).await
    }

    /// Ingest already-parsed sheet data under the given file hash.
    ///
    /// Holds the per-file-hash lock across the whole cache open, embed and
    /// flush cycle. Document ids are the zero-based row ordinals, so
    /// re-ingesting a file replaces its previous documents.
    pub async fn ingest_sheet(
        &self,
        file_hash: &str,
        sheet: &SheetData,
    ) -> Result<Vec<IndexDocument>, AppError> {
        if sheet.rows.is_empty() {
            return Err(AppError::EmptySource(file_hash.to_owned()));
        }

        let _guard = self.locks.acquire(file_hash).await;
        let mut cache = EmbeddingCache::open(&self.storage, file_hash).await?;

        let project_column = sheet.project_column();
        let mut documents = Vec::with_capacity(sheet.rows.len());
        let mut skipped = 0usize;

        for (ordinal, row) in sheet.rows.iter().enumerate() {
            let content = SheetData::content_string(row);
            let record_hash = content_digest(SheetData::raw_repr(row).as_bytes());

            let embedding =
                match embed_with_cache(&self.provider, &content, &record_hash, &mut cache).await {
                    Ok(embedding) => embedding,
                    Err(e) => {
                        error!(ordinal, error = %e, "embedding failed, skipping row");
                        skipped += 1;
                        continue;
                    }
                };

            let project_name = project_column
                .and_then(|idx| row.get(idx))
                .map(|cell| cell.to_string())
                .filter(|name| !name.is_empty());

            documents.push(IndexDocument::new(
                ordinal.to_string(),
                content,
                embedding,
                project_name,
            ));
        }

        // Successful rows stay cached even when others failed.
        cache.flush(&self.storage).await?;

        if documents.is_empty() {
            return Err(AppError::NoDocumentsProduced(file_hash.to_owned()));
        }

        info!(
            file_hash,
            documents = documents.len(),
            skipped,
            "spreadsheet ingested"
        );
        Ok(documents)
    }
}

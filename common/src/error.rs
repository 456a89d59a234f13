use async_openai::error::OpenAIError;
use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Spreadsheet contains no rows: {0}")]
    EmptySource(String),
    #[error("Corrupt embedding cache for file {file_hash}: {reason}")]
    CorruptCache { file_hash: String, reason: String },
    #[error("Embedding request failed: {0}")]
    EmbeddingRequestFailed(String),
    #[error("Embedding response invalid: {0}")]
    EmbeddingResponseInvalid(String),
    #[error("No documents produced from {0}")]
    NoDocumentsProduced(String),
    #[error("Index upload failed: {0}")]
    IndexUploadFailed(String),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("Chat completion response invalid: {0}")]
    ChatResponseInvalid(String),
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

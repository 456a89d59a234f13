use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

const FILE_READ_CHUNK: usize = 8192;

/// Digest over the full byte content of a file, read in fixed-size chunks.
///
/// Two uploads with identical bytes produce the same digest regardless of
/// filename, which is what scopes the embedding cache to file content.
pub fn file_digest(path: &Path) -> Result<String, std::io::Error> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; FILE_READ_CHUNK];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest over an in-memory byte slice, lowercase hex.
///
/// Record keys hash the raw-value representation of a row, not the
/// space-joined content string handed to the embedder. Identical raw rows
/// therefore share one cache entry even if content formatting changes.
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

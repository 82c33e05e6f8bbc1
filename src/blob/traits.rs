//! Trait abstraction for binary file storage

use anyhow::Result;
use async_trait::async_trait;

/// A file received with a stage upsert
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Multipart part name it arrived under
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A file read back from storage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Blob storage reached through an injected client.
///
/// `put` returns a stable reference that stage documents store as their
/// `documentUrl` / `formFileUrl` / `fileUrl`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a file and return its reference
    async fn put(&self, file: &UploadedFile) -> Result<String>;

    /// Load a file by reference
    async fn get(&self, id: &str) -> Result<Option<StoredBlob>>;

    /// Delete a file by reference
    async fn delete(&self, id: &str) -> Result<()>;
}

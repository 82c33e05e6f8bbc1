//! Blob storage for uploaded stage documents

pub mod gridfs;
pub mod traits;

pub use gridfs::GridFsBlobStore;
pub use traits::{BlobStore, StoredBlob, UploadedFile};

#[cfg(test)]
pub(crate) mod mock;

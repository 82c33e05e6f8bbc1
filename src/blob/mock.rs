//! In-memory mock implementation of BlobStore for testing.

use super::traits::{BlobStore, StoredBlob, UploadedFile};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory blob store with failure injection.
///
/// `fail_after(n)` lets the first `n` puts succeed and fails the rest, which
/// is how partial multi-file uploads are exercised.
pub struct MockBlobStore {
    pub blobs: RwLock<HashMap<String, StoredBlob>>,
    next_id: AtomicU64,
    fail_puts: AtomicBool,
    puts_before_failure: AtomicUsize,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_puts: AtomicBool::new(false),
            puts_before_failure: AtomicUsize::new(0),
        }
    }

    /// Fail every put from now on
    pub fn fail_puts(&self, fail: bool) {
        self.puts_before_failure.store(0, Ordering::SeqCst);
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Let `n` more puts succeed, then fail
    pub fn fail_after(&self, n: usize) {
        self.puts_before_failure.store(n, Ordering::SeqCst);
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub async fn count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, file: &UploadedFile) -> Result<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            let remaining = self.puts_before_failure.load(Ordering::SeqCst);
            if remaining == 0 {
                bail!("mock blob store unavailable");
            }
            self.puts_before_failure
                .store(remaining - 1, Ordering::SeqCst);
        }
        let id = format!("{:024x}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.blobs.write().await.insert(
            id.clone(),
            StoredBlob {
                id: id.clone(),
                filename: file.filename.clone(),
                content_type: file.content_type.clone(),
                bytes: file.bytes.clone(),
            },
        );
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredBlob>> {
        Ok(self.blobs.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.blobs.write().await.remove(id);
        Ok(())
    }
}

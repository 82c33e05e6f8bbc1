//! GridFS-backed blob store

use super::traits::{BlobStore, StoredBlob, UploadedFile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson};
use futures::{AsyncReadExt, AsyncWriteExt};
use mongodb::gridfs::{GridFsBucket, GridFsUploadStream};
use mongodb::options::GridFsBucketOptions;
use mongodb::Database;
use tracing::{debug, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Stores uploads in a GridFS bucket; references are the file ObjectId hex
#[derive(Clone)]
pub struct GridFsBlobStore {
    bucket: GridFsBucket,
}

impl GridFsBlobStore {
    pub fn new(db: &Database, bucket_name: &str) -> Self {
        let options = GridFsBucketOptions::builder()
            .bucket_name(bucket_name.to_string())
            .build();
        Self {
            bucket: db.gridfs_bucket(options),
        }
    }
}

fn parse_file_id(id: &str) -> Option<Bson> {
    ObjectId::parse_str(id).ok().map(Bson::ObjectId)
}

/// The steps of a GridFS upload that can fail after chunks hit the bucket
#[async_trait]
trait UploadSink: Send {
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
    async fn finish(&mut self) -> Result<()>;
    async fn abort(&mut self) -> Result<()>;
}

#[async_trait]
impl UploadSink for GridFsUploadStream {
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)
            .await
            .context("Failed to write GridFS chunks")
    }

    async fn finish(&mut self) -> Result<()> {
        self.close()
            .await
            .context("Failed to finalize GridFS upload")
    }

    async fn abort(&mut self) -> Result<()> {
        GridFsUploadStream::abort(self)
            .await
            .context("Failed to abort GridFS upload")
    }
}

/// Write and finalize an upload; on failure abort it so no partial chunks stay behind
async fn write_or_abort<S: UploadSink>(sink: &mut S, bytes: &[u8], filename: &str) -> Result<()> {
    let written = match sink.write_bytes(bytes).await {
        Ok(()) => sink.finish().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(abort_err) = sink.abort().await {
            warn!(filename = %filename, error = %abort_err, "Failed to abort GridFS upload");
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl BlobStore for GridFsBlobStore {
    async fn put(&self, file: &UploadedFile) -> Result<String> {
        let mut stream = self
            .bucket
            .open_upload_stream(&file.filename)
            .metadata(doc! {
                "contentType": file.content_type.as_str(),
                "field": file.field.as_str(),
            })
            .await
            .context("Failed to open GridFS upload stream")?;

        write_or_abort(&mut stream, &file.bytes, &file.filename).await?;

        let id = match stream.id() {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        };
        debug!(file_id = %id, filename = %file.filename, bytes = file.bytes.len(), "Stored upload");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredBlob>> {
        let Some(file_id) = parse_file_id(id) else {
            return Ok(None);
        };
        let Some(meta) = self
            .bucket
            .find_one(doc! { "_id": file_id.clone() })
            .await
            .context("Failed to look up GridFS file")?
        else {
            return Ok(None);
        };

        let mut bytes = Vec::with_capacity(meta.length as usize);
        let mut stream = self
            .bucket
            .open_download_stream(file_id)
            .await
            .context("Failed to open GridFS download stream")?;
        stream
            .read_to_end(&mut bytes)
            .await
            .context("Failed to read GridFS chunks")?;

        let content_type = meta
            .metadata
            .as_ref()
            .and_then(|m| m.get_str("contentType").ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        Ok(Some(StoredBlob {
            id: id.to_string(),
            filename: meta.filename.unwrap_or_else(|| id.to_string()),
            content_type,
            bytes,
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let Some(file_id) = parse_file_id(id) else {
            return Ok(());
        };
        self.bucket
            .delete(file_id)
            .await
            .with_context(|| format!("Failed to delete GridFS file {}", id))
    }
}

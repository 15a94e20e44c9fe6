//! Blob publishing onto object storage.
//!
//! Content is written once per key; keys are derived from the post slug so a retried
//! publish overwrites the same object instead of creating a new one.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::web::error::AppError;

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

pub const HTML_CONTENT_TYPE: &str = "text/html";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Invalid storage configuration: {0}")]
    InvalidConfiguration(String),
}

/// Write side of an object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `body` under `key` and returns the object's location.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String, StorageError>;
}

/// Which object store backs the blob publisher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BlobStoreConfig {
    Local { root: PathBuf },
    Memory,
    S3 { bucket: String },
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        BlobStoreConfig::Local {
            root: PathBuf::from("data/blobs"),
        }
    }
}

/// Builds the configured store.
pub async fn build_store(config: &BlobStoreConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config {
        BlobStoreConfig::Local { root } => Ok(Arc::new(LocalObjectStore::create(root.clone()).await?)),
        BlobStoreConfig::Memory => Ok(Arc::new(MemoryObjectStore::new())),
        #[cfg(feature = "s3")]
        BlobStoreConfig::S3 { bucket } => Ok(Arc::new(s3::S3ObjectStore::from_env(bucket.clone()).await)),
        #[cfg(not(feature = "s3"))]
        BlobStoreConfig::S3 { .. } => Err(StorageError::InvalidConfiguration(
            "the s3 backend requires building with the `s3` feature".to_string(),
        )),
    }
}

/// Rejects keys that could escape a store's namespace.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Writes rendered posts to object storage under deterministic keys.
#[derive(Clone)]
pub struct BlobPublisher {
    store: Arc<dyn ObjectStore>,
}

impl BlobPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Storage key for a post slug.
    pub fn post_key(slug: &str) -> String {
        format!("posts/{slug}.html")
    }

    /// Uploads the post's HTML and returns where it landed.
    pub async fn publish_post(&self, slug: &str, html: &str) -> Result<String, AppError> {
        let key = Self::post_key(slug);
        let location = self
            .store
            .put(&key, html.as_bytes().to_vec(), HTML_CONTENT_TYPE)
            .await?;
        info!(key = %key, location = %location, "Uploaded post blob.");
        Ok(location)
    }
}

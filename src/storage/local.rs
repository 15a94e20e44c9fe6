//! Filesystem-backed object store.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::{fs, task};

use super::{ObjectStore, StorageError, validate_key};

/// Stores each object as a file below `root`; locations are `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Creates `root` if needed and anchors the store there.
    pub async fn create(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        let root = fs::canonicalize(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        let path = self.root.join(key);

        let parent = path.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).await?;

        // Each put stages into its own temp file and renames it over the key, so
        // overlapping puts of one key end with one complete body, last rename wins.
        let target = path.clone();
        task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut staging = NamedTempFile::new_in(&parent)?;
            staging.write_all(&body)?;
            staging.as_file().sync_all()?;
            staging.persist(&target).map_err(|e| StorageError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::UploadFailed(format!("{key}: write task failed: {e}")))??;

        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn put_writes_file_and_overwrites_on_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::create(dir.path().join("blobs")).await.unwrap();

        store.put("posts/a.html", b"one".to_vec(), "text/html").await.unwrap();
        let location = store.put("posts/a.html", b"two".to_vec(), "text/html").await.unwrap();

        let path = store.root().join("posts/a.html");
        assert_eq!(location, format!("file://{}", path.display()));
        assert_eq!(fs::read(&path).await.unwrap(), b"two".to_vec());
        let names: Vec<_> = std::fs::read_dir(store.root().join("posts"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["a.html"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_puts_of_one_key_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalObjectStore::create(dir.path().to_path_buf()).await.unwrap());

        for _round in 0..10 {
            let mut writers = JoinSet::new();
            for writer in 0..8u8 {
                let store = Arc::clone(&store);
                writers.spawn(async move {
                    store
                        .put("posts/same.html", vec![writer; 64 * 1024], "text/html")
                        .await
                });
            }
            while let Some(joined) = writers.join_next().await {
                joined.unwrap().unwrap();
            }

            let stored = fs::read(store.root().join("posts/same.html")).await.unwrap();
            assert_eq!(stored.len(), 64 * 1024);
            assert!(stored.iter().all(|b| *b == stored[0]));
        }

        let names: Vec<_> = std::fs::read_dir(store.root().join("posts"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["same.html"]);
    }

    #[tokio::test]
    async fn put_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::create(dir.path().to_path_buf()).await.unwrap();

        let err = store.put("../outside.html", Vec::new(), "text/html").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}

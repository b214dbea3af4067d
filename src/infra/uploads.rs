//! Local blob directory for post images.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use crate::application::posts::{ImageStore, StorageError};

/// Directory (relative to the media root) that receives post images.
pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// Result of storing an upload payload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

/// Filesystem-backed upload storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Write the payload below `directory` and describe the stored file.
    pub async fn store(
        &self,
        directory: &str,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(directory, original_name);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));
        debug!(stored_path = %stored_path, checksum = %checksum, size = data.len(), "stored upload");

        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes: data.len() as u64,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Resolve the absolute filesystem path for a stored upload. Absolute
    /// paths and parent-directory components are rejected.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for UploadStorage {
    async fn store_image(&self, filename: &str, bytes: Bytes) -> Result<String, StorageError> {
        self.store(POST_IMAGE_DIR, filename, bytes)
            .await
            .map(|stored| stored.stored_path)
            .map_err(|err| StorageError::new(err.to_string()))
    }
}

fn build_stored_path(directory: &str, original_name: &str) -> String {
    let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
    let identifier = Uuid::new_v4();
    let filename = sanitize_filename(original_name);
    format!(
        "{directory}/{year}/{:02}/{day:02}/{identifier}-{filename}",
        month as u8
    )
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_reads_back_payload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        let stored = storage
            .store(POST_IMAGE_DIR, "Small Cat.GIF", Bytes::from_static(b"GIF89a"))
            .await
            .expect("store");

        assert!(stored.stored_path.starts_with("posts/"));
        assert!(stored.stored_path.ends_with("-small-cat.gif"));
        assert_eq!(stored.size_bytes, 6);
        assert_eq!(stored.checksum.len(), 64);

        let bytes = storage.read(&stored.stored_path).await.expect("read");
        assert_eq!(bytes.as_ref(), b"GIF89a");
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        let result = storage.store(POST_IMAGE_DIR, "a.gif", Bytes::new()).await;
        assert!(matches!(result, Err(UploadStorageError::EmptyPayload)));
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        for path in ["../secret", "/etc/passwd", "posts/../../x", ""] {
            assert!(
                matches!(
                    storage.read(path).await,
                    Err(UploadStorageError::InvalidPath)
                ),
                "{path}"
            );
        }
    }

    #[test]
    fn filenames_are_slugified() {
        assert_eq!(sanitize_filename("Мой кот.PNG"), format!("{}.png", slugify("Мой кот")));
        assert_eq!(sanitize_filename("..."), "upload");
    }
}

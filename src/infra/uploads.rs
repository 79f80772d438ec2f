//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::domain::uploads::ImageProbe;

/// Stored images live under this directory of the uploads root.
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Path relative to the uploads root, e.g. `posts/2026/10/19/<uuid>-cat.png`.
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

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

    /// Writes an image whose format was already probed. The extension comes
    /// from the probe, never from the client-supplied name.
    pub async fn store_image(
        &self,
        original_name: &str,
        data: &Bytes,
        probe: &ImageProbe,
    ) -> Result<StoredImage, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(original_name, probe.format.extension());
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(data));
        Ok(StoredImage {
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

    /// Remove the stored file. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    pub fn absolute_path(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        self.resolve(stored_path)
    }

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

/// Public URL of a stored image.
pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

fn build_stored_path(original_name: &str, extension: &str) -> String {
    let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
    let identifier = Uuid::new_v4();
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|value| value.to_str())
        .map(slugify)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!(
        "{POST_IMAGE_DIR}/{year}/{:02}/{day:02}/{identifier}-{stem}.{extension}",
        month as u8
    )
}

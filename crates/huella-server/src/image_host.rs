//! Image hosting for report photos.
//!
//! Handlers only see the [`ImageHost`] trait. The shipped [`LocalImageHost`]
//! writes files into the media directory, named by the SHA-256 of their
//! content, and the server exposes that directory under the media URL prefix.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Image hosting errors.
#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Public URL of the image.
    pub url: String,
    /// `false` when identical content was already hosted.
    pub created: bool,
}

/// Uploads image bytes and returns a durable URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn store(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, ImageHostError>;

    /// Remove an image previously returned by [`ImageHost::store`].
    async fn remove(&self, url: &str) -> Result<(), ImageHostError>;
}

/// Content-addressed storage in a local directory.
#[derive(Debug, Clone)]
pub struct LocalImageHost {
    dir: PathBuf,
    url_prefix: String,
}

impl LocalImageHost {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name behind one of our URLs. Anything else yields `None`.
    fn file_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.url_prefix.trim_end_matches('/'))?
            .strip_prefix('/')
            .filter(|name| !name.is_empty() && !name.contains(['/', '\\']) && *name != "..")
    }
}

#[async_trait]
impl ImageHost for LocalImageHost {
    async fn store(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, ImageHostError> {
        let digest = Sha256::digest(bytes);
        let name = format!("{:x}.{}", digest, extension(file_name, content_type));
        let path = self.dir.join(&name);

        let created = !tokio::fs::try_exists(&path).await?;
        if created {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&path, bytes).await?;
            debug!(file = %name, size = bytes.len(), "Stored image");
        }

        Ok(StoredImage {
            url: format!("{}/{}", self.url_prefix.trim_end_matches('/'), name),
            created,
        })
    }

    async fn remove(&self, url: &str) -> Result<(), ImageHostError> {
        let Some(name) = self.file_name(url) else {
            return Ok(());
        };

        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => {
                debug!(file = %name, "Removed image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// File extension from the MIME type, falling back to the upload name.
fn extension(file_name: &str, content_type: &str) -> String {
    let known = match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    };

    if let Some(ext) = known {
        return ext.to_string();
    }

    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "img".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(extension("a.PNG", "image/jpeg"), "jpg");
        assert_eq!(extension("photo.HEIC", "image/heic"), "heic");
        assert_eq!(extension("photo", "image/heic"), "img");
        assert_eq!(extension("x.../", "image/avif"), "img");
    }

    #[test]
    fn test_store_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path().join("media"), "/media/");

        let first = tokio_test::block_on(host.store("a.jpg", "image/jpeg", b"bytes")).unwrap();
        let second = tokio_test::block_on(host.store("b.jpg", "image/jpeg", b"bytes")).unwrap();
        let other = tokio_test::block_on(host.store("c.jpg", "image/jpeg", b"other")).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.url, second.url);
        assert_ne!(first.url, other.url);
        assert!(first.url.starts_with("/media/"));
        assert!(first.url.ends_with(".jpg"));

        let file = first.url.trim_start_matches("/media/");
        assert_eq!(std::fs::read(host.dir().join(file)).unwrap(), b"bytes");
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path(), "/media");

        let stored = tokio_test::block_on(host.store("a.png", "image/png", b"png")).unwrap();
        let file = host.dir().join(stored.url.trim_start_matches("/media/"));
        assert!(file.exists());

        tokio_test::block_on(host.remove(&stored.url)).unwrap();
        assert!(!file.exists());

        // Already gone, or not one of ours
        tokio_test::block_on(host.remove(&stored.url)).unwrap();
        tokio_test::block_on(host.remove("/elsewhere/x.png")).unwrap();
        tokio_test::block_on(host.remove("/media/../secret")).unwrap();
    }
}

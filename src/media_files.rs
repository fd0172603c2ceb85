use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// On-disk storage for uploaded media.
///
/// Files are stored under a configured media directory with randomly
/// generated names so concurrent uploads can never collide and client
/// filenames never reach the filesystem.
pub struct MediaFiles {
    media_dir: PathBuf,
}

impl MediaFiles {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
        }
    }

    /// Create the media directory if it does not exist yet
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .with_context(|| format!("Failed to create media directory {:?}", self.media_dir))?;
        Ok(())
    }

    /// Generate a stored filename for an upload: a random UUID plus the
    /// original extension (sanitized, lowercased). The client-supplied
    /// name is never used beyond its extension.
    pub fn generate_stored_name(original_name: &str) -> Option<String> {
        if original_name.is_empty() {
            return None;
        }

        let id = Uuid::new_v4();
        let name = match Path::new(original_name).extension().and_then(|e| e.to_str()) {
            Some(ext) if !ext.is_empty() => {
                format!("{}.{}", id, sanitize_extension(ext))
            }
            _ => id.to_string(),
        };

        Some(name)
    }

    /// Write upload bytes under a freshly generated name and return the
    /// path, relative to the working directory, for the media row.
    #[instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn store(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let stored_name = Self::generate_stored_name(original_name)
            .context("Upload has no usable filename")?;

        let path = self.media_dir.join(&stored_name);

        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write media file {:?}", path))?;

        debug!(path = %path.display(), "Media file written");

        Ok(path.to_string_lossy().into_owned())
    }

    /// Delete a media file, best effort. A missing file or a filesystem
    /// error is logged as a warning and reported as `false`; store
    /// consistency must not depend on the filesystem cooperating.
    pub async fn remove(&self, path: &str) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path, "Media file deleted");
                true
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to delete media file");
                false
            }
        }
    }

    /// Check whether a media file is present on disk
    pub async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Get the media directory
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }
}

/// Sanitize a filename extension to prevent path traversal
fn sanitize_extension(ext: &str) -> String {
    ext.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Get content type for a file extension
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match ext.as_str() {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_name_preserves_extension() {
        let name = MediaFiles::generate_stored_name("test_image.jpg").unwrap();
        assert!(name.ends_with(".jpg"));
        assert!(!name.contains("test_image"));
    }

    #[test]
    fn test_stored_name_unique_per_call() {
        let a = MediaFiles::generate_stored_name("photo.png").unwrap();
        let b = MediaFiles::generate_stored_name("photo.png").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stored_name_without_extension() {
        let name = MediaFiles::generate_stored_name("README").unwrap();
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_stored_name_rejects_empty() {
        assert!(MediaFiles::generate_stored_name("").is_none());
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("JPG"), "jpg");
        assert_eq!(sanitize_extension("j/p..g"), "jpg");
        assert_eq!(sanitize_extension("png "), "png");
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("a/index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type_for_path(Path::new("x.JPG")), "image/jpeg");
        assert_eq!(content_type_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_store_and_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let files = MediaFiles::new(dir.path());
        files.ensure_dir().await.unwrap();

        let path = files.store("test_image.jpg", b"fake-image-content").await.unwrap();
        assert!(files.exists(&path).await);
        assert!(path.ends_with(".jpg"));

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        assert!(files.remove(&path).await);
        assert!(!files.exists(&path).await);
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let files = MediaFiles::new(dir.path());

        assert!(!files.remove("definitely/not/there.jpg").await);
    }
}

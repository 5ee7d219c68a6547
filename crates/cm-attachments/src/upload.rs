//! Files handed to the documents service

use std::path::Path;

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

/// Payload of an incoming file
#[derive(Debug, Clone)]
pub enum FileContent {
    Bytes(Bytes),
    /// The file could not be read; carries the reason
    Unreadable(String),
}

/// A file offered for attachment
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub content: FileContent,
}

fn guess_mime(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_default()
}

impl UploadedFile {
    /// Wrap in-memory bytes; the MIME type is guessed from the name when
    /// not given.
    pub fn from_bytes(name: impl Into<String>, mime_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        let mime_type = match mime_type {
            Some(mime) => mime.to_string(),
            None => guess_mime(&name),
        };
        Self {
            size: bytes.len() as u64,
            name,
            mime_type,
            content: FileContent::Bytes(bytes),
        }
    }

    /// Read a file from disk.
    ///
    /// Files larger than `max_read` are not read; only their metadata is
    /// kept. Read failures are recorded in the content instead of failing.
    pub async fn from_path(path: impl AsRef<Path>, max_read: u64) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let mime_type = guess_mime(&name);

        let size = match fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot stat file");
                return Self {
                    name,
                    mime_type,
                    size: 0,
                    content: FileContent::Unreadable(e.to_string()),
                };
            }
        };

        if size > max_read {
            debug!(path = %path.display(), size, "Skipping read of oversize file");
            return Self {
                name,
                mime_type,
                size,
                content: FileContent::Bytes(Bytes::new()),
            };
        }

        let content = match fs::read(path).await {
            Ok(data) => FileContent::Bytes(Bytes::from(data)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read file");
                FileContent::Unreadable(e.to_string())
            }
        };

        Self {
            name,
            mime_type,
            size,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_guesses_mime() {
        let file = UploadedFile::from_bytes("pianta.pdf", None, vec![1u8, 2, 3]);
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.size, 3);

        let file = UploadedFile::from_bytes("x", Some("image/png"), Vec::new());
        assert_eq!(file.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rilievo.jpg");
        tokio::fs::write(&path, b"jpeg-bytes").await.unwrap();

        let file = UploadedFile::from_path(&path, 1024).await;
        assert_eq!(file.name, "rilievo.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.size, 10);
        assert!(matches!(file.content, FileContent::Bytes(ref b) if b.as_ref() == b"jpeg-bytes"));
    }

    #[tokio::test]
    async fn test_from_path_missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile::from_path(dir.path().join("missing.pdf"), 1024).await;
        assert!(matches!(file.content, FileContent::Unreadable(_)));
        assert_eq!(file.name, "missing.pdf");
    }
}

//! Turning stored attachments back into files

use std::path::{Path, PathBuf};

use bytes::Bytes;
use cm_models::documents::Attachment;
use tokio::fs;
use tracing::{debug, instrument};

use crate::data_url;
use crate::service::{AttachmentError, AttachmentResult};

/// Where an attachment's content can be found
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    /// Decoded inline payload
    Inline {
        file_name: String,
        mime_type: String,
        bytes: Bytes,
    },
    /// Content lives elsewhere; the URL is handed out as-is
    External { url: String },
}

/// Resolve an attachment's content. An external URL wins over inline data.
pub fn materialize(attachment: &Attachment) -> AttachmentResult<Materialized> {
    if let Some(url) = attachment.url.as_deref().filter(|u| !u.is_empty()) {
        return Ok(Materialized::External {
            url: url.to_string(),
        });
    }

    let data = attachment
        .data
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AttachmentError::NoPayload(attachment.name.clone()))?;
    let (mime, bytes) = data_url::decode(data)?;

    let mime_type = if attachment.mime_type.is_empty() {
        mime
    } else {
        attachment.mime_type.clone()
    };
    Ok(Materialized::Inline {
        file_name: safe_file_name(&attachment.name),
        mime_type,
        bytes: Bytes::from(bytes),
    })
}

/// Strip path separators and control characters from a stored name
fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "documento".to_string()
    } else {
        cleaned
    }
}

/// First free path for `file_name` in `dir`: "a.pdf", "a (1).pdf", ...
async fn free_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if fs::metadata(&candidate).await.is_err() {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
        _ => (file_name.to_string(), String::new()),
    };
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{} ({}){}", stem, n, ext));
        if fs::metadata(&candidate).await.is_err() {
            return candidate;
        }
        n += 1;
    }
}

/// Write an inline payload into `dir` without overwriting existing files.
///
/// Returns the written path.
#[instrument(skip(bytes), fields(size = bytes.len()))]
pub async fn write_to_dir(dir: &Path, file_name: &str, bytes: &Bytes) -> AttachmentResult<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = free_path(dir, &safe_file_name(file_name)).await;
    fs::write(&path, bytes).await?;
    debug!(path = %path.display(), "Document written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_inline() {
        let att = Attachment::inline(
            "../pianta.pdf",
            "application/pdf",
            4,
            data_url::encode("application/pdf", b"%PDF"),
        );
        match materialize(&att).unwrap() {
            Materialized::Inline {
                file_name, bytes, ..
            } => {
                assert_eq!(file_name, "_pianta.pdf");
                assert_eq!(bytes.as_ref(), b"%PDF");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_external_url_returned_as_is() {
        let att = Attachment {
            name: "remoto.pdf".into(),
            url: Some("https://files.example.com/remoto.pdf".into()),
            ..Default::default()
        };
        assert_eq!(
            materialize(&att).unwrap(),
            Materialized::External {
                url: "https://files.example.com/remoto.pdf".into()
            }
        );
    }

    #[test]
    fn test_placeholder_has_no_payload() {
        let att = Attachment::placeholder("x.pdf", "application/pdf", 0, "nota");
        assert!(matches!(materialize(&att), Err(AttachmentError::NoPayload(_))));
    }

    #[tokio::test]
    async fn test_write_to_dir_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = Bytes::from_static(b"abc");

        let first = write_to_dir(dir.path(), "a.pdf", &bytes).await.unwrap();
        let second = write_to_dir(dir.path(), "a.pdf", &bytes).await.unwrap();

        assert_eq!(first.file_name().unwrap(), "a.pdf");
        assert_eq!(second.file_name().unwrap(), "a (1).pdf");
        assert_eq!(tokio::fs::read(&second).await.unwrap(), b"abc");
    }
}

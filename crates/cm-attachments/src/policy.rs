//! Upload acceptance rules

use std::sync::LazyLock;

use cm_core::config::{DocumentsConfig, OversizePolicy};
use regex::Regex;

/// Trailing alphanumeric extension
static EXTENSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.([a-z0-9]+)$").unwrap());

/// Outcome of checking one file against the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Neither extension nor MIME type is on the allow-list
    Unsupported,
    /// Supported type, larger than the ceiling
    Oversize,
}

/// Allowed file types and size ceiling
#[derive(Debug, Clone)]
pub struct DocumentPolicy {
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
    pub oversize: OversizePolicy,
}

impl Default for DocumentPolicy {
    fn default() -> Self {
        Self::from(&DocumentsConfig::default())
    }
}

impl From<&DocumentsConfig> for DocumentPolicy {
    fn from(config: &DocumentsConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            allowed_mime_types: config
                .allowed_mime_types
                .iter()
                .map(|mime| mime.to_lowercase())
                .collect(),
            oversize: config.oversize,
        }
    }
}

/// Lowercase extension of a file name, empty when there is none
pub fn extension_of(name: &str) -> String {
    EXTENSION_PATTERN
        .captures(name.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default()
}

impl DocumentPolicy {
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_oversize(mut self, oversize: OversizePolicy) -> Self {
        self.oversize = oversize;
        self
    }

    /// Extension or MIME type on the allow-list
    pub fn is_supported_type(&self, name: &str, mime_type: &str) -> bool {
        let ext = extension_of(name);
        let mime = mime_type.trim().to_lowercase();
        (!ext.is_empty() && self.allowed_extensions.iter().any(|e| *e == ext))
            || (!mime.is_empty() && self.allowed_mime_types.iter().any(|m| *m == mime))
    }

    pub fn validate(&self, name: &str, mime_type: &str, size: u64) -> Verdict {
        if !self.is_supported_type(name, mime_type) {
            return Verdict::Unsupported;
        }
        if size > self.max_file_size {
            return Verdict::Oversize;
        }
        Verdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Pianta piano terra.PDF"), "pdf");
        assert_eq!(extension_of(" foto.jpeg "), "jpeg");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
    }

    #[test]
    fn test_extension_or_mime_is_enough() {
        let policy = DocumentPolicy::default();
        assert!(policy.is_supported_type("scan.png", ""));
        assert!(policy.is_supported_type("scan", "image/png"));
        assert!(!policy.is_supported_type("offerta.docx", "application/msword"));
    }

    #[test]
    fn test_validate() {
        let policy = DocumentPolicy::default().with_max_file_size(1000);
        assert_eq!(policy.validate("a.pdf", "application/pdf", 1000), Verdict::Accept);
        assert_eq!(policy.validate("a.pdf", "application/pdf", 1001), Verdict::Oversize);
        assert_eq!(policy.validate("a.zip", "application/zip", 10), Verdict::Unsupported);
    }
}

//! Documents service
//!
//! Validates, adds, lists, removes, renames and describes attachments in a
//! documents container.

use cm_core::config::{CategoryConfig, DocumentsConfig, OversizePolicy};
use cm_core::error::CmError;
use cm_models::documents::{Attachment, Documents};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::data_url;
use crate::policy::{extension_of, DocumentPolicy, Verdict};
use crate::upload::{FileContent, UploadedFile};

/// Note stored on entries whose payload could not be read
pub const READ_ERROR_NOTE: &str = "Errore durante la lettura del file.";

const SHORT_NAME_MAX: usize = 26;

/// Service errors
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Unknown document category: {0}")]
    UnknownCategory(String),
    #[error("No document at position {index} in {category} ({len} present)")]
    IndexOutOfRange {
        category: String,
        index: usize,
        len: usize,
    },
    #[error("Document has no payload: {0}")]
    NoPayload(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

impl From<AttachmentError> for CmError {
    fn from(err: AttachmentError) -> Self {
        CmError::Attachment(err.to_string())
    }
}

/// Result of adding a batch of files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOutcome {
    /// Entries appended, placeholders included
    pub added: usize,
    /// Names stored as note-only placeholders
    pub placeholders: Vec<String>,
    /// Names refused
    pub rejected: Vec<String>,
}

impl AddOutcome {
    /// User-facing notice listing refused files
    pub fn rejection_notice(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }
        Some(format!(
            "Unsupported format or file too large:\n{}",
            self.rejected.join("\n")
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
    Other,
}

/// Display summary of one attachment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentSummary {
    pub name: String,
    pub short_name: String,
    /// "PDF", the uppercase extension, or "FILE"
    pub badge: String,
    pub size: Option<u64>,
    pub human_size: String,
    pub mime_type: String,
    pub note: Option<String>,
    pub kind: DocumentKind,
    pub has_payload: bool,
}

/// Attachment operations over one category vocabulary
#[derive(Debug, Clone)]
pub struct DocumentService {
    policy: DocumentPolicy,
    categories: Vec<CategoryConfig>,
}

impl DocumentService {
    pub fn new(policy: DocumentPolicy, categories: Vec<CategoryConfig>) -> Self {
        Self { policy, categories }
    }

    /// Service for work order documents
    pub fn for_work_orders(config: &DocumentsConfig) -> Self {
        Self::new(
            DocumentPolicy::from(config),
            config.work_order_categories.clone(),
        )
    }

    /// Service for furniture item documents
    pub fn for_items(config: &DocumentsConfig) -> Self {
        Self::new(DocumentPolicy::from(config), config.item_categories.clone())
    }

    pub fn policy(&self) -> &DocumentPolicy {
        &self.policy
    }

    pub fn categories(&self) -> &[CategoryConfig] {
        &self.categories
    }

    pub fn category_keys(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.key.as_str())
    }

    pub fn label_of(&self, category: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.key == category)
            .map(|c| c.label.as_str())
    }

    fn check_category(&self, category: &str) -> AttachmentResult<()> {
        if self.label_of(category).is_some() {
            Ok(())
        } else {
            Err(AttachmentError::UnknownCategory(category.to_string()))
        }
    }

    /// Make sure every configured category has a list
    pub fn prepare(&self, documents: &mut Documents) {
        documents.ensure_categories(self.category_keys());
    }

    pub fn validate(&self, name: &str, mime_type: &str, size: u64) -> Verdict {
        self.policy.validate(name, mime_type, size)
    }

    /// Append files to a category in input order.
    ///
    /// Unsupported files are left out and reported. Oversize files become
    /// note-only entries unless the policy rejects them; unreadable files
    /// become entries carrying [`READ_ERROR_NOTE`].
    #[instrument(skip(self, documents, files), fields(count = files.len()))]
    pub fn add(
        &self,
        documents: &mut Documents,
        category: &str,
        files: Vec<UploadedFile>,
    ) -> AttachmentResult<AddOutcome> {
        self.check_category(category)?;
        let mut outcome = AddOutcome::default();
        let mut accepted = Vec::new();

        for file in files {
            let display_name = if file.name.trim().is_empty() {
                "File senza nome".to_string()
            } else {
                file.name.clone()
            };

            match self.policy.validate(&file.name, &file.mime_type, file.size) {
                Verdict::Unsupported => {
                    debug!(name = %display_name, mime = %file.mime_type, "Rejected unsupported file");
                    outcome.rejected.push(display_name);
                }
                Verdict::Oversize if self.policy.oversize == OversizePolicy::Reject => {
                    debug!(name = %display_name, size = file.size, "Rejected oversize file");
                    outcome.rejected.push(display_name);
                }
                Verdict::Oversize => {
                    accepted.push(Attachment::placeholder(
                        file.name.clone(),
                        file.mime_type.clone(),
                        file.size,
                        oversize_note(file.size, self.policy.max_file_size),
                    ));
                    outcome.placeholders.push(display_name);
                }
                Verdict::Accept => match &file.content {
                    FileContent::Bytes(bytes) => {
                        accepted.push(Attachment::inline(
                            file.name.clone(),
                            file.mime_type.clone(),
                            file.size,
                            data_url::encode(&file.mime_type, bytes),
                        ));
                    }
                    FileContent::Unreadable(reason) => {
                        warn!(name = %display_name, reason = %reason, "Storing read-error placeholder");
                        accepted.push(Attachment::placeholder(
                            file.name.clone(),
                            file.mime_type.clone(),
                            file.size,
                            READ_ERROR_NOTE,
                        ));
                        outcome.placeholders.push(display_name);
                    }
                },
            }
        }

        outcome.added = accepted.len();
        documents.category_mut(category).extend(accepted);

        info!(
            category,
            added = outcome.added,
            rejected = outcome.rejected.len(),
            "Documents added"
        );
        Ok(outcome)
    }

    pub fn list<'a>(
        &self,
        documents: &'a Documents,
        category: &str,
    ) -> AttachmentResult<&'a [Attachment]> {
        self.check_category(category)?;
        Ok(documents.list(category))
    }

    pub fn get<'a>(
        &self,
        documents: &'a Documents,
        category: &str,
        index: usize,
    ) -> AttachmentResult<&'a Attachment> {
        let list = self.list(documents, category)?;
        list.get(index).ok_or_else(|| AttachmentError::IndexOutOfRange {
            category: category.to_string(),
            index,
            len: list.len(),
        })
    }

    /// Remove by position
    pub fn remove(
        &self,
        documents: &mut Documents,
        category: &str,
        index: usize,
    ) -> AttachmentResult<Attachment> {
        self.check_category(category)?;
        let list = documents.category_mut(category);
        if index >= list.len() {
            return Err(AttachmentError::IndexOutOfRange {
                category: category.to_string(),
                index,
                len: list.len(),
            });
        }
        let removed = list.remove(index);
        info!(category, index, name = %removed.name, "Document removed");
        Ok(removed)
    }

    /// Rename by position; a blank name keeps the current one.
    ///
    /// Returns the name in effect afterwards.
    pub fn rename(
        &self,
        documents: &mut Documents,
        category: &str,
        index: usize,
        new_name: &str,
    ) -> AttachmentResult<String> {
        self.check_category(category)?;
        let list = documents.category_mut(category);
        let len = list.len();
        let entry = list
            .get_mut(index)
            .ok_or_else(|| AttachmentError::IndexOutOfRange {
                category: category.to_string(),
                index,
                len,
            })?;

        let trimmed = new_name.trim();
        if !trimmed.is_empty() {
            entry.name = trimmed.to_string();
        } else if entry.name.trim().is_empty() {
            entry.name = "Documento".to_string();
        }
        Ok(entry.name.clone())
    }
}

/// Build the display summary for an attachment
pub fn describe(attachment: &Attachment) -> AttachmentSummary {
    let name = if attachment.name.is_empty() {
        "Documento".to_string()
    } else {
        attachment.name.clone()
    };
    let ext = extension_of(&name);
    let kind = if attachment.is_pdf() || ext == "pdf" {
        DocumentKind::Pdf
    } else if attachment.is_image() || matches!(ext.as_str(), "jpg" | "jpeg" | "png") {
        DocumentKind::Image
    } else {
        DocumentKind::Other
    };
    let badge = match kind {
        DocumentKind::Pdf => "PDF".to_string(),
        _ if !ext.is_empty() => ext.to_uppercase(),
        _ => "FILE".to_string(),
    };

    let size = if attachment.size > 0 {
        Some(attachment.size)
    } else {
        attachment.data.as_deref().and_then(data_url::approximate_size)
    };

    AttachmentSummary {
        short_name: short_name(&name, SHORT_NAME_MAX),
        name,
        badge,
        human_size: size.map(human_size).unwrap_or_else(|| "-".to_string()),
        size,
        mime_type: attachment.mime_type.clone(),
        note: attachment.note.clone(),
        kind,
        has_payload: attachment.has_payload(),
    }
}

/// "512 B", "1.5 KB", "2.0 MB"
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    size /= 1024.0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Truncate a file name to `max` characters, keeping the extension
pub fn short_name(name: &str, max: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max {
        return name.to_string();
    }
    match name.rfind('.') {
        None => {
            let head: String = chars[..max.saturating_sub(1)].iter().collect();
            format!("{}…", head)
        }
        Some(dot) => {
            let ext = &name[dot..];
            let base: Vec<char> = name[..dot].chars().collect();
            let keep = max
                .saturating_sub(ext.chars().count() + 3)
                .min(base.len());
            let head: String = base[..keep].iter().collect();
            format!("{}…{}", head, ext)
        }
    }
}

fn oversize_note(size: u64, limit: u64) -> String {
    format!(
        "File troppo grande ({}, limite {}): contenuto non salvato.",
        human_size(size),
        human_size(limit)
    )
}

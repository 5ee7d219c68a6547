//! Attachment model and the category-keyed documents container

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A file attached to a work order or furniture item
///
/// Payloads are embedded as `data:` URLs; a few legacy entries instead
/// point at an external URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Attachment {
    /// Original filename
    pub name: String,

    /// MIME content type
    #[serde(rename = "type", default)]
    pub mime_type: String,

    /// Size in bytes, exact or approximated from the payload length
    #[serde(default)]
    pub size: u64,

    /// Inline `data:<mime>;base64,<payload>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Storage path of an externally stored copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Attachment {
    pub fn inline(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        data_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            data: Some(data_url.into()),
            ..Default::default()
        }
    }

    /// Entry without payload, carrying only a note
    pub fn placeholder(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        note: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            note: Some(note.into()),
            ..Default::default()
        }
    }

    pub fn has_payload(&self) -> bool {
        self.data.as_deref().is_some_and(|d| !d.is_empty())
            || self.url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }

    /// Lowercase file extension, if the name has one
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        (!ext.is_empty() && ext.len() <= 10).then(|| ext.to_lowercase())
    }
}

/// Attachment lists keyed by category (`rilievi`, `disegni`, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct Documents(BTreeMap<String, Vec<Attachment>>);

impl Documents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container with an empty list for each key
    pub fn with_categories<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut documents = Self::new();
        documents.ensure_categories(keys);
        documents
    }

    pub fn ensure_categories<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.0.entry(key.to_string()).or_default();
        }
    }

    /// Attachments in a category; a missing category is empty
    pub fn list(&self, category: &str) -> &[Attachment] {
        self.0.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn category_mut(&mut self, category: &str) -> &mut Vec<Attachment> {
        self.0.entry(category.to_string()).or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Total number of attachments over all categories
    pub fn count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_serialize_as_plain_map() {
        let mut docs = Documents::with_categories(["rilievi", "disegni"]);
        docs.category_mut("rilievi").push(Attachment::inline(
            "foto.jpg",
            "image/jpeg",
            3,
            "data:image/jpeg;base64,AAAA",
        ));

        let value = serde_json::to_value(&docs).unwrap();
        assert_eq!(value["disegni"], serde_json::json!([]));
        assert_eq!(value["rilievi"][0]["name"], "foto.jpg");
        assert_eq!(value["rilievi"][0]["type"], "image/jpeg");
        assert!(value["rilievi"][0].get("note").is_none());
        assert_eq!(docs.count(), 1);
    }

    #[test]
    fn test_missing_category_lists_empty() {
        let docs = Documents::new();
        assert!(docs.list("ordini").is_empty());
    }

    #[test]
    fn test_attachment_extension_and_kind() {
        let pdf = Attachment::inline("Pianta.PDF", "application/pdf", 10, "data:,");
        assert_eq!(pdf.extension().as_deref(), Some("pdf"));
        assert!(pdf.is_pdf());

        let note = Attachment::placeholder("senza-estensione", "", 0, "Errore");
        assert_eq!(note.extension(), None);
        assert!(!note.has_payload());
    }
}

//! # cm-attachments
//!
//! Document attachments for work orders and furniture items.
//!
//! One [`DocumentService`] handles every documents container; the category
//! vocabulary and the size ceiling are configuration. Files are embedded in
//! the record as `data:` URLs.

pub mod data_url;
pub mod export;
pub mod policy;
pub mod service;
pub mod upload;

pub use export::{materialize, write_to_dir, Materialized};
pub use policy::{DocumentPolicy, Verdict};
pub use service::{
    describe, human_size, short_name, AddOutcome, AttachmentError, AttachmentResult,
    AttachmentSummary, DocumentKind, DocumentService, READ_ERROR_NOTE,
};
pub use upload::{FileContent, UploadedFile};

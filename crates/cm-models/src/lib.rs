//! # cm-models
//!
//! Domain models for Commesse.
//!
//! A [`WorkOrder`] is the persisted root. It owns its invoices, furniture
//! items (which own material orders) and a category-keyed documents
//! container. Field names on the wire keep the historical Italian keys so
//! stored records stay readable by older exports.

pub mod documents;
pub mod furniture;
pub mod invoice;
pub mod material;
pub mod phase;
pub mod progress;
pub mod records;
pub mod work_order;

pub use documents::*;
pub use furniture::*;
pub use invoice::*;
pub use material::*;
pub use phase::*;
pub use progress::*;
pub use records::*;
pub use work_order::*;

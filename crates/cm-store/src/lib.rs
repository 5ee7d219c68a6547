//! # cm-store
//!
//! Persistence for Commesse.
//!
//! Work orders are stored as JSON text in a [`KeyValueStore`]. Two layouts
//! are supported:
//! - sharded: an index blob listing ids per shelf plus one blob per record
//! - monolithic: a single blob holding every record
//!
//! [`migration::upgrade_storage`] brings data written by older releases into
//! the configured layout.

pub mod error;
pub mod kv;
pub mod layout;
pub mod migration;
pub mod repository;

pub use error::{StoreError, StoreResult};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use layout::{MonolithBlob, ShardIndex};
pub use migration::{decode_record, upgrade_record, upgrade_storage, SourceLayout, UpgradeReport};
pub use repository::{
    open_backend, open_repository, MonolithicRepository, ShardedRepository, WorkOrderRepository,
};

//! Core traits shared by models, storage and services

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::result::CmResult;
use crate::types::{RecordId, Shelf};

/// Trait for entities that carry an identifier
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Trait for entities with timestamps (created_at, updated_at)
pub trait Timestamped {
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    /// Mark the entity as modified now
    fn touch(&mut self);
}

/// Base trait for persisted root entities
pub trait Entity:
    Identifiable + Timestamped + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Human-readable type name for error messages
    const TYPE_NAME: &'static str;
}

/// Repository over persisted root entities.
///
/// Every entity sits on exactly one [`Shelf`]; `put` moves it there if it
/// already lives on the other one.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Find by id, returning None if absent or unreadable
    async fn get(&self, id: &str) -> CmResult<Option<T>>;

    /// Ids on a shelf, in display order
    async fn list_ids(&self, shelf: Shelf) -> CmResult<Vec<RecordId>>;

    /// Insert or replace an entity on the given shelf
    async fn put(&self, entity: &T, shelf: Shelf) -> CmResult<()>;

    /// Remove an entity from storage and from its shelf
    async fn delete(&self, id: &str) -> CmResult<()>;

    /// Load every readable entity on a shelf
    async fn load_shelf(&self, shelf: Shelf) -> CmResult<Vec<T>> {
        let mut out = Vec::new();
        for id in self.list_ids(shelf).await? {
            if let Some(entity) = self.get(&id).await? {
                out.push(entity);
            }
        }
        Ok(out)
    }

    /// Which shelf an id lives on, if any
    async fn shelf_of(&self, id: &str) -> CmResult<Option<Shelf>> {
        for shelf in [Shelf::Active, Shelf::Archived] {
            if self.list_ids(shelf).await?.iter().any(|existing| existing == id) {
                return Ok(Some(shelf));
            }
        }
        Ok(None)
    }
}

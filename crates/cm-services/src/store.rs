//! Application store
//!
//! Holds the in-memory record set and is the only writer to the repository.
//! Every mutation runs on a copy of the touched work order; the copy is
//! persisted first and committed to memory only if the write succeeded, so a
//! failed write (quota, I/O) leaves the state untouched. Committed changes are
//! announced to subscribers.

use std::sync::Arc;

use cm_core::error::CmError;
use cm_core::result::CmResult;
use cm_core::traits::{Repository, Timestamped};
use cm_core::types::{RecordId, Shelf};
use cm_models::records::RecordSet;
use cm_models::work_order::WorkOrder;
use cm_store::WorkOrderRepository;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument};

const EVENT_BUFFER_SIZE: usize = 64;

/// Committed change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    Saved { id: RecordId, shelf: Shelf },
    Moved { id: RecordId, shelf: Shelf },
    Removed { id: RecordId },
}

pub struct AppStore {
    state: RwLock<RecordSet>,
    repository: Arc<dyn WorkOrderRepository>,
    events: broadcast::Sender<StoreEvent>,
}

impl AppStore {
    pub fn new(repository: Arc<dyn WorkOrderRepository>, records: RecordSet) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            state: RwLock::new(records),
            repository,
            events,
        }
    }

    /// Load every readable record from the repository
    pub async fn load(repository: Arc<dyn WorkOrderRepository>) -> CmResult<Self> {
        let records = repository.load_all().await?;
        info!(
            active = records.active.len(),
            archived = records.archived.len(),
            "Records loaded"
        );
        Ok(Self::new(repository, records))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn announce(&self, event: StoreEvent) {
        debug!(?event, "Store event");
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Copy of the whole record set
    pub async fn snapshot(&self) -> RecordSet {
        self.state.read().await.clone()
    }

    pub async fn list(&self, shelf: Shelf) -> Vec<WorkOrder> {
        self.state.read().await.shelf(shelf).to_vec()
    }

    /// A work order and the shelf it sits on
    pub async fn get(&self, id: &str) -> CmResult<(WorkOrder, Shelf)> {
        let state = self.state.read().await;
        state
            .find(id)
            .map(|(order, shelf)| (order.clone(), shelf))
            .ok_or_else(|| CmError::not_found("WorkOrder", id))
    }

    /// Add a new work order at the top of the active shelf
    #[instrument(skip(self, order), fields(id = %order.id))]
    pub async fn insert(&self, order: WorkOrder) -> CmResult<WorkOrder> {
        let mut state = self.state.write().await;
        self.repository.put(&order, Shelf::Active).await?;
        state.upsert(order.clone(), Shelf::Active);
        self.announce(StoreEvent::Saved {
            id: order.id.clone(),
            shelf: Shelf::Active,
        });
        Ok(order)
    }

    /// Apply `change` to a copy of the work order, persist, then commit.
    ///
    /// Errors from `change` or from the write leave memory untouched.
    #[instrument(skip(self, change))]
    pub async fn update<F, R>(&self, id: &str, change: F) -> CmResult<R>
    where
        F: FnOnce(&mut WorkOrder) -> CmResult<R> + Send,
        R: Send,
    {
        let mut state = self.state.write().await;
        let (current, shelf) = state
            .find(id)
            .ok_or_else(|| CmError::not_found("WorkOrder", id))?;
        let mut draft = current.clone();

        let output = change(&mut draft)?;
        draft.touch();

        self.repository.put(&draft, shelf).await?;
        state.upsert(draft, shelf);
        self.announce(StoreEvent::Saved {
            id: id.to_string(),
            shelf,
        });
        Ok(output)
    }

    /// Move a work order to `shelf`; no-op when it is already there
    #[instrument(skip(self))]
    pub async fn move_to(&self, id: &str, shelf: Shelf) -> CmResult<WorkOrder> {
        let mut state = self.state.write().await;
        let (current, current_shelf) = state
            .find(id)
            .ok_or_else(|| CmError::not_found("WorkOrder", id))?;
        let order = current.clone();
        if current_shelf == shelf {
            return Ok(order);
        }

        self.repository.put(&order, shelf).await?;
        state.upsert(order.clone(), shelf);
        info!(id, shelf = %shelf, "Work order moved");
        self.announce(StoreEvent::Moved {
            id: id.to_string(),
            shelf,
        });
        Ok(order)
    }

    /// Delete from either shelf
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> CmResult<WorkOrder> {
        let mut state = self.state.write().await;
        if !state.contains(id) {
            return Err(CmError::not_found("WorkOrder", id));
        }
        self.repository.delete(id).await?;
        let (order, _) = state
            .remove(id)
            .ok_or_else(|| CmError::not_found("WorkOrder", id))?;
        info!(id, "Work order deleted");
        self.announce(StoreEvent::Removed { id: id.to_string() });
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_core::config::StorageLayout;
    use cm_store::{open_repository, KeyValueStore, MemoryStore};

    fn memory_store() -> AppStore {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        AppStore::new(open_repository(kv, StorageLayout::Sharded), RecordSet::new())
    }

    #[tokio::test]
    async fn test_insert_update_and_events() {
        let store = memory_store();
        let mut events = store.subscribe();

        let order = store.insert(WorkOrder::new("Cucina")).await.unwrap();
        store
            .update(&order.id, |o| {
                o.note = "misure fatte".into();
                Ok(())
            })
            .await
            .unwrap();

        let (saved, shelf) = store.get(&order.id).await.unwrap();
        assert_eq!(saved.note, "misure fatte");
        assert_eq!(shelf, Shelf::Active);
        assert!(saved.updated_at >= order.updated_at);

        assert!(matches!(events.recv().await.unwrap(), StoreEvent::Saved { .. }));
        assert!(matches!(events.recv().await.unwrap(), StoreEvent::Saved { .. }));
    }

    #[tokio::test]
    async fn test_failed_change_leaves_state() {
        let store = memory_store();
        let order = store.insert(WorkOrder::new("Cucina")).await.unwrap();

        let result: CmResult<()> = store
            .update(&order.id, |o| {
                o.name = "Bagno".into();
                Err(CmError::Internal("boom".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(&order.id).await.unwrap().0.name, "Cucina");
    }

    #[tokio::test]
    async fn test_quota_failure_keeps_memory_and_disk_in_sync() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_quota(2_000));
        let repository = open_repository(kv, StorageLayout::Sharded);
        let store = AppStore::new(repository.clone(), RecordSet::new());
        let order = store.insert(WorkOrder::new("Cucina")).await.unwrap();

        let err = store
            .update(&order.id, |o| {
                o.note = "x".repeat(4_000);
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CmError::QuotaExceeded { .. }));

        assert!(store.get(&order.id).await.unwrap().0.note.is_empty());
        let stored = repository.get(&order.id).await.unwrap().unwrap();
        assert!(stored.note.is_empty());
    }

    #[tokio::test]
    async fn test_archive_restore_delete() {
        let store = memory_store();
        let order = store.insert(WorkOrder::new("Cucina")).await.unwrap();

        store.move_to(&order.id, Shelf::Archived).await.unwrap();
        assert!(store.list(Shelf::Active).await.is_empty());
        assert_eq!(store.get(&order.id).await.unwrap().1, Shelf::Archived);

        store.move_to(&order.id, Shelf::Active).await.unwrap();
        assert_eq!(store.list(Shelf::Active).await.len(), 1);

        store.remove(&order.id).await.unwrap();
        assert!(matches!(
            store.get(&order.id).await,
            Err(CmError::NotFound { .. })
        ));
        assert!(matches!(
            store.remove(&order.id).await,
            Err(CmError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_from_repository() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let repository = open_repository(kv, StorageLayout::Monolithic);
        repository
            .put(&WorkOrder::new("Vecchia"), Shelf::Archived)
            .await
            .unwrap();

        let store = AppStore::load(repository).await.unwrap();
        assert_eq!(store.list(Shelf::Archived).await[0].name, "Vecchia");
    }
}

//! # cm-services
//!
//! Business logic services for Commesse.
//!
//! Every service writes through the shared [`AppStore`], which persists a
//! changed work order before committing it to memory. Services take a params
//! struct, apply it with `set_attributes`, validate the result with a
//! contract and hand it to the store.

pub mod contracts;
pub mod documents;
pub mod furniture;
pub mod invoices;
pub mod orders;
pub mod queries;
pub mod store;
pub mod work_orders;

use std::sync::Arc;

use cm_core::config::AppConfig;
use cm_core::result::CmResult;
use cm_models::progress::ProgressWeights;
use cm_store::{open_backend, open_repository, upgrade_storage, UpgradeReport};
use tracing::info;

pub use contracts::{Contract, ValidationResult};
pub use documents::{DocumentTarget, DocumentsService, Exported, RecordDocuments};
pub use furniture::{FurnitureService, ItemParams};
pub use invoices::{InvoiceParams, InvoiceService};
pub use orders::{LineParams, OrderParams, OrderRef, OrderService};
pub use queries::{board, list_rows, BoardCard, BoardItem, WorkOrderFilter, WorkOrderRow};
pub use store::{AppStore, StoreEvent};
pub use work_orders::{WorkOrderParams, WorkOrderService};

/// Opened storage plus every service wired to it
pub struct Commesse {
    pub store: Arc<AppStore>,
    pub work_orders: WorkOrderService,
    pub invoices: InvoiceService,
    pub furniture: FurnitureService,
    pub orders: OrderService,
    pub documents: DocumentsService,
    pub weights: ProgressWeights,
}

impl Commesse {
    /// Open the configured storage, upgrading older data first
    pub async fn open(config: &AppConfig) -> CmResult<(Self, UpgradeReport)> {
        let kv = open_backend(&config.storage).await?;
        let report = upgrade_storage(kv.clone(), config.storage.layout).await?;

        let repository = open_repository(kv, config.storage.layout);
        let store = Arc::new(AppStore::load(repository).await?);
        info!(data_dir = %config.storage.data_dir.display(), "Commesse ready");
        Ok((Self::with_store(store, config), report))
    }

    pub fn with_store(store: Arc<AppStore>, config: &AppConfig) -> Self {
        let vocabulary = RecordDocuments::new(&config.documents);
        Self {
            work_orders: WorkOrderService::new(store.clone(), vocabulary.clone()),
            invoices: InvoiceService::new(store.clone()),
            furniture: FurnitureService::new(store.clone(), vocabulary),
            orders: OrderService::new(store.clone()),
            documents: DocumentsService::new(store.clone(), &config.documents),
            weights: ProgressWeights::from(&config.progress),
            store,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use cm_core::config::StorageLayout;
    use cm_models::records::RecordSet;
    use cm_store::{open_repository, KeyValueStore, MemoryStore};

    use crate::store::AppStore;

    /// Store over an in-memory sharded repository
    pub fn app_store() -> Arc<AppStore> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        Arc::new(AppStore::new(
            open_repository(kv, StorageLayout::Sharded),
            RecordSet::new(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_core::types::Shelf;
    use cm_store::SourceLayout;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_open_persists_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let (app, report) = Commesse::open(&config).await.unwrap();
        assert_eq!(report.source, SourceLayout::Empty);
        let order = app
            .work_orders
            .create(WorkOrderParams::new().with_name("Cucina Rossi"))
            .await
            .unwrap();
        app.invoices
            .add(&order.id, InvoiceParams::new().with_percentage(Some(30.0)))
            .await
            .unwrap();
        let (saved, _) = app.store.get(&order.id).await.unwrap();
        drop(app);

        let (app, report) = Commesse::open(&config).await.unwrap();
        assert_eq!(report.source, SourceLayout::Current);
        let (reloaded, shelf) = app.store.get(&order.id).await.unwrap();
        assert_eq!(shelf, Shelf::Active);
        assert_eq!(reloaded.name, "Cucina Rossi");
        assert_eq!(reloaded.invoices.len(), 1);
        assert_eq!(reloaded, saved);
    }
}

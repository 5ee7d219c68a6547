//! Work order repositories over a key-value backend

use std::sync::Arc;

use async_trait::async_trait;
use cm_core::config::{StorageConfig, StorageLayout};
use cm_core::result::CmResult;
use cm_core::traits::Repository;
use cm_core::types::{RecordId, Shelf};
use cm_models::records::RecordSet;
use cm_models::work_order::WorkOrder;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::StoreError;
use crate::kv::{FileStore, KeyValueStore};
use crate::layout::{id_to_string, record_key, MonolithBlob, ShardIndex, INDEX_KEY, MONOLITH_KEY};
use crate::migration::decode_record;

/// Whole-set operations on top of [`Repository`]
#[async_trait]
pub trait WorkOrderRepository: Repository<WorkOrder> {
    fn layout(&self) -> StorageLayout;

    /// Load both shelves in display order
    async fn load_all(&self) -> CmResult<RecordSet> {
        let mut records = RecordSet::new();
        for shelf in [Shelf::Active, Shelf::Archived] {
            for order in self.load_shelf(shelf).await? {
                records.append(order, shelf);
            }
        }
        Ok(records)
    }

    /// Overwrite everything stored with `records`
    async fn replace_all(&self, records: &RecordSet) -> CmResult<()>;
}

/// Open the file backend described by the storage section
pub async fn open_backend(config: &StorageConfig) -> CmResult<Arc<dyn KeyValueStore>> {
    let store = FileStore::open(&config.data_dir)
        .await?
        .with_quota(config.quota_bytes);
    Ok(Arc::new(store))
}

pub fn open_repository(
    kv: Arc<dyn KeyValueStore>,
    layout: StorageLayout,
) -> Arc<dyn WorkOrderRepository> {
    match layout {
        StorageLayout::Sharded => Arc::new(ShardedRepository::new(kv)),
        StorageLayout::Monolithic => Arc::new(MonolithicRepository::new(kv)),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> CmResult<String> {
    Ok(serde_json::to_string(value).map_err(StoreError::from)?)
}

// ============================================================================
// Sharded
// ============================================================================

/// Index blob plus one blob per record
pub struct ShardedRepository {
    kv: Arc<dyn KeyValueStore>,
    /// Serializes index read-modify-write cycles
    index_lock: Mutex<()>,
}

impl ShardedRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            index_lock: Mutex::new(()),
        }
    }

    async fn read_index(&self) -> CmResult<ShardIndex> {
        let Some(raw) = self.kv.get(INDEX_KEY).await? else {
            return Ok(ShardIndex::default());
        };
        match serde_json::from_str::<ShardIndex>(&raw) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(error = %e, "Malformed index, treating as empty");
                Ok(ShardIndex::default())
            }
        }
    }

    async fn write_index(&self, index: &ShardIndex) -> CmResult<()> {
        self.kv.set(INDEX_KEY, &to_json(index)?).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository<WorkOrder> for ShardedRepository {
    async fn get(&self, id: &str) -> CmResult<Option<WorkOrder>> {
        let Some(raw) = self.kv.get(&record_key(id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Ok(decode_record(value)),
            Err(e) => {
                warn!(id, error = %e, "Malformed record, skipping");
                Ok(None)
            }
        }
    }

    async fn list_ids(&self, shelf: Shelf) -> CmResult<Vec<RecordId>> {
        Ok(self.read_index().await?.ids(shelf).to_vec())
    }

    #[instrument(skip(self, entity), fields(id = %entity.id, shelf = %shelf))]
    async fn put(&self, entity: &WorkOrder, shelf: Shelf) -> CmResult<()> {
        let _guard = self.index_lock.lock().await;
        let key = record_key(&entity.id);
        let mut index = self.read_index().await?;
        let previous = index.shelf_of(&entity.id);
        self.kv.set(&key, &to_json(entity)?).await?;

        if previous != Some(shelf) {
            index.place(&entity.id, shelf);
            if let Err(e) = self.write_index(&index).await {
                // an unindexed record blob would never be cleaned up
                if previous.is_none() {
                    if let Err(cleanup) = self.kv.remove(&key).await {
                        warn!(error = %cleanup, "Could not remove unindexed record");
                    }
                }
                return Err(e);
            }
        }
        debug!("Work order stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> CmResult<()> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        index.forget(id);
        self.write_index(&index).await?;
        self.kv.remove(&record_key(id)).await?;
        Ok(())
    }

    async fn shelf_of(&self, id: &str) -> CmResult<Option<Shelf>> {
        Ok(self.read_index().await?.shelf_of(id))
    }
}

#[async_trait]
impl WorkOrderRepository for ShardedRepository {
    fn layout(&self) -> StorageLayout {
        StorageLayout::Sharded
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn replace_all(&self, records: &RecordSet) -> CmResult<()> {
        let _guard = self.index_lock.lock().await;
        let previous = self.read_index().await?;

        for shelf in [Shelf::Active, Shelf::Archived] {
            for order in records.shelf(shelf) {
                self.kv.set(&record_key(&order.id), &to_json(order)?).await?;
            }
        }
        let index = ShardIndex {
            active_ids: records.ids(Shelf::Active),
            archived_ids: records.ids(Shelf::Archived),
            ..ShardIndex::default()
        };
        self.write_index(&index).await?;

        for stale in previous
            .active_ids
            .iter()
            .chain(previous.archived_ids.iter())
            .filter(|id| !records.contains(id))
        {
            self.kv.remove(&record_key(stale)).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Monolithic
// ============================================================================

/// Single blob holding both shelves
pub struct MonolithicRepository {
    kv: Arc<dyn KeyValueStore>,
    blob_lock: Mutex<()>,
}

fn value_id(value: &Value) -> Option<String> {
    value.get("id").and_then(id_to_string)
}

impl MonolithicRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            blob_lock: Mutex::new(()),
        }
    }

    async fn read_blob(&self) -> CmResult<MonolithBlob> {
        let Some(raw) = self.kv.get(MONOLITH_KEY).await? else {
            return Ok(MonolithBlob::default());
        };
        match serde_json::from_str::<MonolithBlob>(&raw) {
            Ok(blob) => Ok(blob),
            Err(e) => {
                warn!(error = %e, "Malformed record blob, treating as empty");
                Ok(MonolithBlob::default())
            }
        }
    }

    async fn write_blob(&self, blob: &MonolithBlob) -> CmResult<()> {
        self.kv.set(MONOLITH_KEY, &to_json(blob)?).await?;
        Ok(())
    }
}

fn shelf_values(blob: &MonolithBlob, shelf: Shelf) -> &Vec<Value> {
    match shelf {
        Shelf::Active => &blob.active,
        Shelf::Archived => &blob.archived,
    }
}

fn shelf_values_mut(blob: &mut MonolithBlob, shelf: Shelf) -> &mut Vec<Value> {
    match shelf {
        Shelf::Active => &mut blob.active,
        Shelf::Archived => &mut blob.archived,
    }
}

#[async_trait]
impl Repository<WorkOrder> for MonolithicRepository {
    async fn get(&self, id: &str) -> CmResult<Option<WorkOrder>> {
        let blob = self.read_blob().await?;
        let found = blob
            .active
            .into_iter()
            .chain(blob.archived)
            .find(|value| value_id(value).as_deref() == Some(id));
        Ok(found.and_then(decode_record))
    }

    async fn list_ids(&self, shelf: Shelf) -> CmResult<Vec<RecordId>> {
        let blob = self.read_blob().await?;
        Ok(shelf_values(&blob, shelf).iter().filter_map(value_id).collect())
    }

    #[instrument(skip(self, entity), fields(id = %entity.id, shelf = %shelf))]
    async fn put(&self, entity: &WorkOrder, shelf: Shelf) -> CmResult<()> {
        let _guard = self.blob_lock.lock().await;
        let mut blob = self.read_blob().await?;
        let value = serde_json::to_value(entity).map_err(StoreError::from)?;

        let slot = shelf_values_mut(&mut blob, shelf)
            .iter_mut()
            .find(|v| value_id(v).as_deref() == Some(entity.id.as_str()));
        match slot {
            Some(slot) => *slot = value,
            None => {
                for list in [&mut blob.active, &mut blob.archived] {
                    list.retain(|v| value_id(v).as_deref() != Some(entity.id.as_str()));
                }
                shelf_values_mut(&mut blob, shelf).insert(0, value);
            }
        }
        self.write_blob(&blob).await?;
        debug!("Work order stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> CmResult<()> {
        let _guard = self.blob_lock.lock().await;
        let mut blob = self.read_blob().await?;
        for list in [&mut blob.active, &mut blob.archived] {
            list.retain(|v| value_id(v).as_deref() != Some(id));
        }
        self.write_blob(&blob).await
    }
}

#[async_trait]
impl WorkOrderRepository for MonolithicRepository {
    fn layout(&self) -> StorageLayout {
        StorageLayout::Monolithic
    }

    async fn load_all(&self) -> CmResult<RecordSet> {
        let blob = self.read_blob().await?;
        let mut records = RecordSet::new();
        for (values, shelf) in [(blob.active, Shelf::Active), (blob.archived, Shelf::Archived)] {
            for order in values.into_iter().filter_map(decode_record) {
                records.append(order, shelf);
            }
        }
        Ok(records)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn replace_all(&self, records: &RecordSet) -> CmResult<()> {
        let _guard = self.blob_lock.lock().await;
        let to_values = |orders: &[WorkOrder]| -> CmResult<Vec<Value>> {
            orders
                .iter()
                .map(|order| Ok(serde_json::to_value(order).map_err(StoreError::from)?))
                .collect()
        };
        let blob = MonolithBlob {
            active: to_values(records.shelf(Shelf::Active))?,
            archived: to_values(records.shelf(Shelf::Archived))?,
            ..MonolithBlob::default()
        };
        self.write_blob(&blob).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use chrono::NaiveDate;
    use cm_core::error::CmError;
    use cm_models::documents::Attachment;
    use cm_models::furniture::FurnitureItem;
    use cm_models::invoice::Invoice;
    use cm_models::material::{MaterialLine, MaterialOrder, SupplyStatus};
    use cm_models::phase::Phase;

    fn repositories() -> Vec<Arc<dyn WorkOrderRepository>> {
        vec![
            open_repository(Arc::new(MemoryStore::new()), StorageLayout::Sharded),
            open_repository(Arc::new(MemoryStore::new()), StorageLayout::Monolithic),
        ]
    }

    #[tokio::test]
    async fn test_put_get_and_shelves() {
        for repo in repositories() {
            let first = WorkOrder::new("Cucina");
            let second = WorkOrder::new("Bagno");
            repo.put(&first, Shelf::Active).await.unwrap();
            repo.put(&second, Shelf::Active).await.unwrap();

            assert_eq!(
                repo.list_ids(Shelf::Active).await.unwrap(),
                vec![second.id.clone(), first.id.clone()],
                "{:?}",
                repo.layout()
            );
            assert_eq!(repo.get(&first.id).await.unwrap().unwrap().name, "Cucina");

            repo.put(&first, Shelf::Archived).await.unwrap();
            assert_eq!(repo.shelf_of(&first.id).await.unwrap(), Some(Shelf::Archived));
            assert_eq!(repo.list_ids(Shelf::Active).await.unwrap(), vec![second.id.clone()]);

            repo.delete(&first.id).await.unwrap();
            assert!(repo.get(&first.id).await.unwrap().is_none());
            assert_eq!(repo.shelf_of(&first.id).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_replace_keeps_position() {
        for repo in repositories() {
            let a = WorkOrder::new("A");
            let mut b = WorkOrder::new("B");
            repo.put(&a, Shelf::Active).await.unwrap();
            repo.put(&b, Shelf::Active).await.unwrap();

            b.name = "B2".into();
            repo.put(&b, Shelf::Active).await.unwrap();
            let loaded = repo.load_all().await.unwrap();
            let names: Vec<_> = loaded.active.iter().map(|o| o.name.as_str()).collect();
            assert_eq!(names, vec!["B2", "A"]);
        }
    }

    #[tokio::test]
    async fn test_replace_all_drops_stale_records() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let repo = ShardedRepository::new(kv.clone());
        let stale = WorkOrder::new("Vecchia");
        repo.put(&stale, Shelf::Active).await.unwrap();

        let mut records = RecordSet::new();
        records.append(WorkOrder::new("Nuova"), Shelf::Archived);
        repo.replace_all(&records).await.unwrap();

        assert!(kv.get(&record_key(&stale.id)).await.unwrap().is_none());
        let loaded = repo.load_all().await.unwrap();
        assert!(loaded.active.is_empty());
        assert_eq!(loaded.archived[0].name, "Nuova");
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let repo = ShardedRepository::new(kv.clone());
        let good = WorkOrder::new("Buona");
        repo.put(&good, Shelf::Active).await.unwrap();
        repo.put(&WorkOrder::new("Rotta"), Shelf::Active).await.unwrap();

        let broken = repo.list_ids(Shelf::Active).await.unwrap()[0].clone();
        kv.set(&record_key(&broken), "{oops").await.unwrap();

        let loaded = repo.load_shelf(Shelf::Active).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, good.id);
    }

    #[tokio::test]
    async fn test_quota_failure_surfaces() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_quota(64));
        let repo = ShardedRepository::new(kv);
        let err = repo
            .put(&WorkOrder::new("Troppo grande"), Shelf::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, CmError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_quota_on_index_leaves_no_record_behind() {
        let order = WorkOrder::new("Cucina");
        let key = record_key(&order.id);
        let quota = (key.len() + serde_json::to_string(&order).unwrap().len() + 10) as u64;
        let kv = Arc::new(MemoryStore::with_quota(quota));
        let repo = ShardedRepository::new(kv.clone());

        let err = repo.put(&order, Shelf::Active).await.unwrap_err();
        assert!(matches!(err, CmError::QuotaExceeded { .. }));
        assert!(kv.get(&key).await.unwrap().is_none());
        assert!(repo.list_ids(Shelf::Active).await.unwrap().is_empty());
        assert_eq!(kv.usage().await, 0);
    }

    fn full_tree() -> WorkOrder {
        let mut order = WorkOrder::new("Cucina Rossi");
        order.client.name = "Mario Rossi".into();
        order.client.tax_id = "IT01234567890".into();
        order.client.email = "mario@example.it".into();
        order.architect.name = "Arch. Neri".into();
        order.quote.number = "P-12".into();
        order.quote.date = NaiveDate::from_ymd_opt(2024, 3, 1);
        order.quote.amount = Some(12500.5);
        order.phase = Phase::InProduction;
        order.note = "Piano in quarzo".into();
        order.installation_date = NaiveDate::from_ymd_opt(2024, 6, 15);

        let mut paid = Invoice::new().with_number("7").with_percentage(40.0).with_amount(5000.25);
        paid.set_paid(true, NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
        order.invoices.push(paid);
        order.invoices.push(Invoice::new().with_percentage(60.0));

        let mut item = FurnitureItem::new("Base");
        item.set_phase(Phase::MaterialReady);
        item.documents.ensure_categories(["rilievi", "disegni", "ordini"]);
        item.documents.category_mut("disegni").push(Attachment::inline(
            "pianta.png",
            "image/png",
            3,
            "data:image/png;base64,AAAA",
        ));
        let mut material = MaterialOrder::new("Legnami Sud");
        material.order_date = NaiveDate::from_ymd_opt(2024, 4, 10);
        material.status = SupplyStatus::Ordered;
        let mut line = MaterialLine::new("Rovere");
        line.spec = "spazzolato".into();
        line.quantity = "4 pz".into();
        line.status = SupplyStatus::Delivered;
        material.lines.push(line);
        item.orders.push(material);
        order.items.push(item);

        order.documents.ensure_categories(["preventivi", "fatture"]);
        order.documents.category_mut("fatture").push(Attachment::placeholder(
            "grande.pdf",
            "application/pdf",
            90_000_000,
            "File troppo grande",
        ));
        order
    }

    #[tokio::test]
    async fn test_saved_tree_reloads_identical() {
        for repo in repositories() {
            let order = full_tree();
            let archived = WorkOrder::new("Bagno");
            repo.put(&order, Shelf::Active).await.unwrap();
            repo.put(&archived, Shelf::Archived).await.unwrap();

            assert_eq!(repo.get(&order.id).await.unwrap(), Some(order.clone()));

            let loaded = repo.load_all().await.unwrap();
            assert_eq!(loaded.active, vec![order.clone()], "{:?}", repo.layout());
            assert_eq!(loaded.archived, vec![archived]);

            repo.replace_all(&loaded).await.unwrap();
            assert_eq!(repo.load_all().await.unwrap(), loaded);
        }
    }

    #[tokio::test]
    async fn test_open_backend_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            data_dir: dir.path().to_path_buf(),
            layout: StorageLayout::Sharded,
            quota_bytes: None,
        };
        let kv = open_backend(&config).await.unwrap();
        let repo = open_repository(kv, config.layout);
        repo.put(&WorkOrder::new("Su disco"), Shelf::Active).await.unwrap();
        assert!(dir.path().join("commesse%3Av2%3Aindex.json").exists());
    }
}

//! Documents attached to work orders and furniture items

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cm_attachments::{
    describe, materialize, write_to_dir, AddOutcome, AttachmentSummary, DocumentService,
    Materialized, UploadedFile,
};
use cm_core::config::{default_cache_dir, DocumentsConfig};
use cm_core::error::CmError;
use cm_core::result::CmResult;
use cm_core::types::RecordId;
use cm_models::documents::{Attachment, Documents};
use cm_models::furniture::FurnitureItem;
use cm_models::work_order::WorkOrder;
use tracing::{info, instrument};

use crate::store::AppStore;

/// Which documents container of a work order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentTarget {
    WorkOrder,
    Item(RecordId),
}

/// Where an exported document ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exported {
    File(PathBuf),
    Url(String),
}

/// The two category vocabularies
#[derive(Debug, Clone)]
pub struct RecordDocuments {
    work_orders: DocumentService,
    items: DocumentService,
}

impl RecordDocuments {
    pub fn new(config: &DocumentsConfig) -> Self {
        Self {
            work_orders: DocumentService::for_work_orders(config),
            items: DocumentService::for_items(config),
        }
    }

    pub fn service(&self, target: &DocumentTarget) -> &DocumentService {
        match target {
            DocumentTarget::WorkOrder => &self.work_orders,
            DocumentTarget::Item(_) => &self.items,
        }
    }

    /// Ensure every category list exists on the order and its items
    pub fn prepare_work_order(&self, order: &mut WorkOrder) {
        self.work_orders.prepare(&mut order.documents);
        for item in &mut order.items {
            self.prepare_item(item);
        }
    }

    pub fn prepare_item(&self, item: &mut FurnitureItem) {
        self.items.prepare(&mut item.documents);
    }
}

fn container<'a>(order: &'a WorkOrder, target: &DocumentTarget) -> CmResult<&'a Documents> {
    match target {
        DocumentTarget::WorkOrder => Ok(&order.documents),
        DocumentTarget::Item(item_id) => order
            .item(item_id)
            .map(|item| &item.documents)
            .ok_or_else(|| CmError::not_found("FurnitureItem", item_id.as_str())),
    }
}

fn container_mut<'a>(
    order: &'a mut WorkOrder,
    target: &DocumentTarget,
) -> CmResult<&'a mut Documents> {
    match target {
        DocumentTarget::WorkOrder => Ok(&mut order.documents),
        DocumentTarget::Item(item_id) => order
            .item_mut(item_id)
            .map(|item| &mut item.documents)
            .ok_or_else(|| CmError::not_found("FurnitureItem", item_id.as_str())),
    }
}

pub struct DocumentsService {
    store: Arc<AppStore>,
    documents: RecordDocuments,
    open_dir: PathBuf,
}

impl DocumentsService {
    pub fn new(store: Arc<AppStore>, config: &DocumentsConfig) -> Self {
        let open_dir = config
            .open_dir
            .clone()
            .unwrap_or_else(|| default_cache_dir().join("documenti"));
        Self {
            store,
            documents: RecordDocuments::new(config),
            open_dir,
        }
    }

    pub fn vocabulary(&self) -> &RecordDocuments {
        &self.documents
    }

    /// Add files already in memory
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn add(
        &self,
        id: &str,
        target: &DocumentTarget,
        category: &str,
        files: Vec<UploadedFile>,
    ) -> CmResult<AddOutcome> {
        let service = self.documents.service(target);
        self.store
            .update(id, |order| {
                let documents = container_mut(order, target)?;
                service.prepare(documents);
                Ok(service.add(documents, category, files)?)
            })
            .await
    }

    /// Read files from disk and add them; files over the ceiling are not read
    pub async fn add_paths(
        &self,
        id: &str,
        target: &DocumentTarget,
        category: &str,
        paths: &[PathBuf],
    ) -> CmResult<AddOutcome> {
        let max_read = self.documents.service(target).policy().max_file_size;
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(UploadedFile::from_path(path, max_read).await);
        }
        self.add(id, target, category, files).await
    }

    pub async fn list(
        &self,
        id: &str,
        target: &DocumentTarget,
        category: &str,
    ) -> CmResult<Vec<AttachmentSummary>> {
        let (order, _) = self.store.get(id).await?;
        let documents = container(&order, target)?;
        let list = self.documents.service(target).list(documents, category)?;
        Ok(list.iter().map(describe).collect())
    }

    pub async fn remove(
        &self,
        id: &str,
        target: &DocumentTarget,
        category: &str,
        index: usize,
    ) -> CmResult<Attachment> {
        let service = self.documents.service(target);
        self.store
            .update(id, |order| {
                let documents = container_mut(order, target)?;
                Ok(service.remove(documents, category, index)?)
            })
            .await
    }

    /// Rename by position; returns the name in effect afterwards
    pub async fn rename(
        &self,
        id: &str,
        target: &DocumentTarget,
        category: &str,
        index: usize,
        new_name: &str,
    ) -> CmResult<String> {
        let service = self.documents.service(target);
        self.store
            .update(id, |order| {
                let documents = container_mut(order, target)?;
                Ok(service.rename(documents, category, index, new_name)?)
            })
            .await
    }

    /// Write an inline document into `dir`; external URLs are returned as-is
    #[instrument(skip(self))]
    pub async fn download(
        &self,
        id: &str,
        target: &DocumentTarget,
        category: &str,
        index: usize,
        dir: &Path,
    ) -> CmResult<Exported> {
        let (order, _) = self.store.get(id).await?;
        let documents = container(&order, target)?;
        let attachment = self.documents.service(target).get(documents, category, index)?;

        match materialize(attachment)? {
            Materialized::External { url } => Ok(Exported::Url(url)),
            Materialized::Inline {
                file_name, bytes, ..
            } => {
                let path = write_to_dir(dir, &file_name, &bytes).await?;
                info!(path = %path.display(), "Document exported");
                Ok(Exported::File(path))
            }
        }
    }

    /// Export into the viewing directory, ready for the system opener
    pub async fn open(
        &self,
        id: &str,
        target: &DocumentTarget,
        category: &str,
        index: usize,
    ) -> CmResult<Exported> {
        self.download(id, target, category, index, &self.open_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::app_store;
    use cm_attachments::READ_ERROR_NOTE;

    async fn seeded() -> (DocumentsService, WorkOrder) {
        let store = app_store();
        let mut order = WorkOrder::new("Cucina");
        order.items.push(FurnitureItem::new("Base"));
        let order = store.insert(order).await.unwrap();
        (DocumentsService::new(store, &DocumentsConfig::default()), order)
    }

    #[tokio::test]
    async fn test_add_list_rename_remove() {
        let (service, order) = seeded().await;
        let files = vec![
            UploadedFile::from_bytes("pianta.pdf", None, b"%PDF-1.4".to_vec()),
            UploadedFile::from_bytes("note.txt", None, b"hello".to_vec()),
        ];

        let outcome = service
            .add(&order.id, &DocumentTarget::WorkOrder, "disegni", files)
            .await
            .unwrap();
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.rejected, vec!["note.txt".to_string()]);

        let listed = service
            .list(&order.id, &DocumentTarget::WorkOrder, "disegni")
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].badge, "PDF");

        let name = service
            .rename(&order.id, &DocumentTarget::WorkOrder, "disegni", 0, "  ")
            .await
            .unwrap();
        assert_eq!(name, "pianta.pdf");

        service
            .remove(&order.id, &DocumentTarget::WorkOrder, "disegni", 0)
            .await
            .unwrap();
        assert!(service
            .list(&order.id, &DocumentTarget::WorkOrder, "disegni")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_item_documents_and_unknown_item() {
        let (service, order) = seeded().await;
        let target = DocumentTarget::Item(order.items[0].id.clone());
        service
            .add(
                &order.id,
                &target,
                "rilievi",
                vec![UploadedFile::from_bytes("foto.png", None, vec![0u8; 8])],
            )
            .await
            .unwrap();
        assert_eq!(service.list(&order.id, &target, "rilievi").await.unwrap().len(), 1);

        // "fatture" exists only on work orders
        let err = service.list(&order.id, &target, "fatture").await.unwrap_err();
        assert!(matches!(err, CmError::Attachment(_)));

        let missing = DocumentTarget::Item("nope".into());
        assert!(matches!(
            service.list(&order.id, &missing, "rilievi").await,
            Err(CmError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_paths_unreadable_file() {
        let (service, order) = seeded().await;
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("preventivo.pdf");
        tokio::fs::write(&present, b"%PDF").await.unwrap();
        let missing = dir.path().join("sparito.pdf");

        let outcome = service
            .add_paths(
                &order.id,
                &DocumentTarget::WorkOrder,
                "preventivi",
                &[present, missing],
            )
            .await
            .unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.placeholders, vec!["sparito.pdf".to_string()]);

        let listed = service
            .list(&order.id, &DocumentTarget::WorkOrder, "preventivi")
            .await
            .unwrap();
        assert_eq!(listed[1].note.as_deref(), Some(READ_ERROR_NOTE));
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let (service, order) = seeded().await;
        service
            .add(
                &order.id,
                &DocumentTarget::WorkOrder,
                "ordini",
                vec![UploadedFile::from_bytes("ordine.pdf", None, b"%PDF".to_vec())],
            )
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let exported = service
            .download(&order.id, &DocumentTarget::WorkOrder, "ordini", 0, dir.path())
            .await
            .unwrap();
        match exported {
            Exported::File(path) => {
                assert_eq!(tokio::fs::read(path).await.unwrap(), b"%PDF");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

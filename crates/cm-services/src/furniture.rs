//! Furniture item services

use std::sync::Arc;

use cm_core::error::CmError;
use cm_core::result::CmResult;
use cm_models::furniture::FurnitureItem;
use cm_models::phase::Phase;
use cm_models::work_order::WorkOrder;
use tracing::instrument;

use crate::contracts::{Contract, FurnitureItemContract};
use crate::documents::RecordDocuments;
use crate::store::AppStore;

#[derive(Debug, Clone, Default)]
pub struct ItemParams {
    pub name: Option<String>,
    /// `Pagato` is clamped to `Finito`
    pub phase: Option<Phase>,
    pub note: Option<String>,
}

impl ItemParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

fn set_attributes(item: &mut FurnitureItem, params: &ItemParams) {
    if let Some(name) = &params.name {
        item.name = name.trim().to_string();
    }
    if let Some(phase) = params.phase {
        item.set_phase(phase);
    }
    if let Some(note) = &params.note {
        item.note = note.clone();
    }
}

pub(crate) fn item_mut<'a>(order: &'a mut WorkOrder, item_id: &str) -> CmResult<&'a mut FurnitureItem> {
    order
        .item_mut(item_id)
        .ok_or_else(|| CmError::not_found("FurnitureItem", item_id))
}

pub struct FurnitureService {
    store: Arc<AppStore>,
    documents: RecordDocuments,
}

impl FurnitureService {
    pub fn new(store: Arc<AppStore>, documents: RecordDocuments) -> Self {
        Self { store, documents }
    }

    #[instrument(skip(self, params))]
    pub async fn add(&self, order_id: &str, params: ItemParams) -> CmResult<FurnitureItem> {
        self.store
            .update(order_id, |order| {
                let mut item = FurnitureItem::new("");
                set_attributes(&mut item, &params);
                self.documents.prepare_item(&mut item);
                FurnitureItemContract.validate(&item)?;
                order.items.push(item.clone());
                Ok(item)
            })
            .await
    }

    #[instrument(skip(self, params))]
    pub async fn update(
        &self,
        order_id: &str,
        item_id: &str,
        params: ItemParams,
    ) -> CmResult<FurnitureItem> {
        self.store
            .update(order_id, |order| {
                let item = item_mut(order, item_id)?;
                set_attributes(item, &params);
                FurnitureItemContract.validate(item)?;
                Ok(item.clone())
            })
            .await
    }

    /// Remove an item together with its orders and documents
    pub async fn remove(&self, order_id: &str, item_id: &str) -> CmResult<FurnitureItem> {
        self.store
            .update(order_id, |order| {
                let position = order
                    .items
                    .iter()
                    .position(|item| item.id == item_id)
                    .ok_or_else(|| CmError::not_found("FurnitureItem", item_id))?;
                Ok(order.items.remove(position))
            })
            .await
    }
}

//! Material orders and their lines

use std::sync::Arc;

use chrono::NaiveDate;
use cm_core::error::CmError;
use cm_core::result::CmResult;
use cm_models::material::{MaterialLine, MaterialOrder, SupplyStatus};
use cm_models::work_order::WorkOrder;
use tracing::instrument;

use crate::contracts::{Contract, MaterialOrderContract};
use crate::furniture::item_mut;
use crate::store::AppStore;

#[derive(Debug, Clone, Default)]
pub struct OrderParams {
    pub supplier: Option<String>,
    pub order_date: Option<Option<NaiveDate>>,
    pub status: Option<SupplyStatus>,
    pub note: Option<String>,
}

impl OrderParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    pub fn with_order_date(mut self, date: Option<NaiveDate>) -> Self {
        self.order_date = Some(date);
        self
    }

    pub fn with_status(mut self, status: SupplyStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineParams {
    pub material: Option<String>,
    pub spec: Option<String>,
    pub quantity: Option<String>,
    pub status: Option<SupplyStatus>,
}

impl LineParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = Some(spec.into());
        self
    }

    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }

    pub fn with_status(mut self, status: SupplyStatus) -> Self {
        self.status = Some(status);
        self
    }
}

fn set_order_attributes(order: &mut MaterialOrder, params: &OrderParams) {
    if let Some(supplier) = &params.supplier {
        order.supplier = supplier.trim().to_string();
    }
    if let Some(date) = params.order_date {
        order.order_date = date;
    }
    if let Some(status) = params.status {
        order.status = status;
    }
    if let Some(note) = &params.note {
        order.note = note.clone();
    }
}

fn set_line_attributes(line: &mut MaterialLine, params: &LineParams) {
    if let Some(material) = &params.material {
        line.material = material.trim().to_string();
    }
    if let Some(spec) = &params.spec {
        line.spec = spec.trim().to_string();
    }
    if let Some(quantity) = &params.quantity {
        line.quantity = quantity.trim().to_string();
    }
    if let Some(status) = params.status {
        line.status = status;
    }
}

fn order_mut<'a>(
    work_order: &'a mut WorkOrder,
    item_id: &str,
    order_id: &str,
) -> CmResult<&'a mut MaterialOrder> {
    item_mut(work_order, item_id)?
        .order_mut(order_id)
        .ok_or_else(|| CmError::not_found("MaterialOrder", order_id))
}

/// Path to one material order: work order, furniture item, order
#[derive(Debug, Clone, Copy)]
pub struct OrderRef<'a> {
    pub work_order: &'a str,
    pub item: &'a str,
    pub order: &'a str,
}

pub struct OrderService {
    store: Arc<AppStore>,
}

impl OrderService {
    pub fn new(store: Arc<AppStore>) -> Self {
        Self { store }
    }

    /// Add an order to an item; a blank supplier gets the default title
    #[instrument(skip(self, params))]
    pub async fn add(
        &self,
        work_order_id: &str,
        item_id: &str,
        params: OrderParams,
    ) -> CmResult<MaterialOrder> {
        self.store
            .update(work_order_id, |work_order| {
                let item = item_mut(work_order, item_id)?;
                let mut order = MaterialOrder::new(MaterialOrder::DEFAULT_SUPPLIER);
                set_order_attributes(&mut order, &params);
                if order.supplier.is_empty() {
                    order.supplier = MaterialOrder::DEFAULT_SUPPLIER.to_string();
                }
                MaterialOrderContract.validate(&order)?;
                item.orders.push(order.clone());
                Ok(order)
            })
            .await
    }

    #[instrument(skip(self, params))]
    pub async fn update(&self, at: OrderRef<'_>, params: OrderParams) -> CmResult<MaterialOrder> {
        self.store
            .update(at.work_order, |work_order| {
                let order = order_mut(work_order, at.item, at.order)?;
                set_order_attributes(order, &params);
                MaterialOrderContract.validate(order)?;
                Ok(order.clone())
            })
            .await
    }

    pub async fn remove(&self, at: OrderRef<'_>) -> CmResult<MaterialOrder> {
        self.store
            .update(at.work_order, |work_order| {
                let item = item_mut(work_order, at.item)?;
                let position = item
                    .orders
                    .iter()
                    .position(|order| order.id == at.order)
                    .ok_or_else(|| CmError::not_found("MaterialOrder", at.order))?;
                Ok(item.orders.remove(position))
            })
            .await
    }

    #[instrument(skip(self, params))]
    pub async fn add_line(&self, at: OrderRef<'_>, params: LineParams) -> CmResult<MaterialLine> {
        self.store
            .update(at.work_order, |work_order| {
                let order = order_mut(work_order, at.item, at.order)?;
                let mut line = MaterialLine::new("");
                set_line_attributes(&mut line, &params);
                order.lines.push(line.clone());
                MaterialOrderContract.validate(order)?;
                Ok(line)
            })
            .await
    }

    pub async fn update_line(
        &self,
        at: OrderRef<'_>,
        line_id: &str,
        params: LineParams,
    ) -> CmResult<MaterialLine> {
        self.store
            .update(at.work_order, |work_order| {
                let order = order_mut(work_order, at.item, at.order)?;
                let line = order
                    .line_mut(line_id)
                    .ok_or_else(|| CmError::not_found("MaterialLine", line_id))?;
                set_line_attributes(line, &params);
                let updated = line.clone();
                MaterialOrderContract.validate(order)?;
                Ok(updated)
            })
            .await
    }

    pub async fn remove_line(&self, at: OrderRef<'_>, line_id: &str) -> CmResult<MaterialLine> {
        self.store
            .update(at.work_order, |work_order| {
                let order = order_mut(work_order, at.item, at.order)?;
                let position = order
                    .lines
                    .iter()
                    .position(|line| line.id == line_id)
                    .ok_or_else(|| CmError::not_found("MaterialLine", line_id))?;
                Ok(order.lines.remove(position))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::app_store;
    use cm_models::furniture::FurnitureItem;
    use cm_models::progress::{production_progress, ProgressWeights};

    async fn seeded() -> (Arc<AppStore>, OrderService, String, String) {
        let store = app_store();
        let mut work_order = WorkOrder::new("Cucina");
        let item = FurnitureItem::new("Base");
        let item_id = item.id.clone();
        work_order.items.push(item);
        let work_order = store.insert(work_order).await.unwrap();
        (store.clone(), OrderService::new(store), work_order.id, item_id)
    }

    #[tokio::test]
    async fn test_order_and_lines() {
        let (store, service, wo, item) = seeded().await;
        let order = service.add(&wo, &item, OrderParams::new()).await.unwrap();
        assert_eq!(order.supplier, MaterialOrder::DEFAULT_SUPPLIER);

        let at = OrderRef {
            work_order: &wo,
            item: &item,
            order: &order.id,
        };
        let line = service
            .add_line(
                at,
                LineParams::new()
                    .with_material("Rovere")
                    .with_spec("RV-12")
                    .with_quantity("4 pz"),
            )
            .await
            .unwrap();
        let line = service
            .update_line(at, &line.id, LineParams::new().with_status(SupplyStatus::Delivered))
            .await
            .unwrap();
        assert_eq!(line.material, "Rovere");
        assert!(line.status.is_delivered());

        service
            .update(at, OrderParams::new().with_status(SupplyStatus::Delivered))
            .await
            .unwrap();
        let (saved, _) = store.get(&wo).await.unwrap();
        // item in Misure, single delivered order: 0.7 * 0 + 0.3 * 100
        assert_eq!(production_progress(&saved, ProgressWeights::default()), 30);

        service.remove_line(at, &line.id).await.unwrap();
        service.remove(at).await.unwrap();
        assert!(store.get(&wo).await.unwrap().0.items[0].orders.is_empty());
    }

    #[tokio::test]
    async fn test_blank_supplier_on_update_rejected() {
        let (_, service, wo, item) = seeded().await;
        let order = service
            .add(&wo, &item, OrderParams::new().with_supplier("Legnami Sud"))
            .await
            .unwrap();
        let at = OrderRef {
            work_order: &wo,
            item: &item,
            order: &order.id,
        };
        let err = service
            .update(at, OrderParams::new().with_supplier("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, CmError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_item() {
        let (_, service, wo, _) = seeded().await;
        assert!(matches!(
            service.add(&wo, "nope", OrderParams::new()).await,
            Err(CmError::NotFound { .. })
        ));
    }
}

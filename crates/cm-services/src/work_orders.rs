//! Work order services: create, edit, archive, restore, delete

use std::sync::Arc;

use chrono::NaiveDate;
use cm_core::result::CmResult;
use cm_core::types::Shelf;
use cm_models::phase::Phase;
use cm_models::work_order::WorkOrder;
use tracing::{info, instrument};

use crate::contracts::{Contract, WorkOrderContract};
use crate::documents::RecordDocuments;
use crate::store::AppStore;

/// Work order attributes to set; `None` leaves a field unchanged.
///
/// Optional values use a nested option so they can be cleared:
/// `Some(None)` removes the current value.
#[derive(Debug, Clone, Default)]
pub struct WorkOrderParams {
    pub name: Option<String>,
    pub phase: Option<Phase>,
    pub note: Option<String>,
    pub installation_date: Option<Option<NaiveDate>>,

    pub client_name: Option<String>,
    pub client_tax_id: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_note: Option<String>,

    pub architect_name: Option<String>,
    pub architect_phone: Option<String>,
    pub architect_note: Option<String>,

    pub quote_number: Option<String>,
    pub quote_date: Option<Option<NaiveDate>>,
    pub quote_amount: Option<Option<f64>>,
}

impl WorkOrderParams {
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

    pub fn with_installation_date(mut self, date: Option<NaiveDate>) -> Self {
        self.installation_date = Some(date);
        self
    }

    pub fn with_client(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_client_email(mut self, email: impl Into<String>) -> Self {
        self.client_email = Some(email.into());
        self
    }

    pub fn with_client_tax_id(mut self, tax_id: impl Into<String>) -> Self {
        self.client_tax_id = Some(tax_id.into());
        self
    }

    pub fn with_architect(mut self, name: impl Into<String>) -> Self {
        self.architect_name = Some(name.into());
        self
    }

    pub fn with_quote(mut self, number: impl Into<String>, amount: Option<f64>) -> Self {
        self.quote_number = Some(number.into());
        self.quote_amount = Some(amount);
        self
    }

    pub fn with_quote_date(mut self, date: Option<NaiveDate>) -> Self {
        self.quote_date = Some(date);
        self
    }
}

fn assign<T>(target: &mut T, value: &Option<T>)
where
    T: Clone,
{
    if let Some(value) = value {
        *target = value.clone();
    }
}

/// Copy every provided attribute onto `order`
pub fn set_attributes(order: &mut WorkOrder, params: &WorkOrderParams) {
    if let Some(name) = &params.name {
        order.name = name.trim().to_string();
    }
    assign(&mut order.phase, &params.phase);
    assign(&mut order.note, &params.note);
    assign(&mut order.installation_date, &params.installation_date);

    assign(&mut order.client.name, &params.client_name);
    assign(&mut order.client.tax_id, &params.client_tax_id);
    assign(&mut order.client.phone, &params.client_phone);
    if let Some(email) = &params.client_email {
        order.client.email = email.trim().to_string();
    }
    assign(&mut order.client.address, &params.client_address);
    assign(&mut order.client.note, &params.client_note);

    assign(&mut order.architect.name, &params.architect_name);
    assign(&mut order.architect.phone, &params.architect_phone);
    assign(&mut order.architect.note, &params.architect_note);

    assign(&mut order.quote.number, &params.quote_number);
    assign(&mut order.quote.date, &params.quote_date);
    assign(&mut order.quote.amount, &params.quote_amount);
}

pub struct WorkOrderService {
    store: Arc<AppStore>,
    documents: RecordDocuments,
}

impl WorkOrderService {
    pub fn new(store: Arc<AppStore>, documents: RecordDocuments) -> Self {
        Self { store, documents }
    }

    /// Create a work order at the top of the active shelf
    #[instrument(skip(self, params))]
    pub async fn create(&self, params: WorkOrderParams) -> CmResult<WorkOrder> {
        let mut order = WorkOrder::new("");
        set_attributes(&mut order, &params);
        self.documents.prepare_work_order(&mut order);
        WorkOrderContract.validate(&order)?;

        let order = self.store.insert(order).await?;
        info!(id = %order.id, name = %order.name, "Work order created");
        Ok(order)
    }

    #[instrument(skip(self, params))]
    pub async fn update(&self, id: &str, params: WorkOrderParams) -> CmResult<WorkOrder> {
        self.store
            .update(id, |order| {
                set_attributes(order, &params);
                WorkOrderContract.validate(order)?;
                Ok(order.clone())
            })
            .await
    }

    pub async fn archive(&self, id: &str) -> CmResult<WorkOrder> {
        self.store.move_to(id, Shelf::Archived).await
    }

    pub async fn restore(&self, id: &str) -> CmResult<WorkOrder> {
        self.store.move_to(id, Shelf::Active).await
    }

    pub async fn delete(&self, id: &str) -> CmResult<WorkOrder> {
        self.store.remove(id).await
    }
}

//! Invoice services
//!
//! After every change the paid share is checked: once paid invoices cover
//! 100% the work order moves to `Pagato`.

use std::sync::Arc;

use chrono::NaiveDate;
use cm_core::error::CmError;
use cm_core::result::CmResult;
use cm_core::types::{today, RecordId};
use cm_models::invoice::Invoice;
use cm_models::phase::Phase;
use cm_models::progress::is_fully_paid;
use cm_models::work_order::WorkOrder;
use tracing::{info, instrument};

use crate::contracts::{Contract, InvoiceContract};
use crate::store::AppStore;

#[derive(Debug, Clone, Default)]
pub struct InvoiceParams {
    pub number: Option<String>,
    pub date: Option<Option<NaiveDate>>,
    pub amount: Option<Option<f64>>,
    pub percentage: Option<Option<f64>>,
    pub paid: Option<bool>,
    /// Explicit payment date, applied after `paid`
    pub payment_date: Option<Option<NaiveDate>>,
    pub note: Option<String>,
}

impl InvoiceParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_amount(mut self, amount: Option<f64>) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_percentage(mut self, percentage: Option<f64>) -> Self {
        self.percentage = Some(percentage);
        self
    }

    pub fn with_paid(mut self, paid: bool) -> Self {
        self.paid = Some(paid);
        self
    }

    pub fn with_payment_date(mut self, date: Option<NaiveDate>) -> Self {
        self.payment_date = Some(date);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

fn set_attributes(invoice: &mut Invoice, params: &InvoiceParams, today: NaiveDate) {
    if let Some(number) = &params.number {
        invoice.number = number.trim().to_string();
    }
    if let Some(date) = params.date {
        invoice.date = date;
    }
    if let Some(amount) = params.amount {
        invoice.amount = amount;
    }
    if let Some(percentage) = params.percentage {
        invoice.percentage = percentage;
    }
    if let Some(paid) = params.paid {
        invoice.set_paid(paid, today);
    }
    if let Some(payment_date) = params.payment_date {
        invoice.payment_date = payment_date;
    }
    if let Some(note) = &params.note {
        invoice.note = note.clone();
    }
}

/// Move the order to `Pagato` when paid invoices cover the total
fn apply_auto_paid(order: &mut WorkOrder) {
    if is_fully_paid(&order.invoices) && order.phase != Phase::Paid {
        info!(id = %order.id, "Invoices fully paid, marking work order paid");
        order.phase = Phase::Paid;
    }
}

fn invoice_mut<'a>(order: &'a mut WorkOrder, invoice_id: &str) -> CmResult<&'a mut Invoice> {
    order
        .invoice_mut(invoice_id)
        .ok_or_else(|| CmError::not_found("Invoice", invoice_id))
}

pub struct InvoiceService {
    store: Arc<AppStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<AppStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, params))]
    pub async fn add(&self, order_id: &str, params: InvoiceParams) -> CmResult<Invoice> {
        let today = today();
        self.store
            .update(order_id, |order| {
                let mut invoice = Invoice::new();
                set_attributes(&mut invoice, &params, today);
                InvoiceContract.validate(&invoice)?;
                order.invoices.push(invoice.clone());
                apply_auto_paid(order);
                Ok(invoice)
            })
            .await
    }

    #[instrument(skip(self, params))]
    pub async fn update(
        &self,
        order_id: &str,
        invoice_id: &str,
        params: InvoiceParams,
    ) -> CmResult<Invoice> {
        let today = today();
        self.store
            .update(order_id, |order| {
                let invoice = invoice_mut(order, invoice_id)?;
                set_attributes(invoice, &params, today);
                InvoiceContract.validate(invoice)?;
                let updated = invoice.clone();
                apply_auto_paid(order);
                Ok(updated)
            })
            .await
    }

    /// Toggle the paid flag; marking paid stamps today when no date is set
    pub async fn set_paid(&self, order_id: &str, invoice_id: &str, paid: bool) -> CmResult<Invoice> {
        self.update(order_id, invoice_id, InvoiceParams::new().with_paid(paid))
            .await
    }

    pub async fn remove(&self, order_id: &str, invoice_id: &str) -> CmResult<RecordId> {
        self.store
            .update(order_id, |order| {
                let position = order
                    .invoices
                    .iter()
                    .position(|invoice| invoice.id == invoice_id)
                    .ok_or_else(|| CmError::not_found("Invoice", invoice_id))?;
                Ok(order.invoices.remove(position).id)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::app_store;

    async fn seeded() -> (Arc<AppStore>, InvoiceService, String) {
        let store = app_store();
        let order = store.insert(WorkOrder::new("Cucina")).await.unwrap();
        (store.clone(), InvoiceService::new(store), order.id)
    }

    #[test]
    fn test_payment_date_stamped_once() {
        let day1 = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let mut invoice = Invoice::new();

        set_attributes(&mut invoice, &InvoiceParams::new().with_paid(true), day1);
        assert_eq!(invoice.payment_date, Some(day1));

        set_attributes(&mut invoice, &InvoiceParams::new().with_paid(false), day2);
        assert_eq!(invoice.payment_date, Some(day1));

        set_attributes(&mut invoice, &InvoiceParams::new().with_paid(true), day2);
        assert_eq!(invoice.payment_date, Some(day1));
    }

    #[tokio::test]
    async fn test_auto_paid_after_full_coverage() {
        let (store, service, id) = seeded().await;
        let first = service
            .add(&id, InvoiceParams::new().with_percentage(Some(40.0)).with_paid(true))
            .await
            .unwrap();
        let second = service
            .add(&id, InvoiceParams::new().with_percentage(Some(60.0)))
            .await
            .unwrap();
        assert!(first.payment_date.is_some());
        assert_ne!(store.get(&id).await.unwrap().0.phase, Phase::Paid);

        service.set_paid(&id, &second.id, true).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().0.phase, Phase::Paid);
    }

    #[tokio::test]
    async fn test_invalid_percentage_rejected() {
        let (store, service, id) = seeded().await;
        let err = service
            .add(&id, InvoiceParams::new().with_percentage(Some(140.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, CmError::Validation(_)));
        assert!(store.get(&id).await.unwrap().0.invoices.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let (store, service, id) = seeded().await;
        let invoice = service
            .add(&id, InvoiceParams::new().with_number("1/2024"))
            .await
            .unwrap();

        let updated = service
            .update(&id, &invoice.id, InvoiceParams::new().with_amount(Some(2500.0)))
            .await
            .unwrap();
        assert_eq!(updated.number, "1/2024");
        assert_eq!(updated.amount, Some(2500.0));

        service.remove(&id, &invoice.id).await.unwrap();
        assert!(store.get(&id).await.unwrap().0.invoices.is_empty());
        assert!(matches!(
            service.remove(&id, &invoice.id).await,
            Err(CmError::NotFound { .. })
        ));
    }
}

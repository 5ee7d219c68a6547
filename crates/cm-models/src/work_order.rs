//! Work order model ("commessa")
//!
//! The root entity: client and architect details, the quote, invoices,
//! furniture items and documents all live inside one record.

use chrono::{DateTime, NaiveDate, Utc};
use cm_core::traits::{Entity, Identifiable, Timestamped};
use cm_core::types::{new_record_id, now, RecordId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::documents::Documents;
use crate::furniture::FurnitureItem;
use crate::invoice::Invoice;
use crate::phase::Phase;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClientInfo {
    #[serde(rename = "nome", default)]
    pub name: String,
    /// Partita IVA
    #[serde(rename = "piva", default)]
    pub tax_id: String,
    #[serde(rename = "telefono", default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "indirizzo", default)]
    pub address: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ArchitectInfo {
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "telefono", default)]
    pub phone: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Quote {
    #[serde(rename = "numero", default)]
    pub number: String,
    #[serde(rename = "data", default)]
    pub date: Option<NaiveDate>,
    #[serde(rename = "importo", default)]
    pub amount: Option<f64>,
}

/// Work order entity
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    pub id: RecordId,

    #[serde(rename = "nome")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(rename = "cliente", default)]
    pub client: ClientInfo,

    #[serde(rename = "architetto", default)]
    pub architect: ArchitectInfo,

    #[serde(rename = "preventivo", default)]
    pub quote: Quote,

    #[serde(rename = "fase", default)]
    pub phase: Phase,

    #[serde(default)]
    pub note: String,

    /// Planned installation date
    #[serde(rename = "dataPosa", default)]
    pub installation_date: Option<NaiveDate>,

    #[serde(rename = "fatture", default)]
    pub invoices: Vec<Invoice>,

    #[serde(rename = "mobili", default)]
    pub items: Vec<FurnitureItem>,

    #[serde(rename = "documenti", default)]
    pub documents: Documents,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkOrder {
    pub fn new(name: impl Into<String>) -> Self {
        let created = now();
        Self {
            id: new_record_id(),
            name: name.into(),
            client: ClientInfo::default(),
            architect: ArchitectInfo::default(),
            quote: Quote::default(),
            phase: Phase::default(),
            note: String::new(),
            installation_date: None,
            invoices: Vec::new(),
            items: Vec::new(),
            documents: Documents::new(),
            created_at: Some(created),
            updated_at: Some(created),
        }
    }

    /// Name shown in lists; blank names get a stand-in
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Commessa senza titolo"
        } else {
            &self.name
        }
    }

    pub fn invoice(&self, invoice_id: &str) -> Option<&Invoice> {
        self.invoices.iter().find(|invoice| invoice.id == invoice_id)
    }

    pub fn invoice_mut(&mut self, invoice_id: &str) -> Option<&mut Invoice> {
        self.invoices.iter_mut().find(|invoice| invoice.id == invoice_id)
    }

    pub fn item(&self, item_id: &str) -> Option<&FurnitureItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut FurnitureItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    /// Number of material orders over all items
    pub fn order_count(&self) -> usize {
        self.items.iter().map(|item| item.orders.len()).sum()
    }
}

impl Identifiable for WorkOrder {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Timestamped for WorkOrder {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn touch(&mut self) {
        let stamp = now();
        self.created_at.get_or_insert(stamp);
        self.updated_at = Some(stamp);
    }
}

impl Entity for WorkOrder {
    const TYPE_NAME: &'static str = "WorkOrder";
}

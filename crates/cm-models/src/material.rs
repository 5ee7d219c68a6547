//! Material orders and their lines
//!
//! Mirrors the "ordini" list of a furniture item.

use chrono::NaiveDate;
use cm_core::types::{new_record_id, RecordId};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Supply status shared by orders and order lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SupplyStatus {
    #[default]
    #[serde(rename = "da-ordinare")]
    ToOrder,
    #[serde(rename = "ordinato")]
    Ordered,
    #[serde(rename = "consegnato")]
    Delivered,
}

impl SupplyStatus {
    pub const ALL: [SupplyStatus; 3] = [Self::ToOrder, Self::Ordered, Self::Delivered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToOrder => "da-ordinare",
            Self::Ordered => "ordinato",
            Self::Delivered => "consegnato",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ToOrder => "Da ordinare",
            Self::Ordered => "Ordinato",
            Self::Delivered => "Consegnato",
        }
    }

    /// Resolve a stored status including older spellings; unknown means
    /// nothing has been ordered yet.
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "da-ordinare" | "da ordinare" => Self::ToOrder,
            "ordinato" | "in arrivo" | "in-arrivo" => Self::Ordered,
            "consegnato" | "arrivato" => Self::Delivered,
            _ => Self::ToOrder,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl std::fmt::Display for SupplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for SupplyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted || status.label().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown supply status: {}", s))
    }
}

/// A supplier order placed for one furniture item
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialOrder {
    pub id: RecordId,

    /// Supplier name
    #[serde(rename = "fornitore", default)]
    #[validate(length(max = 255))]
    pub supplier: String,

    #[serde(rename = "dataOrdine", default)]
    pub order_date: Option<NaiveDate>,

    #[serde(rename = "stato", default)]
    pub status: SupplyStatus,

    #[serde(default)]
    pub note: String,

    #[serde(rename = "materiali", default)]
    pub lines: Vec<MaterialLine>,
}

impl MaterialOrder {
    pub const DEFAULT_SUPPLIER: &'static str = "Ordine materiale";

    pub fn new(supplier: impl Into<String>) -> Self {
        Self {
            id: new_record_id(),
            supplier: supplier.into(),
            order_date: None,
            status: SupplyStatus::ToOrder,
            note: String::new(),
            lines: Vec::new(),
        }
    }

    pub fn line(&self, line_id: &str) -> Option<&MaterialLine> {
        self.lines.iter().find(|line| line.id == line_id)
    }

    pub fn line_mut(&mut self, line_id: &str) -> Option<&mut MaterialLine> {
        self.lines.iter_mut().find(|line| line.id == line_id)
    }
}

/// One material within an order
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MaterialLine {
    pub id: RecordId,

    #[serde(rename = "materiale", default)]
    #[validate(length(max = 255))]
    pub material: String,

    /// Finish or specification code
    #[serde(rename = "specifiche", default)]
    pub spec: String,

    /// Free text, e.g. "3 pz" or "12 mq"
    #[serde(rename = "quantita", default)]
    pub quantity: String,

    #[serde(rename = "stato", default)]
    pub status: SupplyStatus,
}

impl MaterialLine {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            id: new_record_id(),
            material: material.into(),
            spec: String::new(),
            quantity: String::new(),
            status: SupplyStatus::ToOrder,
        }
    }
}

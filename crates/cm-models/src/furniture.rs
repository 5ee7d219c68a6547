//! Furniture item model ("mobile")

use cm_core::types::{new_record_id, RecordId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::documents::Documents;
use crate::material::MaterialOrder;
use crate::phase::Phase;

/// One piece of furniture within a work order
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct FurnitureItem {
    pub id: RecordId,

    #[serde(rename = "nome", default)]
    #[validate(length(max = 255))]
    pub name: String,

    /// Never `Pagato`; see [`FurnitureItem::set_phase`]
    #[serde(rename = "fase", default)]
    pub phase: Phase,

    #[serde(default)]
    pub note: String,

    #[serde(rename = "ordini", default)]
    pub orders: Vec<MaterialOrder>,

    #[serde(rename = "documenti", default)]
    pub documents: Documents,
}

impl FurnitureItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_record_id(),
            name: name.into(),
            phase: Phase::default(),
            note: String::new(),
            orders: Vec::new(),
            documents: Documents::new(),
        }
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase.clamp_for_item();
    }

    pub fn order(&self, order_id: &str) -> Option<&MaterialOrder> {
        self.orders.iter().find(|order| order.id == order_id)
    }

    pub fn order_mut(&mut self, order_id: &str) -> Option<&mut MaterialOrder> {
        self.orders.iter_mut().find(|order| order.id == order_id)
    }

    pub fn delivered_orders(&self) -> usize {
        self.orders
            .iter()
            .filter(|order| order.status.is_delivered())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::SupplyStatus;

    #[test]
    fn test_set_phase_clamps_paid() {
        let mut item = FurnitureItem::new("Cucina");
        item.set_phase(Phase::Paid);
        assert_eq!(item.phase, Phase::Finished);
        item.set_phase(Phase::Installed);
        assert_eq!(item.phase, Phase::Installed);
    }

    #[test]
    fn test_delivered_orders() {
        let mut item = FurnitureItem::new("Armadio");
        let mut delivered = MaterialOrder::new("A");
        delivered.status = SupplyStatus::Delivered;
        item.orders.push(delivered);
        item.orders.push(MaterialOrder::new("B"));
        assert_eq!(item.delivered_orders(), 1);

        let id = item.orders[1].id.clone();
        assert_eq!(item.order(&id).map(|o| o.supplier.as_str()), Some("B"));
    }
}

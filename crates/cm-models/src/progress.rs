//! Progress calculation
//!
//! Production progress blends the average furniture phase with the share of
//! delivered material orders; paid progress is the paid share of invoiced
//! percentages. Both are whole percentages.

use cm_core::config::ProgressConfig;
use serde::Serialize;

use crate::invoice::Invoice;
use crate::phase::{Phase, ITEM_STAGE_COUNT};
use crate::work_order::WorkOrder;

/// Highest phase index an item can contribute
const MAX_ITEM_INDEX: usize = ITEM_STAGE_COUNT - 1;

/// Blend weights applied when at least one material order exists
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressWeights {
    pub production: f64,
    pub orders: f64,
}

impl Default for ProgressWeights {
    fn default() -> Self {
        Self {
            production: 0.7,
            orders: 0.3,
        }
    }
}

impl From<&ProgressConfig> for ProgressWeights {
    fn from(config: &ProgressConfig) -> Self {
        Self {
            production: config.production_weight,
            orders: config.orders_weight,
        }
    }
}

/// Production progress of a work order, 0-100
pub fn production_progress(order: &WorkOrder, weights: ProgressWeights) -> u8 {
    if order.items.is_empty() {
        return 0;
    }

    let phase_sum: usize = order
        .items
        .iter()
        .map(|item| item.phase.index().min(MAX_ITEM_INDEX))
        .sum();
    let items_pct = phase_sum as f64 / (order.items.len() * MAX_ITEM_INDEX) as f64 * 100.0;

    let total_orders = order.order_count();
    if total_orders == 0 {
        return to_percent(items_pct);
    }

    let delivered: usize = order.items.iter().map(|item| item.delivered_orders()).sum();
    let orders_pct = delivered as f64 / total_orders as f64 * 100.0;

    let weight_sum = weights.production + weights.orders;
    if weight_sum <= 0.0 {
        return to_percent(items_pct);
    }
    to_percent((weights.production * items_pct + weights.orders * orders_pct) / weight_sum)
}

/// Paid share of invoiced percentages, 0-100
///
/// Zero when there are no invoices or their percentages sum to zero.
pub fn paid_progress(invoices: &[Invoice]) -> u8 {
    let total: f64 = invoices.iter().map(Invoice::weight).sum();
    if total <= 0.0 {
        return 0;
    }
    let paid: f64 = invoices
        .iter()
        .filter(|invoice| invoice.paid)
        .map(Invoice::weight)
        .sum();
    to_percent(paid / total * 100.0)
}

/// Whether paid invoice percentages cover the whole order
pub fn is_fully_paid(invoices: &[Invoice]) -> bool {
    let paid: f64 = invoices
        .iter()
        .filter(|invoice| invoice.paid)
        .map(Invoice::weight)
        .sum();
    paid >= 100.0
}

/// Progress of a single furniture item from its phase
pub fn item_progress(phase: Phase) -> u8 {
    let index = phase.index().min(MAX_ITEM_INDEX);
    to_percent(index as f64 / MAX_ITEM_INDEX as f64 * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    Done,
    Current,
    Pending,
}

/// Every phase marked relative to an item's phase.
///
/// `Pagato` is done only when the order is fully paid.
pub fn stage_strip(item_phase: Phase, paid_pct: u8) -> Vec<(Phase, StageState)> {
    let current = item_phase.index();
    Phase::ALL
        .iter()
        .map(|&phase| {
            let state = if phase.is_terminal() {
                if paid_pct >= 100 {
                    StageState::Done
                } else {
                    StageState::Pending
                }
            } else if phase.index() < current {
                StageState::Done
            } else if phase.index() == current {
                StageState::Current
            } else {
                StageState::Pending
            };
            (phase, state)
        })
        .collect()
}

fn to_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::furniture::FurnitureItem;
    use crate::material::{MaterialOrder, SupplyStatus};

    fn item(phase: Phase) -> FurnitureItem {
        let mut item = FurnitureItem::new("m");
        item.set_phase(phase);
        item
    }

    fn invoice(pct: f64, paid: bool) -> Invoice {
        let mut invoice = Invoice::new().with_percentage(pct);
        invoice.paid = paid;
        invoice
    }

    #[test]
    fn test_no_items_is_zero() {
        let order = WorkOrder::new("vuota");
        assert_eq!(production_progress(&order, ProgressWeights::default()), 0);
    }

    #[test]
    fn test_items_average_without_orders() {
        let mut order = WorkOrder::new("x");
        order.items.push(item(Phase::Finished));
        order.items.push(item(Phase::Measurements));
        assert_eq!(production_progress(&order, ProgressWeights::default()), 50);
    }

    #[test]
    fn test_blend_with_orders() {
        let mut order = WorkOrder::new("x");
        let mut cucina = item(Phase::Finished);
        let mut delivered = MaterialOrder::new("A");
        delivered.status = SupplyStatus::Delivered;
        cucina.orders.push(delivered);
        cucina.orders.push(MaterialOrder::new("B"));
        order.items.push(cucina);

        // 0.7 * 100 + 0.3 * 50
        assert_eq!(production_progress(&order, ProgressWeights::default()), 85);

        let even = ProgressWeights {
            production: 0.5,
            orders: 0.5,
        };
        assert_eq!(production_progress(&order, even), 75);
    }

    #[test]
    fn test_paid_progress() {
        assert_eq!(paid_progress(&[]), 0);
        assert_eq!(paid_progress(&[Invoice::new(), Invoice::new()]), 0);

        let invoices = vec![invoice(30.0, true), invoice(70.0, false)];
        assert_eq!(paid_progress(&invoices), 30);
        assert!(!is_fully_paid(&invoices));

        let invoices = vec![invoice(30.0, true), invoice(70.0, true)];
        assert_eq!(paid_progress(&invoices), 100);
        assert!(is_fully_paid(&invoices));
    }

    #[test]
    fn test_item_progress() {
        assert_eq!(item_progress(Phase::Measurements), 0);
        assert_eq!(item_progress(Phase::MaterialOrdered), 44);
        assert_eq!(item_progress(Phase::Finished), 100);
        assert_eq!(item_progress(Phase::Paid), 100);
    }

    #[test]
    fn test_stage_strip() {
        let strip = stage_strip(Phase::Quote, 40);
        assert_eq!(strip.len(), Phase::ALL.len());
        assert_eq!(strip[0].1, StageState::Done);
        assert_eq!(strip[2], (Phase::Quote, StageState::Current));
        assert_eq!(strip[3].1, StageState::Pending);
        assert_eq!(strip[10], (Phase::Paid, StageState::Pending));

        let strip = stage_strip(Phase::Finished, 100);
        assert_eq!(strip[10], (Phase::Paid, StageState::Done));
    }
}

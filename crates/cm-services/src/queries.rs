//! Search, phase filtering and the progress board

use cm_models::furniture::FurnitureItem;
use cm_models::phase::Phase;
use cm_models::progress::{
    item_progress, paid_progress, production_progress, stage_strip, ProgressWeights, StageState,
};
use cm_models::work_order::WorkOrder;
use serde::Serialize;

/// Free-text and phase filter over work orders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkOrderFilter {
    text: String,
    phase: Option<Phase>,
}

impl WorkOrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring; blank matches everything
    pub fn with_text(mut self, text: impl AsRef<str>) -> Self {
        self.text = text.as_ref().trim().to_lowercase();
        self
    }

    pub fn with_phase(mut self, phase: Option<Phase>) -> Self {
        self.phase = phase;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.phase.is_none()
    }

    /// Text searched: name, client, architect and quote number
    fn haystack(order: &WorkOrder) -> String {
        [
            order.name.as_str(),
            order.client.name.as_str(),
            order.architect.name.as_str(),
            order.quote.number.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }

    pub fn matches(&self, order: &WorkOrder) -> bool {
        if let Some(phase) = self.phase {
            if order.phase != phase {
                return false;
            }
        }
        self.text.is_empty() || Self::haystack(order).contains(&self.text)
    }

    pub fn apply<'a>(&self, orders: &'a [WorkOrder]) -> Vec<&'a WorkOrder> {
        orders.iter().filter(|order| self.matches(order)).collect()
    }
}

/// One line of the work order list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrderRow {
    pub id: String,
    pub name: String,
    pub client: String,
    pub quote_number: String,
    pub phase: Phase,
    pub production: u8,
    pub paid: u8,
    pub items: usize,
}

impl WorkOrderRow {
    pub fn from_order(order: &WorkOrder, weights: ProgressWeights) -> Self {
        Self {
            id: order.id.clone(),
            name: order.display_name().to_string(),
            client: order.client.name.clone(),
            quote_number: order.quote.number.clone(),
            phase: order.phase,
            production: production_progress(order, weights),
            paid: paid_progress(&order.invoices),
            items: order.items.len(),
        }
    }
}

pub fn list_rows(
    orders: &[WorkOrder],
    filter: &WorkOrderFilter,
    weights: ProgressWeights,
) -> Vec<WorkOrderRow> {
    filter
        .apply(orders)
        .into_iter()
        .map(|order| WorkOrderRow::from_order(order, weights))
        .collect()
}

/// Progress of one furniture item on the board
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardItem {
    pub id: String,
    pub name: String,
    pub phase: Phase,
    pub progress: u8,
    pub orders: usize,
    pub delivered_orders: usize,
    pub stages: Vec<(Phase, StageState)>,
}

impl BoardItem {
    fn from_item(item: &FurnitureItem, paid: u8) -> Self {
        let name = if item.name.trim().is_empty() {
            "Mobile senza titolo".to_string()
        } else {
            item.name.clone()
        };
        Self {
            id: item.id.clone(),
            name,
            phase: item.phase,
            progress: item_progress(item.phase),
            orders: item.orders.len(),
            delivered_orders: item.delivered_orders(),
            stages: stage_strip(item.phase, paid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardCard {
    pub order: WorkOrderRow,
    pub items: Vec<BoardItem>,
}

/// Progress board over the filtered work orders
pub fn board(
    orders: &[WorkOrder],
    filter: &WorkOrderFilter,
    weights: ProgressWeights,
) -> Vec<BoardCard> {
    filter
        .apply(orders)
        .into_iter()
        .map(|order| {
            let row = WorkOrderRow::from_order(order, weights);
            let items = order
                .items
                .iter()
                .map(|item| BoardItem::from_item(item, row.paid))
                .collect();
            BoardCard { order: row, items }
        })
        .collect()
}

//! In-memory record set: active and archived work orders

use cm_core::types::{RecordId, Shelf};
use serde::{Deserialize, Serialize};

use crate::work_order::WorkOrder;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecordSet {
    pub active: Vec<WorkOrder>,
    pub archived: Vec<WorkOrder>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shelf(&self, shelf: Shelf) -> &[WorkOrder] {
        match shelf {
            Shelf::Active => &self.active,
            Shelf::Archived => &self.archived,
        }
    }

    fn shelf_mut(&mut self, shelf: Shelf) -> &mut Vec<WorkOrder> {
        match shelf {
            Shelf::Active => &mut self.active,
            Shelf::Archived => &mut self.archived,
        }
    }

    pub fn ids(&self, shelf: Shelf) -> Vec<RecordId> {
        self.shelf(shelf).iter().map(|order| order.id.clone()).collect()
    }

    /// Find a work order on either shelf
    pub fn find(&self, id: &str) -> Option<(&WorkOrder, Shelf)> {
        [Shelf::Active, Shelf::Archived].into_iter().find_map(|shelf| {
            self.shelf(shelf)
                .iter()
                .find(|order| order.id == id)
                .map(|order| (order, shelf))
        })
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut WorkOrder> {
        self.active
            .iter_mut()
            .chain(self.archived.iter_mut())
            .find(|order| order.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Insert or replace, placing the work order on `shelf`.
    ///
    /// A replaced record keeps its position when it stays on the same
    /// shelf; new and moved records go first, matching most-recent-first
    /// listing.
    pub fn upsert(&mut self, order: WorkOrder, shelf: Shelf) {
        let current_shelf = self.find(&order.id).map(|(_, shelf)| shelf);
        if let Some(current) = current_shelf {
            if current == shelf {
                let list = self.shelf_mut(shelf);
                if let Some(slot) = list.iter_mut().find(|o| o.id == order.id) {
                    *slot = order;
                }
                return;
            }
            self.remove(&order.id);
        }
        self.shelf_mut(shelf).insert(0, order);
    }

    /// Append at the end of `shelf`, keeping stored order when loading
    pub fn append(&mut self, order: WorkOrder, shelf: Shelf) {
        self.shelf_mut(shelf).push(order);
    }

    pub fn remove(&mut self, id: &str) -> Option<(WorkOrder, Shelf)> {
        for shelf in [Shelf::Active, Shelf::Archived] {
            let list = self.shelf_mut(shelf);
            if let Some(pos) = list.iter().position(|order| order.id == id) {
                return Some((list.remove(pos), shelf));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.archived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

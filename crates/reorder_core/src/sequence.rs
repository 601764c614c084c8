use shared::domain::{ItemId, OrderKey, OrderedItem};

use crate::error::ReconcileError;

/// The order-key-sorted list currently presented to the user. Mutated in place
/// by reorder intents; the persistence adapter reads it when a drag ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    items: Vec<OrderedItem>,
}

impl Sequence {
    /// Builds a sequence from records in any order, sorting by order key with
    /// the store's tie-breakers.
    pub fn from_unsorted(mut items: Vec<OrderedItem>) -> Self {
        items.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[OrderedItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&OrderedItem> {
        self.items.get(index)
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Removes the item at `from` and reinserts it at `to`. Only the items
    /// between the two indices shift.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), ReconcileError> {
        let len = self.items.len();
        if from >= len || to >= len {
            return Err(ReconcileError::IndexOutOfBounds { from, to, len });
        }
        if from < to {
            self.items[from..=to].rotate_left(1);
        } else if to < from {
            self.items[to..=from].rotate_right(1);
        }
        Ok(())
    }

    /// Key for a record appended outside a drag: one past the current maximum.
    pub fn next_order_key(&self) -> OrderKey {
        self.items
            .iter()
            .map(|item| item.order_key)
            .max()
            .map_or(OrderKey(0), OrderKey::next)
    }

    pub fn push(&mut self, item: OrderedItem) {
        self.items.push(item);
    }

    pub fn remove(&mut self, id: ItemId) -> Option<OrderedItem> {
        let index = self.position(id)?;
        Some(self.items.remove(index))
    }

    /// Replaces the application fields of the matching record. Position and
    /// order key stay as they are in memory.
    pub fn update_fields(&mut self, updated: OrderedItem) -> bool {
        let Some(existing) = self.items.iter_mut().find(|item| item.id == updated.id) else {
            return false;
        };
        *existing = OrderedItem {
            order_key: existing.order_key,
            ..updated
        };
        true
    }

    /// Dense re-key: the item at index `i` gets key `i`.
    pub fn rekey_dense(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.order_key = OrderKey::dense(index);
        }
    }

    pub fn into_items(self) -> Vec<OrderedItem> {
        self.items
    }
}

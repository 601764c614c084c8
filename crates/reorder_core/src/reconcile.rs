//! Applies reorder intents to the sequence and keeps the keyed offset
//! animations consistent with the new logical order.

use std::{collections::HashMap, time::Duration};

use shared::domain::{ItemId, OrderedItem};
use tracing::{debug, warn};

use crate::{
    animation::{OffsetAnimator, SpringConfig},
    controller::{DragSession, ReorderIntent},
    error::ReconcileError,
    geometry::{ListGeometry, Span},
    Sequence,
};

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    sequence: Sequence,
    animator: OffsetAnimator,
}

impl Reconciler {
    pub fn new(sequence: Sequence, spring: SpringConfig) -> Self {
        Self {
            sequence,
            animator: OffsetAnimator::new(spring),
        }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn sequence_mut(&mut self) -> &mut Sequence {
        &mut self.sequence
    }

    pub fn animator(&self) -> &OffsetAnimator {
        &self.animator
    }

    pub fn offset(&self, id: ItemId) -> f32 {
        self.animator.offset(id)
    }

    /// Moves `dragged_id` from `intent.from` to `intent.to`. Every sibling in
    /// the displaced range keeps its current on-screen position and springs
    /// toward its new slot. The dragged item gets no animation here; it
    /// follows the pointer.
    pub fn apply_intent(
        &mut self,
        intent: ReorderIntent,
        dragged_id: ItemId,
        geometry: &ListGeometry,
    ) -> Result<(), ReconcileError> {
        let found = self.sequence.get(intent.from).map(|item| item.id);
        if found != Some(dragged_id) && intent.from < self.sequence.len() {
            return Err(ReconcileError::StaleIntent {
                expected: dragged_id,
                index: intent.from,
                found,
            });
        }
        self.move_with_flip(intent.from, intent.to, dragged_id, geometry)?;
        debug!(item = %dragged_id, from = intent.from, to = intent.to, "sequence reordered");
        Ok(())
    }

    /// Drop: the dragged item springs from wherever the pointer left it into
    /// its final slot.
    pub fn settle_dragged(&mut self, session: &DragSession, geometry: &ListGeometry) {
        let Some(index) = self.sequence.position(session.dragged_id) else {
            warn!(item = %session.dragged_id, "dragged item vanished before settle");
            return;
        };
        let slot = slot_at(&geometry.layout(&self.sequence), index);
        self.animator
            .release_at(session.dragged_id, session.dragged_top() - slot.top);
    }

    /// Cancel: puts the dragged item back at `origin_index`, lets displaced
    /// siblings spring back toward their original slots and sends the dragged
    /// item home from the pointer position.
    pub fn revert(
        &mut self,
        session: &DragSession,
        geometry: &ListGeometry,
    ) -> Result<(), ReconcileError> {
        let id = session.dragged_id;
        let current = self
            .sequence
            .position(id)
            .ok_or(ReconcileError::MissingItem(id))?;
        self.move_with_flip(current, session.origin_index, id, geometry)?;

        let slot = slot_at(&geometry.layout(&self.sequence), session.origin_index);
        self.animator.release_at(id, session.dragged_top() - slot.top);
        debug!(item = %id, from = current, to = session.origin_index, "drag reverted");
        Ok(())
    }

    pub fn tick(&mut self, dt: Duration) -> bool {
        self.animator.tick(dt)
    }

    /// Replaces the whole sequence. Animations for ids that are gone are
    /// dropped; the rest keep running.
    pub fn replace(&mut self, items: Vec<OrderedItem>) {
        self.sequence = Sequence::from_unsorted(items);
        let stale: Vec<ItemId> = self
            .animator
            .animating_ids()
            .filter(|id| self.sequence.position(*id).is_none())
            .collect();
        for id in stale {
            self.animator.clear(id);
        }
    }

    /// Removes `id`; the items below it spring up into the freed space.
    pub fn remove(&mut self, id: ItemId, geometry: &ListGeometry) -> Option<OrderedItem> {
        let before: HashMap<ItemId, f32> = self
            .sequence
            .items()
            .iter()
            .zip(geometry.layout(&self.sequence))
            .map(|(item, slot)| (item.id, slot.top))
            .collect();
        let removed = self.sequence.remove(id)?;
        self.animator.clear(id);

        let after = geometry.layout(&self.sequence);
        for (item, slot) in self.sequence.items().iter().zip(after) {
            if let Some(old_top) = before.get(&item.id) {
                self.animator.slot_moved(item.id, slot.top - old_top);
            }
        }
        Some(removed)
    }

    fn move_with_flip(
        &mut self,
        from: usize,
        to: usize,
        dragged_id: ItemId,
        geometry: &ListGeometry,
    ) -> Result<(), ReconcileError> {
        let before = geometry.layout(&self.sequence);
        self.sequence.move_item(from, to)?;
        if from == to {
            return Ok(());
        }
        let after = geometry.layout(&self.sequence);

        let (lo, hi) = (from.min(to), from.max(to));
        // Siblings shift by one slot toward `from`.
        for new_index in lo..=hi {
            let Some(item) = self.sequence.get(new_index) else {
                continue;
            };
            if item.id == dragged_id {
                continue;
            }
            let old_index = if from < to { new_index + 1 } else { new_index - 1 };
            let delta = slot_at(&after, new_index).top - slot_at(&before, old_index).top;
            self.animator.slot_moved(item.id, delta);
        }
        Ok(())
    }
}

fn slot_at(slots: &[Span], index: usize) -> Span {
    slots
        .get(index)
        .copied()
        .unwrap_or_else(|| Span::new(0.0, 0.0))
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;

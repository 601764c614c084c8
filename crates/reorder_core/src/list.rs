use std::{collections::VecDeque, time::Duration};

use shared::domain::{ItemId, OrderKey, OrderedItem};
use tracing::{debug, warn};

use crate::{
    animation::SpringConfig,
    controller::{DragController, DragPhase, DragSession},
    events::{EngineEvent, HapticKind},
    geometry::{ListGeometry, Viewport},
    persistence::{CommitPlan, OrderPersistence},
    reconcile::Reconciler,
    Sequence,
};

/// What the presentation layer draws for one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemFrame {
    pub id: ItemId,
    pub index: usize,
    /// Top of the item's resting slot, in list coordinates.
    pub top: f32,
    pub height: f32,
    /// Visual displacement from `top`.
    pub offset: f32,
    pub is_dragging: bool,
}

impl ItemFrame {
    pub fn drawn_top(&self) -> f32 {
        self.top + self.offset
    }
}

/// A reorderable list: gesture input in, frames and events out.
///
/// Lives on the UI thread. Nothing here blocks; committing only hands a plan
/// to the persistence sink.
#[derive(Debug)]
pub struct ReorderList {
    controller: DragController,
    reconciler: Reconciler,
    geometry: ListGeometry,
    persistence: OrderPersistence,
    events: VecDeque<EngineEvent>,
}

impl ReorderList {
    pub fn new(
        items: Vec<OrderedItem>,
        geometry: ListGeometry,
        spring: SpringConfig,
        persistence: OrderPersistence,
    ) -> Self {
        Self {
            controller: DragController::new(),
            reconciler: Reconciler::new(Sequence::from_unsorted(items), spring),
            geometry,
            persistence,
            events: VecDeque::new(),
        }
    }

    pub fn sequence(&self) -> &Sequence {
        self.reconciler.sequence()
    }

    pub fn phase(&self) -> DragPhase {
        self.controller.phase()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.controller.session()
    }

    pub fn geometry(&self) -> &ListGeometry {
        &self.geometry
    }

    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.geometry.set_viewport(viewport);
    }

    pub fn set_row_height(&mut self, id: ItemId, height: f32) {
        self.geometry.set_height(id, height);
    }

    pub fn last_commit(&self) -> Option<&CommitPlan> {
        self.persistence.last_plan()
    }

    /// Newest committed order the store has not confirmed.
    pub fn pending_commit(&self) -> Option<&CommitPlan> {
        self.persistence.pending_plan()
    }

    /// Feed `PersistenceEvent::Committed` back here so later reloads trust
    /// the store again.
    pub fn acknowledge_commit(&mut self, generation: u64) {
        if self.persistence.acknowledge(generation) {
            debug!(generation, "commit acknowledged");
        }
    }

    /// Press-and-hold recognized on `item_id`. Returns whether a drag started.
    pub fn on_drag_start(&mut self, item_id: ItemId) -> bool {
        let Some(session) = self
            .controller
            .start(item_id, self.reconciler.sequence(), &self.geometry)
        else {
            return false;
        };
        let index = session.origin_index;
        self.events.push_back(EngineEvent::Lifted { id: item_id, index });
        self.events.push_back(EngineEvent::Haptic(HapticKind::Lift));
        true
    }

    /// Pointer moved vertically by `delta` since the previous move.
    pub fn on_drag_move(&mut self, delta: f32) {
        let Some(intent) =
            self.controller
                .update(delta, self.reconciler.sequence(), &self.geometry)
        else {
            return;
        };
        let Some(id) = self.controller.session().map(|s| s.dragged_id) else {
            return;
        };
        match self.reconciler.apply_intent(intent, id, &self.geometry) {
            Ok(()) => {
                self.events.push_back(EngineEvent::Reordered { id, intent });
                self.events.push_back(EngineEvent::Haptic(HapticKind::Reorder));
            }
            Err(err) => {
                warn!(item = %id, error = %err, "reorder intent rejected; cancelling drag");
                self.abort_session(err.to_string());
            }
        }
    }

    /// Released. Commits the current order and settles the dragged item.
    pub fn on_drag_end(&mut self) -> Option<CommitPlan> {
        let session = self.controller.finish()?;
        self.reconciler.settle_dragged(&session, &self.geometry);
        let index = self
            .reconciler
            .sequence()
            .position(session.dragged_id)
            .unwrap_or(session.current_index);

        let plan = self.persistence.commit(self.reconciler.sequence_mut());
        self.events.push_back(EngineEvent::Haptic(HapticKind::Drop));
        self.events.push_back(EngineEvent::Settling {
            id: session.dragged_id,
            index,
        });
        self.events
            .push_back(EngineEvent::CommitRequested(plan.clone()));
        Some(plan)
    }

    /// Gesture interrupted. Restores the pre-drag order; nothing is persisted.
    pub fn on_drag_cancel(&mut self) {
        let Some(session) = self.controller.abort() else {
            return;
        };
        if let Err(err) = self.reconciler.revert(&session, &self.geometry) {
            warn!(item = %session.dragged_id, error = %err, "could not revert cancelled drag");
        }
        self.events.push_back(EngineEvent::Haptic(HapticKind::Cancel));
        self.events.push_back(EngineEvent::Cancelled {
            id: session.dragged_id,
            origin_index: session.origin_index,
        });
    }

    /// Advances animations by one frame. Returns whether another frame is
    /// needed.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let animating = self.reconciler.tick(dt);
        if !animating {
            self.controller.settle();
        }
        animating || self.controller.is_dragging()
    }

    pub fn frames(&self) -> Vec<ItemFrame> {
        let sequence = self.reconciler.sequence();
        let session = self.controller.session();
        self.geometry
            .layout(sequence)
            .into_iter()
            .zip(sequence.items())
            .enumerate()
            .map(|(index, (slot, item))| {
                let dragged = session.filter(|s| s.dragged_id == item.id);
                let offset = match dragged {
                    Some(session) => session.dragged_top() - slot.top,
                    None => self.reconciler.offset(item.id),
                };
                ItemFrame {
                    id: item.id,
                    index,
                    top: slot.top,
                    height: slot.height,
                    offset,
                    is_dragging: dragged.is_some(),
                }
            })
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    /// Reloads the list from the store. An open drag is cancelled first so a
    /// stale session never outlives the data it was started on. While a
    /// commit is unconfirmed the store snapshot may predate it, so the
    /// arranged order is laid over the loaded records.
    pub fn replace_items(&mut self, items: Vec<OrderedItem>) {
        if self.controller.is_dragging() {
            debug!("cancelling active drag before reload");
            self.on_drag_cancel();
        }
        let items = match self.persistence.pending_plan() {
            Some(plan) => {
                debug!(
                    generation = plan.generation(),
                    "reload keeps the unconfirmed order"
                );
                plan.overlay(items)
            }
            None => items,
        };
        self.reconciler.replace(items);
    }

    /// Appends a record created outside a drag with key `max + 1`. Returns the
    /// key assigned in memory.
    pub fn insert_local(&mut self, mut item: OrderedItem) -> OrderKey {
        let key = self.reconciler.sequence().next_order_key();
        item.order_key = key;
        self.reconciler.sequence_mut().push(item);
        key
    }

    /// Mirrors an edit (title, tag, done) made through the store. Returns
    /// whether the record was present.
    pub fn update_local(&mut self, item: OrderedItem) -> bool {
        self.reconciler.sequence_mut().update_fields(item)
    }

    /// Drops `id` from the in-memory list. Any open drag is cancelled first:
    /// its indices describe the list as it was before the removal.
    pub fn remove_local(&mut self, id: ItemId) -> Option<OrderedItem> {
        if self.controller.is_dragging() {
            debug!(item = %id, "cancelling active drag before removal");
            self.on_drag_cancel();
        }
        let removed = self.reconciler.remove(id, &self.geometry);
        self.geometry.forget(id);
        removed
    }

    fn abort_session(&mut self, reason: String) {
        let Some(session) = self.controller.abort() else {
            return;
        };
        if let Err(err) = self.reconciler.revert(&session, &self.geometry) {
            warn!(item = %session.dragged_id, error = %err, "could not revert aborted drag");
        }
        self.events.push_back(EngineEvent::SessionAborted {
            id: session.dragged_id,
            reason,
        });
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;

//! Drag session state machine.
//!
//! The controller turns continuous pointer motion into discrete
//! [`ReorderIntent`]s. It never mutates the sequence itself; the caller applies
//! each intent through the reconciliation layer.

use shared::domain::ItemId;
use tracing::{debug, trace};

use crate::{
    geometry::{ListGeometry, Span},
    Sequence,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging,
    /// Released; the dragged item is settling into its final slot.
    Committing,
    /// Aborted; items are animating back to where the drag started.
    Cancelled,
}

/// Move the item at `from` so it ends up at `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderIntent {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub dragged_id: ItemId,
    pub origin_index: usize,
    /// Logical slot of the dragged item after the intents seen so far.
    pub current_index: usize,
    /// Top of the dragged item's slot when the drag started.
    pub origin_top: f32,
    pub height: f32,
    /// Accumulated vertical pointer displacement since the drag started.
    pub pointer_offset: f32,
    /// Sibling whose swap fired last; it cannot fire again until re-armed.
    pub last_triggered: Option<ItemId>,
    /// Where the dragged center is relative to `last_triggered`'s band.
    pub rearm: RearmState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSide {
    Above,
    Below,
}

/// Progress of the guarded sibling towards being re-armed.
///
/// The sibling re-arms when the center enters another sibling's band, or
/// when it leaves the guarded band through one edge and later shows up past
/// the opposite edge. Leaving and coming back through the same edge keeps it
/// suppressed. A swap that carries the sibling's band clear of the center
/// re-arms it straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RearmState {
    #[default]
    Inside,
    Exited(BandSide),
}

impl DragSession {
    /// Where the dragged item is drawn, following the raw pointer.
    pub fn dragged_top(&self) -> f32 {
        self.origin_top + self.pointer_offset
    }

    pub fn dragged_center(&self) -> f32 {
        self.dragged_top() + self.height * 0.5
    }
}

#[derive(Debug, Default)]
pub struct DragController {
    phase: DragPhase,
    session: Option<DragSession>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Opens a session for `item_id`. Returns `None` (and changes nothing) if
    /// a session is already open or the item is not in the sequence.
    pub fn start(
        &mut self,
        item_id: ItemId,
        sequence: &Sequence,
        geometry: &ListGeometry,
    ) -> Option<&DragSession> {
        if let Some(active) = &self.session {
            debug!(
                requested = %item_id,
                active = %active.dragged_id,
                "ignoring drag start while another drag is active"
            );
            return None;
        }
        let Some(origin_index) = sequence.position(item_id) else {
            debug!(item = %item_id, "ignoring drag start for unknown item");
            return None;
        };
        let slots = geometry.layout(sequence);
        let slot = slots[origin_index];

        self.phase = DragPhase::Dragging;
        self.session = Some(DragSession {
            dragged_id: item_id,
            origin_index,
            current_index: origin_index,
            origin_top: slot.top,
            height: slot.height,
            pointer_offset: 0.0,
            last_triggered: None,
            rearm: RearmState::Inside,
        });
        debug!(item = %item_id, origin_index, "drag started");
        self.session.as_ref()
    }

    /// Accumulates `delta` and returns the reorder the new pointer position
    /// calls for, if any. The session's `current_index` already reflects the
    /// returned intent.
    pub fn update(
        &mut self,
        delta: f32,
        sequence: &Sequence,
        geometry: &ListGeometry,
    ) -> Option<ReorderIntent> {
        let Some(session) = self.session.as_mut() else {
            trace!("ignoring drag move without an active session");
            return None;
        };
        if !delta.is_finite() {
            trace!(delta, "ignoring non-finite drag delta");
            return None;
        }
        session.pointer_offset += delta;

        let trigger = find_trigger(session, sequence, geometry)?;
        let intent = ReorderIntent {
            from: session.current_index,
            to: trigger.index,
        };
        session.current_index = trigger.index;
        session.rearm = RearmState::Inside;
        session.last_triggered = trigger
            .relocated
            .band_contains(session.dragged_center())
            .then_some(trigger.id);
        debug!(
            item = %session.dragged_id,
            from = intent.from,
            to = intent.to,
            sibling = %trigger.id,
            "reorder triggered"
        );
        Some(intent)
    }

    /// Ends the session successfully and enters [`DragPhase::Committing`].
    pub fn finish(&mut self) -> Option<DragSession> {
        let session = self.session.take()?;
        self.phase = DragPhase::Committing;
        Some(session)
    }

    /// Ends the session without committing and enters
    /// [`DragPhase::Cancelled`].
    pub fn abort(&mut self) -> Option<DragSession> {
        let session = self.session.take()?;
        self.phase = DragPhase::Cancelled;
        Some(session)
    }

    /// Returns to [`DragPhase::Idle`] once post-drag animations are done.
    /// No effect while a drag is in progress.
    pub fn settle(&mut self) {
        if self.session.is_none() {
            self.phase = DragPhase::Idle;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Trigger {
    index: usize,
    id: ItemId,
    /// The sibling's slot once the dragged item has swapped past it.
    relocated: Span,
}

/// Finds the sibling the dragged item should swap with.
///
/// Only visible siblings count. Moving down, the target is the furthest
/// sibling below whose band start the center has reached; moving up, the
/// furthest sibling above whose band end it has reached. For ordinary motion
/// that is exactly the band the center just entered; a fast sweep that skips
/// over whole bands in one update lands on the furthest swept sibling.
fn find_trigger(
    session: &mut DragSession,
    sequence: &Sequence,
    geometry: &ListGeometry,
) -> Option<Trigger> {
    let slots = geometry.layout(sequence);
    let current = session.current_index;
    if current >= slots.len() {
        return None;
    }
    let center = session.dragged_center();
    update_rearm(session, sequence, geometry, &slots, center);

    let below = slots[current + 1..]
        .iter()
        .enumerate()
        .take_while(|(_, span)| center >= span.band_start())
        .filter(|(_, span)| geometry.is_visible(span))
        .map(|(offset, _)| current + 1 + offset)
        .last();
    let above = slots[..current]
        .iter()
        .enumerate()
        .rev()
        .take_while(|(_, span)| center <= span.band_end())
        .filter(|(_, span)| geometry.is_visible(span))
        .map(|(index, _)| index)
        .last();

    let index = below.or(above)?;
    let id = sequence.get(index)?.id;
    if session.last_triggered == Some(id) {
        trace!(sibling = %id, "trigger suppressed until re-armed");
        return None;
    }
    let shift = if index > current {
        -session.height
    } else {
        session.height
    };
    let relocated = Span::new(slots[index].top + shift, slots[index].height);
    Some(Trigger {
        index,
        id,
        relocated,
    })
}

/// Advances the re-arm guard for the sibling that triggered last.
fn update_rearm(
    session: &mut DragSession,
    sequence: &Sequence,
    geometry: &ListGeometry,
    slots: &[Span],
    center: f32,
) {
    let Some(guarded) = session.last_triggered else {
        return;
    };
    let guarded_index = sequence.position(guarded);
    let guarded_span = guarded_index
        .and_then(|index| slots.get(index))
        .filter(|span| geometry.is_visible(span));
    let Some(span) = guarded_span else {
        release_guard(session);
        return;
    };
    let current = session.current_index;
    let in_other_band = slots.iter().enumerate().any(|(index, other)| {
        index != current
            && Some(index) != guarded_index
            && geometry.is_visible(other)
            && other.band_contains(center)
    });
    if in_other_band {
        release_guard(session);
        return;
    }

    let side = if center < span.band_start() {
        Some(BandSide::Above)
    } else if center > span.band_end() {
        Some(BandSide::Below)
    } else {
        None
    };
    let next = match (session.rearm, side) {
        (RearmState::Inside, Some(side)) => Some(RearmState::Exited(side)),
        (RearmState::Exited(exit), Some(side)) if exit != side => None,
        (state, _) => Some(state),
    };
    match next {
        Some(state) => session.rearm = state,
        None => release_guard(session),
    }
}

fn release_guard(session: &mut DragSession) {
    if let Some(sibling) = session.last_triggered.take() {
        trace!(sibling = %sibling, "trigger re-armed");
    }
    session.rearm = RearmState::Inside;
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

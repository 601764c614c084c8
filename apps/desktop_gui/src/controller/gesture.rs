//! Press-and-hold recognition for list rows.
//!
//! A press only becomes a reorder drag once the pointer has stayed within
//! `slop` of where it went down for `hold` seconds. Moving further first means
//! the user is scrolling or tapping, and the press is abandoned until release.

use shared::domain::ItemId;

pub const DEFAULT_HOLD_SECS: f64 = 0.35;
pub const DEFAULT_SLOP: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureAction {
    Lift(ItemId),
    Move(f32),
    Release,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GestureState {
    Idle,
    Pressed { id: ItemId, origin_y: f32, since: f64 },
    Dragging { last_y: f32 },
    /// Press turned into something else; wait for release.
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct GestureTracker {
    state: GestureState,
    hold_secs: f64,
    slop: f32,
}

impl Default for GestureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_SECS, DEFAULT_SLOP)
    }
}

impl GestureTracker {
    pub fn new(hold_secs: f64, slop: f32) -> Self {
        Self {
            state: GestureState::Idle,
            hold_secs,
            slop,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging { .. })
    }

    /// A press is waiting for the hold to elapse; the UI should keep
    /// repainting so the lift is not late.
    pub fn awaiting_hold(&self) -> bool {
        matches!(self.state, GestureState::Pressed { .. })
    }

    /// Primary button went down on row `id`. Ignored unless idle.
    pub fn press(&mut self, id: ItemId, y: f32, now: f64) {
        if self.state == GestureState::Idle {
            self.state = GestureState::Pressed {
                id,
                origin_y: y,
                since: now,
            };
        }
    }

    /// Feeds the pointer state for this frame. `y` is `None` when the pointer
    /// left the window.
    pub fn pointer(&mut self, y: Option<f32>, down: bool, now: f64) -> Option<GestureAction> {
        match self.state {
            GestureState::Idle => None,
            GestureState::Abandoned => {
                if !down {
                    self.state = GestureState::Idle;
                }
                None
            }
            GestureState::Pressed { id, origin_y, since } => {
                let Some(y) = y.filter(|_| down) else {
                    self.state = GestureState::Idle;
                    return None;
                };
                if (y - origin_y).abs() > self.slop {
                    self.state = GestureState::Abandoned;
                    return None;
                }
                if now - since >= self.hold_secs {
                    self.state = GestureState::Dragging { last_y: y };
                    return Some(GestureAction::Lift(id));
                }
                None
            }
            GestureState::Dragging { last_y } => {
                let Some(y) = y else {
                    self.state = GestureState::Idle;
                    return Some(GestureAction::Cancel);
                };
                if !down {
                    self.state = GestureState::Idle;
                    return Some(GestureAction::Release);
                }
                let delta = y - last_y;
                self.state = GestureState::Dragging { last_y: y };
                (delta != 0.0).then_some(GestureAction::Move(delta))
            }
        }
    }

    /// Escape, focus loss and similar interruptions.
    pub fn interrupt(&mut self) -> Option<GestureAction> {
        let was_dragging = self.is_dragging();
        self.state = match self.state {
            GestureState::Idle => GestureState::Idle,
            _ => GestureState::Abandoned,
        };
        was_dragging.then_some(GestureAction::Cancel)
    }

    /// Forgets any gesture, e.g. when the engine refused to start a drag.
    pub fn reset(&mut self) {
        self.state = GestureState::Abandoned;
    }
}

//! Keyed spring animations for per-item visual offsets.
//!
//! Each item that is displaced from its resting slot gets a [`Spring`] whose
//! position is the item's visual offset in pixels and whose target is always
//! `0.0` (the slot itself). Displacements are applied to the spring's current
//! position, so an item that is already mid-flight is retargeted from where it
//! is drawn right now instead of restarting a precomputed curve.
//!
//! Springs are integrated with semi-implicit Euler and large frame deltas are
//! subdivided, which keeps high stiffness values stable.

use std::{collections::HashMap, time::Duration};

use serde::Deserialize;
use shared::domain::ItemId;

/// Largest integration step; longer frames are split.
const MAX_STEP_SECS: f32 = 0.004;
/// Offset (px) below which a spring may come to rest.
const REST_DISTANCE: f32 = 0.05;
/// Velocity (px/s) below which a spring may come to rest.
const REST_VELOCITY: f32 = 0.5;
const MIN_STIFFNESS: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    pub stiffness: f32,
    pub damping: f32,
}

impl SpringConfig {
    /// Critically damped spring for the given stiffness: fastest convergence
    /// with no overshoot.
    pub fn critical(stiffness: f32) -> Self {
        let stiffness = stiffness.max(MIN_STIFFNESS);
        Self {
            stiffness,
            damping: 2.0 * stiffness.sqrt(),
        }
    }

    fn sanitized(self) -> Self {
        Self {
            stiffness: self.stiffness.max(MIN_STIFFNESS),
            damping: self.damping.max(0.0),
        }
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::critical(400.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    position: f32,
    velocity: f32,
    config: SpringConfig,
    at_rest: bool,
}

impl Spring {
    pub fn new(position: f32, config: SpringConfig) -> Self {
        Self {
            position,
            velocity: 0.0,
            config: config.sanitized(),
            at_rest: position.abs() < REST_DISTANCE,
        }
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn is_at_rest(&self) -> bool {
        self.at_rest
    }

    /// Shifts the spring by `delta` while keeping its velocity.
    pub fn displace(&mut self, delta: f32) {
        self.position += delta;
        self.at_rest = false;
    }

    /// Restarts from `position` with no velocity.
    pub fn jump_to(&mut self, position: f32) {
        self.position = position;
        self.velocity = 0.0;
        self.at_rest = false;
    }

    fn step(&mut self, dt: f32) {
        let acceleration =
            -self.config.stiffness * self.position - self.config.damping * self.velocity;
        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;
    }

    pub fn advance(&mut self, dt: Duration) {
        if self.at_rest {
            return;
        }
        let mut remaining = dt.as_secs_f32();
        while remaining > 0.0 {
            let step = remaining.min(MAX_STEP_SECS);
            self.step(step);
            remaining -= step;
        }
        if self.position.abs() < REST_DISTANCE && self.velocity.abs() < REST_VELOCITY {
            self.position = 0.0;
            self.velocity = 0.0;
            self.at_rest = true;
        }
    }
}

/// Visual offsets keyed by item id. Items without a spring are drawn exactly
/// at their slot.
#[derive(Debug, Clone, Default)]
pub struct OffsetAnimator {
    config: SpringConfig,
    springs: HashMap<ItemId, Spring>,
}

impl OffsetAnimator {
    pub fn new(config: SpringConfig) -> Self {
        Self {
            config: config.sanitized(),
            springs: HashMap::new(),
        }
    }

    pub fn offset(&self, id: ItemId) -> f32 {
        self.springs.get(&id).map_or(0.0, Spring::position)
    }

    pub fn spring(&self, id: ItemId) -> Option<&Spring> {
        self.springs.get(&id)
    }

    /// Called when `id`'s resting slot moved by `slot_delta`; the item keeps
    /// its on-screen position and then springs toward the new slot.
    pub fn slot_moved(&mut self, id: ItemId, slot_delta: f32) {
        if slot_delta == 0.0 {
            return;
        }
        let config = self.config;
        self.springs
            .entry(id)
            .or_insert_with(|| Spring::new(0.0, config))
            .displace(-slot_delta);
    }

    /// Places `id` at `offset` from its slot and lets it settle from there.
    /// Used for the dragged item when it is released.
    pub fn release_at(&mut self, id: ItemId, offset: f32) {
        let config = self.config;
        self.springs
            .entry(id)
            .or_insert_with(|| Spring::new(0.0, config))
            .jump_to(offset);
    }

    /// Drops any animation on `id`; it is drawn at its slot immediately.
    pub fn clear(&mut self, id: ItemId) {
        self.springs.remove(&id);
    }

    pub fn clear_all(&mut self) {
        self.springs.clear();
    }

    /// Advances every spring and forgets the ones that came to rest. Returns
    /// whether anything is still moving.
    pub fn tick(&mut self, dt: Duration) -> bool {
        for spring in self.springs.values_mut() {
            spring.advance(dt);
        }
        self.springs.retain(|_, spring| !spring.is_at_rest());
        !self.springs.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.springs.is_empty()
    }

    pub fn animating_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.springs.keys().copied()
    }
}

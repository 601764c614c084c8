//! Controller layer: UI events, gesture recognition, and command orchestration.

pub mod events;
pub mod gesture;
pub mod orchestration;

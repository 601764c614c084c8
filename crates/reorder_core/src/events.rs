//! Events emitted to the presentation layer.

use shared::{domain::ItemId, error::StoreError};

use crate::{controller::ReorderIntent, persistence::CommitPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticKind {
    Lift,
    Reorder,
    Drop,
    Cancel,
}

/// Synchronous engine events, drained by the UI after each input or frame.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Elevate the item under the pointer.
    Lifted { id: ItemId, index: usize },
    Haptic(HapticKind),
    Reordered { id: ItemId, intent: ReorderIntent },
    /// The dragged item was released and is settling into `index`.
    Settling { id: ItemId, index: usize },
    Cancelled { id: ItemId, origin_index: usize },
    /// The session hit an invariant violation and was reverted.
    SessionAborted { id: ItemId, reason: String },
    CommitRequested(CommitPlan),
}

/// Results from the background commit worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceEvent {
    Committed { generation: u64 },
    Retrying {
        generation: u64,
        attempt: u32,
        error: StoreError,
    },
    /// Every attempt failed. The plan is kept and replayed unchanged by
    /// [`CommitHandle::retry`](crate::CommitHandle::retry).
    CommitFailed { generation: u64, error: StoreError },
}

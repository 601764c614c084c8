use shared::domain::ItemId;
use thiserror::Error;

/// Invariant violations detected while applying reorder intents. Any of these
/// ends the active drag session; none of them is allowed to touch the
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("reorder intent {from} -> {to} is outside a sequence of {len} items")]
    IndexOutOfBounds { from: usize, to: usize, len: usize },
    #[error("reorder intent expected item {expected} at index {index}, found {found:?}")]
    StaleIntent {
        expected: ItemId,
        index: usize,
        found: Option<ItemId>,
    },
    #[error("dragged item {0} is no longer in the sequence")]
    MissingItem(ItemId),
}

//! Drag-to-reorder engine for an ordered list of records.
//!
//! Pointer input flows through [`controller::DragController`], which turns
//! motion into discrete [`ReorderIntent`]s. The [`reconcile::Reconciler`]
//! applies them to the in-memory [`Sequence`] and keeps keyed offset
//! animations in step, and [`persistence::OrderPersistence`] hands the final
//! order to a [`RecordStore`] as one dense, atomic re-key. [`ReorderList`]
//! wires the three together for a presentation layer.

pub mod animation;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod geometry;
mod list;
pub mod persistence;
pub mod reconcile;
mod sequence;
pub mod worker;

pub use controller::{BandSide, DragPhase, DragSession, RearmState, ReorderIntent};
pub use events::{EngineEvent, HapticKind, PersistenceEvent};
pub use geometry::{ListGeometry, Span, Viewport};
pub use list::{ItemFrame, ReorderList};
pub use persistence::{CommitPlan, CommitSink, OrderPersistence, RecordStore};
pub use sequence::Sequence;
pub use worker::{CommitHandle, RetryPolicy};

#[cfg(test)]
pub(crate) mod test_support {
    use shared::domain::{ItemId, OrderKey, OrderedItem};

    use crate::Sequence;

    pub fn item(id: i64, key: i64) -> OrderedItem {
        OrderedItem {
            id: ItemId(id),
            order_key: OrderKey(key),
            title: format!("item {id}"),
            tag: None,
            done: false,
            created_at: Default::default(),
        }
    }

    /// Sequence of ids `1..=count` with dense keys.
    pub fn sequence(count: i64) -> Sequence {
        Sequence::from_unsorted((1..=count).map(|id| item(id, id - 1)).collect())
    }

    pub fn ids(sequence: &Sequence) -> Vec<i64> {
        sequence.items().iter().map(|item| item.id.0).collect()
    }
}

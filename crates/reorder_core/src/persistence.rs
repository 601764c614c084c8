//! Order persistence: turns the final sequence into one dense, atomic re-key.

use std::collections::BTreeMap;

use async_trait::async_trait;
use shared::{
    domain::{ItemId, NewRecord, OrderKey, OrderedItem},
    error::StoreError,
};
use tracing::{debug, info};

use crate::Sequence;

/// The durable record store the engine depends on.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records ordered by order key, ties broken by the store.
    async fn list(&self) -> Result<Vec<OrderedItem>, StoreError>;

    /// Applies every mapping or none of them.
    async fn batch_update_order_keys(
        &self,
        mapping: &[(ItemId, OrderKey)],
    ) -> Result<(), StoreError>;

    /// Inserts a record with order key `max(existing) + 1`.
    async fn insert(&self, record: NewRecord) -> Result<ItemId, StoreError>;
}

/// A dense re-key of a whole sequence. The assignments are a pure function of
/// the sequence order, so replaying a plan is always safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPlan {
    generation: u64,
    assignments: Vec<(ItemId, OrderKey)>,
}

impl CommitPlan {
    pub fn dense(generation: u64, sequence: &Sequence) -> Self {
        let assignments = sequence
            .items()
            .iter()
            .enumerate()
            .map(|(index, item)| (item.id, OrderKey::dense(index)))
            .collect();
        Self {
            generation,
            assignments,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn assignments(&self) -> &[(ItemId, OrderKey)] {
        &self.assignments
    }

    pub fn as_map(&self) -> BTreeMap<ItemId, OrderKey> {
        self.assignments.iter().copied().collect()
    }

    /// Assignments that differ from the keys currently held by `items`.
    pub fn changed_from(&self, items: &[OrderedItem]) -> Vec<(ItemId, OrderKey)> {
        let current: BTreeMap<ItemId, OrderKey> =
            items.iter().map(|item| (item.id, item.order_key)).collect();
        self.assignments
            .iter()
            .filter(|(id, key)| current.get(id) != Some(key))
            .copied()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Lays this plan's order over a fresh snapshot from the store. Records
    /// the plan covers take their planned key; records it has never seen
    /// follow them in their stored order.
    pub fn overlay(&self, mut items: Vec<OrderedItem>) -> Vec<OrderedItem> {
        let planned = self.as_map();
        let first_unplanned = self.assignments.len() as i64;
        items.sort_by_key(|item| item.sort_key());

        let unplanned = items
            .iter_mut()
            .filter(|item| !planned.contains_key(&item.id));
        for (rank, item) in unplanned.enumerate() {
            item.order_key = OrderKey(first_unplanned + rank as i64);
        }
        for item in &mut items {
            if let Some(key) = planned.get(&item.id) {
                item.order_key = *key;
            }
        }
        items
    }
}

/// Receives commit plans. Implementations must not block the caller.
pub trait CommitSink {
    fn submit(&self, plan: CommitPlan);
}

/// Sink that drops every plan; for lists that are never persisted.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedSink;

impl CommitSink for DetachedSink {
    fn submit(&self, plan: CommitPlan) {
        debug!(generation = plan.generation(), "commit dropped by detached sink");
    }
}

pub struct OrderPersistence {
    sink: Box<dyn CommitSink + Send>,
    next_generation: u64,
    last_plan: Option<CommitPlan>,
    /// Newest plan the store has not confirmed yet.
    pending: Option<CommitPlan>,
}

impl OrderPersistence {
    pub fn new(sink: impl CommitSink + Send + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            next_generation: 1,
            last_plan: None,
            pending: None,
        }
    }

    pub fn detached() -> Self {
        Self::new(DetachedSink)
    }

    /// Re-keys `sequence` densely in memory and submits the matching plan.
    pub fn commit(&mut self, sequence: &mut Sequence) -> CommitPlan {
        let plan = CommitPlan::dense(self.next_generation, sequence);
        self.next_generation += 1;

        let changed = plan.changed_from(sequence.items()).len();
        sequence.rekey_dense();
        info!(
            generation = plan.generation(),
            items = plan.assignments().len(),
            changed,
            "commit requested"
        );
        self.sink.submit(plan.clone());
        self.last_plan = Some(plan.clone());
        self.pending = Some(plan.clone());
        plan
    }

    pub fn last_plan(&self) -> Option<&CommitPlan> {
        self.last_plan.as_ref()
    }

    /// The newest plan still waiting for the store, including one whose
    /// write failed and awaits a retry.
    pub fn pending_plan(&self) -> Option<&CommitPlan> {
        self.pending.as_ref()
    }

    /// Records that the store holds `generation`. Confirming an older
    /// generation leaves a newer pending plan in place. Returns whether the
    /// pending plan was cleared.
    pub fn acknowledge(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some(plan) if plan.generation() <= generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for OrderPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPersistence")
            .field("next_generation", &self.next_generation)
            .field("last_plan", &self.last_plan)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::test_support::{item, sequence};

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<CommitPlan>>>);

    impl CommitSink for RecordingSink {
        fn submit(&self, plan: CommitPlan) {
            self.0.lock().expect("sink lock").push(plan);
        }
    }

    #[test]
    fn dense_plan_assigns_index_keys() {
        let mut seq = sequence(4);
        seq.move_item(0, 2).expect("move");
        let plan = CommitPlan::dense(1, &seq);
        assert_eq!(
            plan.assignments(),
            &[
                (ItemId(2), OrderKey(0)),
                (ItemId(3), OrderKey(1)),
                (ItemId(1), OrderKey(2)),
                (ItemId(4), OrderKey(3)),
            ]
        );
    }

    #[test]
    fn changed_from_skips_rows_already_in_place() {
        let mut seq = sequence(4);
        seq.move_item(0, 1).expect("move");
        let plan = CommitPlan::dense(1, &seq);
        assert_eq!(
            plan.changed_from(seq.items()),
            vec![(ItemId(2), OrderKey(0)), (ItemId(1), OrderKey(1))]
        );
    }

    #[test]
    fn commit_rekeys_sequence_and_submits() {
        let sink = RecordingSink::default();
        let mut persistence = OrderPersistence::new(sink.clone());
        let mut seq = Sequence::from_unsorted(vec![item(1, 10), item(2, 20), item(3, 35)]);

        let plan = persistence.commit(&mut seq);

        let keys: Vec<i64> = seq.items().iter().map(|i| i.order_key.0).collect();
        assert_eq!(keys, vec![0, 1, 2]);
        assert_eq!(sink.0.lock().expect("sink lock").as_slice(), &[plan.clone()]);
        assert_eq!(persistence.last_plan(), Some(&plan));
    }

    #[test]
    fn repeated_commit_yields_identical_assignments() {
        let sink = RecordingSink::default();
        let mut persistence = OrderPersistence::new(sink.clone());
        let mut seq = sequence(4);
        seq.move_item(0, 2).expect("move");

        let first = persistence.commit(&mut seq);
        let second = persistence.commit(&mut seq);

        assert_eq!(first.assignments(), second.assignments());
        assert!(second.generation() > first.generation());
        assert!(second.changed_from(seq.items()).is_empty());
    }

    #[test]
    fn acknowledge_clears_only_up_to_the_pending_generation() {
        let mut persistence = OrderPersistence::detached();
        let mut seq = sequence(3);

        let first = persistence.commit(&mut seq);
        let second = persistence.commit(&mut seq);
        assert_eq!(persistence.pending_plan(), Some(&second));

        assert!(!persistence.acknowledge(first.generation()));
        assert_eq!(persistence.pending_plan(), Some(&second));
        assert!(persistence.acknowledge(second.generation()));
        assert!(persistence.pending_plan().is_none());
        assert_eq!(persistence.last_plan(), Some(&second));
    }

    #[test]
    fn overlay_keeps_planned_order_and_appends_unknown_records() {
        let mut seq = sequence(3);
        seq.move_item(0, 2).expect("move");
        let plan = CommitPlan::dense(1, &seq);

        // Store still has the old keys, lost item 3 and gained item 7.
        let stored = vec![item(1, 0), item(2, 1), item(7, 3)];
        let overlaid = Sequence::from_unsorted(plan.overlay(stored));

        let ids: Vec<i64> = overlaid.items().iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![2, 1, 7]);
    }
}

use super::*;
use crate::{
    controller::RearmState,
    test_support::{ids, sequence},
};

const ROW: f32 = 40.0;
const FRAME: Duration = Duration::from_millis(16);

fn reconciler(count: i64) -> Reconciler {
    Reconciler::new(sequence(count), SpringConfig::default())
}

fn session(dragged: i64, origin_index: usize, current_index: usize, pointer_offset: f32) -> DragSession {
    DragSession {
        dragged_id: ItemId(dragged),
        origin_index,
        current_index,
        origin_top: origin_index as f32 * ROW,
        height: ROW,
        pointer_offset,
        last_triggered: None,
        rearm: RearmState::Inside,
    }
}

#[test]
fn displaced_sibling_keeps_its_visual_position() {
    let geometry = ListGeometry::uniform(ROW);
    let mut reconciler = reconciler(4);

    reconciler
        .apply_intent(ReorderIntent { from: 0, to: 1 }, ItemId(1), &geometry)
        .expect("apply");

    assert_eq!(ids(reconciler.sequence()), vec![2, 1, 3, 4]);
    // B's slot moved up by a row; it is still drawn where it was.
    assert_eq!(reconciler.offset(ItemId(2)), ROW);
    // The dragged item follows the pointer, not a spring.
    assert!(reconciler.animator().spring(ItemId(1)).is_none());
    assert!(reconciler.animator().spring(ItemId(3)).is_none());
}

#[test]
fn multi_slot_intent_animates_whole_range() {
    let geometry = ListGeometry::uniform(ROW);
    let mut reconciler = reconciler(5);

    reconciler
        .apply_intent(ReorderIntent { from: 4, to: 1 }, ItemId(5), &geometry)
        .expect("apply");

    assert_eq!(ids(reconciler.sequence()), vec![1, 5, 2, 3, 4]);
    for id in [2, 3, 4] {
        assert_eq!(reconciler.offset(ItemId(id)), -ROW, "item {id}");
    }
    assert_eq!(reconciler.offset(ItemId(1)), 0.0);
}

#[test]
fn second_intent_retargets_from_mid_flight() {
    let geometry = ListGeometry::uniform(ROW);
    let mut reconciler = reconciler(3);

    reconciler
        .apply_intent(ReorderIntent { from: 0, to: 1 }, ItemId(1), &geometry)
        .expect("down");
    reconciler.tick(FRAME);
    let mid_flight = reconciler.offset(ItemId(2));
    assert!(mid_flight > 0.0 && mid_flight < ROW);

    reconciler
        .apply_intent(ReorderIntent { from: 1, to: 0 }, ItemId(1), &geometry)
        .expect("back up");
    assert_eq!(ids(reconciler.sequence()), vec![1, 2, 3]);
    let retargeted = reconciler.offset(ItemId(2));
    assert!((retargeted - (mid_flight - ROW)).abs() < 1e-4);
}

#[test]
fn stale_intent_is_rejected_without_touching_sequence() {
    let geometry = ListGeometry::uniform(ROW);
    let mut reconciler = reconciler(3);
    let before = reconciler.sequence().clone();

    let err = reconciler
        .apply_intent(ReorderIntent { from: 1, to: 2 }, ItemId(1), &geometry)
        .expect_err("stale");
    assert_eq!(
        err,
        ReconcileError::StaleIntent {
            expected: ItemId(1),
            index: 1,
            found: Some(ItemId(2)),
        }
    );

    let err = reconciler
        .apply_intent(ReorderIntent { from: 0, to: 7 }, ItemId(1), &geometry)
        .expect_err("out of bounds");
    assert!(matches!(err, ReconcileError::IndexOutOfBounds { len: 3, .. }));
    assert_eq!(reconciler.sequence(), &before);
    assert!(reconciler.animator().is_idle());
}

#[test]
fn settle_releases_dragged_item_from_pointer_position() {
    let geometry = ListGeometry::uniform(ROW);
    let mut reconciler = reconciler(4);
    reconciler
        .apply_intent(ReorderIntent { from: 0, to: 2 }, ItemId(1), &geometry)
        .expect("apply");

    reconciler.settle_dragged(&session(1, 0, 2, 95.0), &geometry);
    assert_eq!(reconciler.offset(ItemId(1)), 15.0);

    for _ in 0..200 {
        reconciler.tick(FRAME);
    }
    assert!(reconciler.animator().is_idle());
    assert_eq!(reconciler.offset(ItemId(1)), 0.0);
}

#[test]
fn revert_restores_order_and_springs_back_to_zero() {
    let geometry = ListGeometry::uniform(ROW);
    let mut reconciler = reconciler(4);
    let original = reconciler.sequence().clone();
    reconciler
        .apply_intent(ReorderIntent { from: 0, to: 1 }, ItemId(1), &geometry)
        .expect("first");
    reconciler
        .apply_intent(ReorderIntent { from: 1, to: 2 }, ItemId(1), &geometry)
        .expect("second");

    reconciler
        .revert(&session(1, 0, 2, 90.0), &geometry)
        .expect("revert");
    assert_eq!(reconciler.sequence(), &original);
    assert_eq!(reconciler.offset(ItemId(1)), 90.0);

    for _ in 0..200 {
        reconciler.tick(FRAME);
    }
    for id in 1..=4 {
        assert_eq!(reconciler.offset(ItemId(id)), 0.0, "item {id}");
    }
}

#[test]
fn replace_drops_animations_for_removed_items() {
    let geometry = ListGeometry::uniform(ROW);
    let mut reconciler = reconciler(3);
    reconciler
        .apply_intent(ReorderIntent { from: 0, to: 2 }, ItemId(1), &geometry)
        .expect("apply");

    let remaining: Vec<_> = reconciler
        .sequence()
        .items()
        .iter()
        .filter(|item| item.id != ItemId(2))
        .cloned()
        .collect();
    reconciler.replace(remaining);

    assert!(reconciler.animator().spring(ItemId(2)).is_none());
    assert!(reconciler.animator().spring(ItemId(3)).is_some());
}

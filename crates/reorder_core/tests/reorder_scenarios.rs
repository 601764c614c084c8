//! End-to-end drag sessions against an in-memory store and the real commit
//! worker.

mod common;

use std::{sync::Arc, time::Duration};

use common::{outcome, MemoryStore, ROW};
use reorder_core::{
    animation::SpringConfig, CommitHandle, DragPhase, ListGeometry, OrderPersistence,
    PersistenceEvent, RecordStore, ReorderList, RetryPolicy,
};
use shared::{
    domain::{ItemId, NewRecord},
    error::StoreError,
};
use tokio::runtime::Handle;

const FRAME: Duration = Duration::from_millis(16);

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(1),
    }
}

async fn open_list(store: &Arc<MemoryStore>, attempts: u32) -> (ReorderList, CommitHandle) {
    let (handle, _task) = CommitHandle::spawn(store.clone(), policy(attempts), &Handle::current());
    let items = store.list().await.expect("load");
    let list = ReorderList::new(
        items,
        ListGeometry::uniform(ROW),
        SpringConfig::default(),
        OrderPersistence::new(handle.clone()),
    );
    (list, handle)
}

fn titles(list: &ReorderList) -> Vec<String> {
    list.sequence()
        .items()
        .iter()
        .map(|item| item.title.clone())
        .collect()
}

#[tokio::test]
async fn drag_first_item_down_two_slots_persists_new_order() {
    let store = Arc::new(MemoryStore::with_titles(&["A", "B", "C", "D"]));
    let (mut list, handle) = open_list(&store, 3).await;
    let mut events = handle.subscribe();

    assert!(list.on_drag_start(ItemId(1)));
    list.on_drag_move(30.0);
    list.on_drag_move(40.0);
    assert_eq!(titles(&list), ["B", "C", "A", "D"]);
    list.on_drag_end().expect("commit plan");

    assert!(matches!(
        outcome(&mut events).await,
        PersistenceEvent::Committed { generation: 1 }
    ));
    assert_eq!(
        store.keys(),
        [
            ("B".to_string(), 0),
            ("C".to_string(), 1),
            ("A".to_string(), 2),
            ("D".to_string(), 3),
        ]
    );

    // A fresh load sees the committed order.
    let reloaded = ReorderList::new(
        store.list().await.expect("reload"),
        ListGeometry::uniform(ROW),
        SpringConfig::default(),
        OrderPersistence::detached(),
    );
    assert_eq!(titles(&reloaded), ["B", "C", "A", "D"]);
}

#[tokio::test]
async fn cancelled_drag_writes_nothing() {
    let store = Arc::new(MemoryStore::with_titles(&["A", "B", "C", "D"]));
    let (mut list, _handle) = open_list(&store, 3).await;

    list.on_drag_start(ItemId(1));
    list.on_drag_move(30.0);
    list.on_drag_cancel();

    assert_eq!(titles(&list), ["A", "B", "C", "D"]);
    while list.tick(FRAME) {}
    assert_eq!(list.phase(), DragPhase::Idle);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.batches(), 0);
    assert_eq!(store.titles_in_order(), ["A", "B", "C", "D"]);
}

#[tokio::test]
async fn failed_commit_keeps_local_order_and_replays_on_retry() {
    let store = Arc::new(MemoryStore::with_titles(&["A", "B", "C", "D"]));
    store.fail_next([
        StoreError::Unavailable("database is locked".into()),
        StoreError::Unavailable("database is locked".into()),
    ]);
    let (mut list, handle) = open_list(&store, 2).await;
    let mut events = handle.subscribe();

    // Drag D up to the top.
    list.on_drag_start(ItemId(4));
    list.on_drag_move(-30.0);
    list.on_drag_move(-40.0);
    list.on_drag_move(-40.0);
    assert_eq!(titles(&list), ["D", "A", "B", "C"]);
    list.on_drag_end();

    assert!(matches!(
        outcome(&mut events).await,
        PersistenceEvent::CommitFailed { generation: 1, .. }
    ));
    // The view does not snap back; storage still has the old order.
    assert_eq!(titles(&list), ["D", "A", "B", "C"]);
    assert_eq!(store.titles_in_order(), ["A", "B", "C", "D"]);

    handle.retry();
    assert_eq!(
        outcome(&mut events).await,
        PersistenceEvent::Committed { generation: 1 }
    );
    assert_eq!(store.titles_in_order(), ["D", "A", "B", "C"]);
}

#[tokio::test]
async fn inserted_record_lands_after_reordered_items() {
    let store = Arc::new(MemoryStore::with_titles(&["A", "B", "C"]));
    let (mut list, handle) = open_list(&store, 3).await;
    let mut events = handle.subscribe();

    list.on_drag_start(ItemId(3));
    list.on_drag_move(-30.0);
    list.on_drag_end();
    assert!(matches!(
        outcome(&mut events).await,
        PersistenceEvent::Committed { .. }
    ));

    store
        .insert(NewRecord::new("E"))
        .await
        .expect("insert");
    list.replace_items(store.list().await.expect("reload"));

    assert_eq!(titles(&list), ["A", "C", "B", "E"]);
    assert_eq!(store.titles_in_order(), ["A", "C", "B", "E"]);
}

#[tokio::test]
async fn reload_and_delete_while_a_commit_is_failing_still_converge() {
    let store = Arc::new(MemoryStore::with_titles(&["A", "B", "C", "D"]));
    store.fail_next([
        StoreError::Unavailable("database is locked".into()),
        StoreError::Unavailable("database is locked".into()),
    ]);
    let (mut list, handle) = open_list(&store, 2).await;
    let mut events = handle.subscribe();

    list.on_drag_start(ItemId(1));
    list.on_drag_move(30.0);
    list.on_drag_move(40.0);
    list.on_drag_end();
    assert!(matches!(
        outcome(&mut events).await,
        PersistenceEvent::CommitFailed { generation: 1, .. }
    ));

    // Reload from a store that still has the old order, then lose B.
    list.replace_items(store.list().await.expect("reload"));
    assert_eq!(titles(&list), ["B", "C", "A", "D"]);
    store.remove("B");
    list.remove_local(ItemId(2));

    handle.retry();
    let PersistenceEvent::Committed { generation } = outcome(&mut events).await else {
        panic!("retry should commit");
    };
    list.acknowledge_commit(generation);
    assert!(list.pending_commit().is_none());

    list.replace_items(store.list().await.expect("reload"));
    assert_eq!(titles(&list), ["C", "A", "D"]);
    assert_eq!(store.titles_in_order(), ["C", "A", "D"]);
}

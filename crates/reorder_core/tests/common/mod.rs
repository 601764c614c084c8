//! In-memory record store shared by the integration tests.

#![allow(dead_code)]

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reorder_core::{PersistenceEvent, RecordStore};
use shared::{
    domain::{ItemId, NewRecord, OrderKey, OrderedItem},
    error::StoreError,
};
use tokio::{sync::broadcast, time::timeout};

pub const ROW: f32 = 40.0;

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    items: Vec<OrderedItem>,
    next_id: i64,
    failures: VecDeque<StoreError>,
    batches: usize,
}

impl MemoryStore {
    /// Store holding `titles` with dense keys in the given order.
    pub fn with_titles(titles: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.lock().expect("store lock");
            for (index, title) in titles.iter().enumerate() {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.items.push(OrderedItem {
                    id: ItemId(id),
                    order_key: OrderKey(index as i64),
                    title: (*title).to_string(),
                    tag: None,
                    done: false,
                    created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
                });
            }
        }
        store
    }

    /// Queues errors returned by the next batch writes, one per call.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.inner
            .lock()
            .expect("store lock")
            .failures
            .extend(errors);
    }

    pub fn remove(&self, title: &str) {
        self.inner
            .lock()
            .expect("store lock")
            .items
            .retain(|item| item.title != title);
    }

    pub fn batches(&self) -> usize {
        self.inner.lock().expect("store lock").batches
    }

    /// Titles sorted the way a fresh load would order them.
    pub fn titles_in_order(&self) -> Vec<String> {
        let mut items = self.inner.lock().expect("store lock").items.clone();
        items.sort_by_key(OrderedItem::sort_key);
        items.into_iter().map(|item| item.title).collect()
    }

    pub fn keys(&self) -> Vec<(String, i64)> {
        let mut items = self.inner.lock().expect("store lock").items.clone();
        items.sort_by_key(OrderedItem::sort_key);
        items
            .into_iter()
            .map(|item| (item.title, item.order_key.0))
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self) -> Result<Vec<OrderedItem>, StoreError> {
        Ok(self.inner.lock().expect("store lock").items.clone())
    }

    async fn batch_update_order_keys(
        &self,
        mapping: &[(ItemId, OrderKey)],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.batches += 1;
        if let Some(err) = inner.failures.pop_front() {
            return Err(err);
        }
        for (id, key) in mapping {
            if let Some(item) = inner.items.iter_mut().find(|item| item.id == *id) {
                item.order_key = *key;
            }
        }
        Ok(())
    }

    async fn insert(&self, record: NewRecord) -> Result<ItemId, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.next_id += 1;
        let id = ItemId(inner.next_id);
        let order_key = inner
            .items
            .iter()
            .map(|item| item.order_key)
            .max()
            .map_or(OrderKey(0), OrderKey::next);
        inner.items.push(OrderedItem {
            id,
            order_key,
            title: record.title,
            tag: record.tag,
            done: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }
}

pub async fn next_event(rx: &mut broadcast::Receiver<PersistenceEvent>) -> PersistenceEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("persistence event before timeout")
        .expect("event channel open")
}

/// Waits past any retry notices for the final outcome of a commit.
pub async fn outcome(rx: &mut broadcast::Receiver<PersistenceEvent>) -> PersistenceEvent {
    loop {
        match next_event(rx).await {
            PersistenceEvent::Retrying { .. } => continue,
            other => return other,
        }
    }
}

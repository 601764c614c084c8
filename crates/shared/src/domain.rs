use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ItemId);
id_newtype!(OrderKey);

impl OrderKey {
    /// Key for the item at `index` under dense re-keying.
    pub fn dense(index: usize) -> Self {
        Self(index as i64)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A to-do record as the list engine sees it: the application fields plus the
/// `id`/`order_key` pair the reorder core owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub id: ItemId,
    pub order_key: OrderKey,
    pub title: String,
    pub tag: Option<String>,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

impl OrderedItem {
    /// Sort key used everywhere a sequence is materialized: order key first,
    /// then creation time, then id so ties are always resolved the same way.
    pub fn sort_key(&self) -> (OrderKey, DateTime<Utc>, ItemId) {
        (self.order_key, self.created_at, self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub title: String,
    pub tag: Option<String>,
}

impl NewRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Partial update for the CRUD glue. `None` leaves a field untouched;
/// `tag: Some(None)` clears the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub tag: Option<Option<String>>,
    pub done: Option<bool>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tag.is_none() && self.done.is_none()
    }
}

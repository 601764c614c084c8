use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reorder_core::RecordStore;
use sqlx::{
    error::ErrorKind,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

use shared::{
    domain::{ItemId, NewRecord, OrderKey, OrderedItem, RecordPatch},
    error::StoreError,
};

const ITEM_COLUMNS: &str = "id, title, tag, done, order_key, created_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to an in-memory database sees its own empty schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Appends a record after every existing one (`max(order_key) + 1`, or 0
    /// for an empty table).
    pub async fn insert(&self, record: &NewRecord) -> Result<OrderedItem> {
        let row = sqlx::query(&format!(
            "INSERT INTO items (title, tag, done, order_key, created_at)
             SELECT ?, ?, 0, COALESCE(MAX(order_key), -1) + 1, ? FROM items
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(&record.title)
        .bind(record.tag.as_deref())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert item")?;
        let item = item_from_row(&row)?;
        debug!(item = %item.id, order_key = %item.order_key, "item inserted");
        Ok(item)
    }

    pub async fn get(&self, id: ItemId) -> Result<Option<OrderedItem>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    /// All records in display order.
    pub async fn list(&self) -> Result<Vec<OrderedItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY order_key ASC, created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to list items")?;
        rows.iter().map(item_from_row).collect()
    }

    pub async fn list_by_tag(&self, tag: &str) -> Result<Vec<OrderedItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE tag = ?
             ORDER BY order_key ASC, created_at ASC, id ASC"
        ))
        .bind(tag)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list items tagged '{tag}'"))?;
        rows.iter().map(item_from_row).collect()
    }

    /// Applies the non-`None` fields of `patch`. Returns the updated record,
    /// or `None` if `id` does not exist. The order key is never touched here.
    pub async fn update(&self, id: ItemId, patch: &RecordPatch) -> Result<Option<OrderedItem>> {
        if patch.is_empty() {
            return self.get(id).await;
        }
        let row = sqlx::query(&format!(
            "UPDATE items SET
                title = COALESCE(?, title),
                done = COALESCE(?, done),
                tag = CASE WHEN ? THEN ? ELSE tag END
             WHERE id = ?
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(patch.title.as_deref())
        .bind(patch.done)
        .bind(patch.tag.is_some())
        .bind(patch.tag.clone().flatten())
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update item {id}"))?;
        row.as_ref().map(item_from_row).transpose()
    }

    pub async fn delete(&self, id: ItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete item {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Writes every `(id, order_key)` pair in one transaction. Rows whose key
    /// already matches are left alone, and ids that no longer exist are
    /// skipped as already removed, so replaying a plan after a delete still
    /// lands the survivors in their planned order. Returns how many rows
    /// changed.
    pub async fn update_order_keys(
        &self,
        mapping: &[(ItemId, OrderKey)],
    ) -> std::result::Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let mut changed = 0;
        let mut missing = 0;

        for (id, key) in mapping {
            let affected = sqlx::query("UPDATE items SET order_key = ? WHERE id = ? AND order_key <> ?")
                .bind(key.0)
                .bind(id.0)
                .bind(key.0)
                .execute(&mut *tx)
                .await
                .map_err(store_error)?
                .rows_affected();
            if affected == 0 {
                let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM items WHERE id = ?")
                    .bind(id.0)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(store_error)?;
                if exists.is_none() {
                    debug!(item = %id, "skipping order key for removed item");
                    missing += 1;
                }
            }
            changed += affected;
        }

        tx.commit().await.map_err(store_error)?;
        debug!(items = mapping.len(), changed, missing, "order keys written");
        Ok(changed)
    }

    /// Rewrites every key to `0..n` in the current display order. Repairs
    /// gaps and ties left by older writers. Returns how many rows changed.
    pub async fn normalize_order_keys(&self) -> Result<u64> {
        let mapping: Vec<(ItemId, OrderKey)> = self
            .list()
            .await?
            .into_iter()
            .enumerate()
            .map(|(index, item)| (item.id, OrderKey::dense(index)))
            .collect();
        let changed = self
            .update_order_keys(&mapping)
            .await
            .context("failed to normalize order keys")?;
        info!(items = mapping.len(), changed, "order keys normalized");
        Ok(changed)
    }
}

fn item_from_row(row: &SqliteRow) -> Result<OrderedItem> {
    Ok(OrderedItem {
        id: ItemId(row.try_get("id")?),
        order_key: OrderKey(row.try_get("order_key")?),
        title: row.try_get("title")?,
        tag: row.try_get("tag")?,
        done: row.try_get("done")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Sorts sqlx failures into the store error taxonomy. Busy or locked
/// databases and pool exhaustion are transient; constraint violations are not.
fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db) => {
            let message = db.message().to_ascii_lowercase();
            if message.contains("locked") || message.contains("busy") {
                StoreError::Unavailable(err.to_string())
            } else if matches!(db.kind(), ErrorKind::Other) {
                StoreError::Internal(err.to_string())
            } else {
                StoreError::Rejected(err.to_string())
            }
        }
        _ => StoreError::Internal(err.to_string()),
    }
}

fn anyhow_store_error(err: anyhow::Error) -> StoreError {
    match err.downcast::<sqlx::Error>() {
        Ok(sqlx_err) => store_error(sqlx_err),
        Err(other) => StoreError::Internal(format!("{other:#}")),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[async_trait]
impl RecordStore for Storage {
    async fn list(&self) -> std::result::Result<Vec<OrderedItem>, StoreError> {
        Storage::list(self).await.map_err(anyhow_store_error)
    }

    async fn batch_update_order_keys(
        &self,
        mapping: &[(ItemId, OrderKey)],
    ) -> std::result::Result<(), StoreError> {
        self.update_order_keys(mapping).await.map(|_| ())
    }

    async fn insert(&self, record: NewRecord) -> std::result::Result<ItemId, StoreError> {
        Storage::insert(self, &record)
            .await
            .map(|item| item.id)
            .map_err(anyhow_store_error)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

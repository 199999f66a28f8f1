use crate::db;
use anyhow::Context;
use async_trait::async_trait;
use pantry_core::{
    change_feed, Item, ItemChange, ItemChanges, ItemFeed, ItemQuery, ItemStore, NewItem, StoreError,
    StoreResult, CHANGE_CAPACITY,
};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Item store backed by the `items` table.
///
/// One `LISTEN` connection, kept outside the request pool, relays trigger
/// notifications to every live feed. Feeds only borrow a pool connection
/// while they re-query.
#[derive(Clone)]
pub struct PgItemStore {
    pool: PgPool,
    changes: broadcast::Sender<ItemChange>,
}

impl PgItemStore {
    /// Opens the change listener and starts relaying notifications.
    pub async fn start(pool: PgPool, database_url: &str) -> anyhow::Result<Self> {
        let mut listener = PgListener::connect(database_url)
            .await
            .context("Failed to open item listener")?;
        listener
            .listen(db::ITEM_CHANNEL)
            .await
            .context("Failed to listen for item changes")?;

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        tokio::spawn(relay(listener, changes.clone()));

        Ok(Self { pool, changes })
    }

    /// Number of live feeds currently attached to this store.
    pub fn watcher_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

async fn relay(mut listener: PgListener, changes: broadcast::Sender<ItemChange>) {
    loop {
        let change = match listener.try_recv().await {
            Ok(Some(notification)) => ItemChange::Items {
                user_id: notification.payload().to_string(),
            },
            Ok(None) => {
                // Reconnects on the next call; anything sent meanwhile is gone.
                log::warn!("Item listener lost its connection, resyncing live feeds");
                ItemChange::Resync
            }
            Err(e) => {
                log::error!("Item listener failed: {}", e);
                let _ = changes.send(ItemChange::Failed(e.to_string()));
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                continue;
            }
        };
        // No receivers just means nobody is watching.
        let _ = changes.send(change);
    }
}

fn backend(err: anyhow::Error) -> StoreError {
    StoreError::Backend(err.into())
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn create_item(&self, item: NewItem) -> StoreResult<Item> {
        db::create_item(&self.pool, &item).await.map_err(backend)
    }

    async fn get_item(&self, user_id: &str, id: Uuid) -> StoreResult<Option<Item>> {
        db::get_item(&self.pool, user_id, id).await.map_err(backend)
    }

    async fn update_item(&self, user_id: &str, id: Uuid, changes: ItemChanges) -> StoreResult<Item> {
        db::update_item(&self.pool, user_id, id, &changes)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::not_found("Item", id.to_string()))
    }

    async fn delete_item(&self, user_id: &str, id: Uuid) -> StoreResult<()> {
        if db::delete_item(&self.pool, user_id, id).await.map_err(backend)? {
            Ok(())
        } else {
            Err(StoreError::not_found("Item", id.to_string()))
        }
    }

    async fn list_items(&self, query: &ItemQuery) -> StoreResult<Vec<Item>> {
        db::list_items(&self.pool, query).await.map_err(backend)
    }

    fn watch(&self, query: ItemQuery) -> ItemFeed {
        let pool = self.pool.clone();
        change_feed(self.changes.subscribe(), query, move |query| {
            let pool = pool.clone();
            async move { db::list_items(&pool, &query).await.map_err(backend) }
        })
    }
}

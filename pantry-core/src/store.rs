//! The item store contract and an in-memory implementation.

use crate::error::{StoreError, StoreResult};
use crate::models::{Item, ItemChanges, ItemQuery, NewItem};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Live feed of full snapshots for one query.
///
/// The first element is the current matching set; every later element is the
/// full matching set after a change. Dropping the feed unsubscribes.
pub type ItemFeed = BoxStream<'static, StoreResult<Vec<Item>>>;

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn create_item(&self, item: NewItem) -> StoreResult<Item>;

    async fn get_item(&self, user_id: &str, id: Uuid) -> StoreResult<Option<Item>>;

    /// Replaces name, category, expiry date and image of an item.
    async fn update_item(&self, user_id: &str, id: Uuid, changes: ItemChanges) -> StoreResult<Item>;

    async fn delete_item(&self, user_id: &str, id: Uuid) -> StoreResult<()>;

    /// Matching items ordered by creation time, then id.
    async fn list_items(&self, query: &ItemQuery) -> StoreResult<Vec<Item>>;

    fn watch(&self, query: ItemQuery) -> ItemFeed;
}

/// Change signal fanned out to every live feed of a store.
#[derive(Debug, Clone)]
pub enum ItemChange {
    /// Items owned by `user_id` were written.
    Items { user_id: String },
    /// Changes may have been missed; every feed reloads.
    Resync,
    /// The change source is gone; feeds end with [`StoreError::FeedClosed`].
    Failed(String),
}

pub const CHANGE_CAPACITY: usize = 64;

/// Builds a feed for `query` out of a change channel and a loader.
///
/// `changes` must be subscribed before the call so nothing written between
/// the subscription and the first load is lost. The feed reloads on every
/// change for the watched user and on resyncs. A failed load ends the feed.
pub fn change_feed<L, F>(
    mut changes: broadcast::Receiver<ItemChange>,
    query: ItemQuery,
    load: L,
) -> ItemFeed
where
    L: Fn(ItemQuery) -> F + Send + 'static,
    F: Future<Output = StoreResult<Vec<Item>>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut reload = true;
        loop {
            if reload {
                match load(query.clone()).await {
                    Ok(items) => {
                        yield Ok(items);
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }

            reload = match changes.recv().await {
                Ok(ItemChange::Items { user_id }) => user_id == query.user_id,
                Ok(ItemChange::Resync) => true,
                Ok(ItemChange::Failed(reason)) => {
                    yield Err(StoreError::FeedClosed(reason));
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("Item feed for {} lagged by {} changes, resyncing", query.user_id, skipped);
                    true
                }
                Err(RecvError::Closed) => break,
            };
        }
    })
}

/// Item store held in process memory.
#[derive(Debug, Clone)]
pub struct MemoryItemStore {
    items: Arc<RwLock<HashMap<Uuid, Item>>>,
    changes: broadcast::Sender<ItemChange>,
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryItemStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }

    /// Number of live feeds currently attached to this store.
    pub fn watcher_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Ends every open feed with an error.
    pub fn fail_watchers(&self, reason: impl Into<String>) {
        let _ = self.changes.send(ItemChange::Failed(reason.into()));
    }

    fn notify(&self, user_id: &str) {
        // No receivers is fine; nobody is watching.
        let _ = self.changes.send(ItemChange::Items {
            user_id: user_id.to_string(),
        });
    }
}

async fn snapshot(items: &RwLock<HashMap<Uuid, Item>>, query: &ItemQuery) -> Vec<Item> {
    let items = items.read().await;
    let mut matching: Vec<Item> = items
        .values()
        .filter(|item| query.matches(item))
        .cloned()
        .collect();
    matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    matching
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn create_item(&self, new_item: NewItem) -> StoreResult<Item> {
        let item = Item {
            id: Uuid::new_v4(),
            user_id: new_item.user_id,
            name: new_item.name,
            category: new_item.category,
            expiry_date: new_item.expiry_date,
            image_uri: new_item.image_uri,
            created_at: OffsetDateTime::now_utc(),
        };

        self.items.write().await.insert(item.id, item.clone());
        self.notify(&item.user_id);
        Ok(item)
    }

    async fn get_item(&self, user_id: &str, id: Uuid) -> StoreResult<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.get(&id).filter(|item| item.user_id == user_id).cloned())
    }

    async fn update_item(&self, user_id: &str, id: Uuid, changes: ItemChanges) -> StoreResult<Item> {
        let updated = {
            let mut items = self.items.write().await;
            let item = items
                .get_mut(&id)
                .filter(|item| item.user_id == user_id)
                .ok_or_else(|| StoreError::not_found("Item", id.to_string()))?;
            item.apply(changes);
            item.clone()
        };
        self.notify(user_id);
        Ok(updated)
    }

    async fn delete_item(&self, user_id: &str, id: Uuid) -> StoreResult<()> {
        {
            let mut items = self.items.write().await;
            match items.get(&id) {
                Some(item) if item.user_id == user_id => {
                    items.remove(&id);
                }
                _ => return Err(StoreError::not_found("Item", id.to_string())),
            }
        }
        self.notify(user_id);
        Ok(())
    }

    async fn list_items(&self, query: &ItemQuery) -> StoreResult<Vec<Item>> {
        Ok(snapshot(&self.items, query).await)
    }

    fn watch(&self, query: ItemQuery) -> ItemFeed {
        let items = Arc::clone(&self.items);
        change_feed(self.changes.subscribe(), query, move |query| {
            let items = Arc::clone(&items);
            async move { Ok(snapshot(&items, &query).await) }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn new_item(user_id: &str, name: &str, category: &str) -> NewItem {
        NewItem {
            user_id: user_id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            expiry_date: "2024-06-12".to_string(),
            image_uri: None,
        }
    }

    #[tokio::test]
    async fn items_are_scoped_to_their_owner() {
        let store = MemoryItemStore::new();
        let milk = store.create_item(new_item("alice", "Milk", "Dairy")).await.unwrap();
        store.create_item(new_item("bob", "Aspirin", "Medicine")).await.unwrap();

        assert_eq!(store.get_item("alice", milk.id).await.unwrap(), Some(milk.clone()));
        assert_eq!(store.get_item("bob", milk.id).await.unwrap(), None);

        let alice = store.list_items(&ItemQuery::for_user("alice")).await.unwrap();
        assert_eq!(alice, vec![milk.clone()]);

        let err = store.delete_item("bob", milk.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.get_item("alice", milk.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_orders_by_creation_and_filters_category() {
        let store = MemoryItemStore::new();
        let bread = store.create_item(new_item("alice", "Bread", "Food")).await.unwrap();
        let cheese = store.create_item(new_item("alice", "Cheese", "Dairy")).await.unwrap();
        let butter = store.create_item(new_item("alice", "Butter", "Dairy")).await.unwrap();

        let all = store.list_items(&ItemQuery::for_user("alice")).await.unwrap();
        let mut expected = vec![bread, cheese.clone(), butter.clone()];
        expected.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        assert_eq!(all, expected);

        let mut query = ItemQuery::for_user("alice");
        query.category = Some("Dairy".to_string());
        let dairy = store.list_items(&query).await.unwrap();
        assert_eq!(dairy.len(), 2);
        assert!(dairy.iter().all(|item| item.category == "Dairy"));
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let store = MemoryItemStore::new();
        let item = store.create_item(new_item("alice", "Milk", "Dairy")).await.unwrap();

        let updated = store
            .update_item(
                "alice",
                item.id,
                ItemChanges {
                    name: "Oat milk".to_string(),
                    category: "Other".to_string(),
                    expiry_date: "2024-07-01".to_string(),
                    image_uri: Some("https://img.example/oat.jpg".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, item.id);
        assert_eq!(updated.created_at, item.created_at);
        assert_eq!(updated.name, "Oat milk");
        assert_eq!(store.get_item("alice", item.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn watch_emits_snapshot_then_changes_for_owner_only() {
        let store = MemoryItemStore::new();
        let mut feed = store.watch(ItemQuery::for_user("alice"));

        assert!(feed.next().await.unwrap().unwrap().is_empty());

        store.create_item(new_item("bob", "Aspirin", "Medicine")).await.unwrap();
        store.create_item(new_item("alice", "Milk", "Dairy")).await.unwrap();

        let snapshot = feed.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Milk");
    }

    #[tokio::test]
    async fn dropping_a_feed_releases_the_watcher() {
        let store = MemoryItemStore::new();
        let feed = store.watch(ItemQuery::for_user("alice"));
        assert_eq!(store.watcher_count(), 1);

        drop(feed);
        assert_eq!(store.watcher_count(), 0);
    }

    #[tokio::test]
    async fn change_feed_reloads_on_resync_and_stops_on_load_error() {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let loads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let mut feed = change_feed(changes.subscribe(), ItemQuery::for_user("alice"), move |_| {
            let attempt = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Ok(Vec::new())
                } else {
                    Err(StoreError::backend(std::io::Error::other("gone")))
                }
            }
        });

        assert!(feed.next().await.unwrap().unwrap().is_empty());
        changes.send(ItemChange::Resync).unwrap();
        assert!(feed.next().await.unwrap().unwrap().is_empty());
        changes.send(ItemChange::Items { user_id: "bob".to_string() }).unwrap();
        changes.send(ItemChange::Items { user_id: "alice".to_string() }).unwrap();
        assert!(matches!(feed.next().await.unwrap(), Err(StoreError::Backend(_))));
        assert!(feed.next().await.is_none());
        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_feed_reports_error_then_ends() {
        let store = MemoryItemStore::new();
        let mut feed = store.watch(ItemQuery::for_user("alice"));
        feed.next().await.unwrap().unwrap();

        store.fail_watchers("connection reset");

        let err = feed.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::FeedClosed(ref reason) if reason == "connection reset"));
        assert!(feed.next().await.is_none());
    }
}

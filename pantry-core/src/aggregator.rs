//! Live expiry views over a user's items.

use crate::clock::Clock;
use crate::error::AggregatorError;
use crate::expiry::{aggregate_within, AggregateView, DEFAULT_HORIZON_DAYS};
use crate::models::ItemQuery;
use crate::store::{ItemFeed, ItemStore};
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use time::OffsetDateTime;

/// Derives [`AggregateView`]s from an item store.
///
/// Every subscription gets its own feed from the store and recomputes the
/// whole view from each snapshot it receives; nothing is shared between
/// subscriptions.
#[derive(Clone)]
pub struct ExpiryAggregator {
    store: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
    horizon_days: u32,
}

impl ExpiryAggregator {
    pub fn new(store: Arc<dyn ItemStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }

    pub fn with_horizon(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    /// One-shot view of the items matching `query`.
    pub async fn snapshot(&self, query: &ItemQuery) -> Result<AggregateView, AggregatorError> {
        let items = self
            .store
            .list_items(query)
            .await
            .map_err(AggregatorError::Load)?;
        Ok(aggregate_within(&items, self.clock.now(), self.horizon_days))
    }

    /// Opens a live view of every item owned by `user_id`.
    pub fn subscribe(&self, user_id: impl Into<String>) -> PantrySubscription {
        self.subscribe_to(ItemQuery::for_user(user_id))
    }

    pub fn subscribe_to(&self, query: ItemQuery) -> PantrySubscription {
        log::debug!("Opening pantry subscription for {}", query.user_id);
        let user_id = query.user_id.clone();
        PantrySubscription {
            user_id,
            feed: Some(self.store.watch(query)),
            clock: Arc::clone(&self.clock),
            horizon_days: self.horizon_days,
        }
    }
}

/// Stream of views for one user, ending after cancellation or a feed failure.
///
/// A failed feed yields a single [`AggregatorError::SubscriptionFailed`] and
/// then ends, so "could not load" is never confused with an empty pantry.
pub struct PantrySubscription {
    user_id: String,
    feed: Option<ItemFeed>,
    clock: Arc<dyn Clock>,
    horizon_days: u32,
}

impl PantrySubscription {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_active(&self) -> bool {
        self.feed.is_some()
    }

    /// Stops the subscription and releases the store feed. Idempotent.
    pub fn cancel(&mut self) {
        if self.feed.take().is_some() {
            log::debug!("Cancelled pantry subscription for {}", self.user_id);
        }
    }
}

impl Stream for PantrySubscription {
    type Item = Result<AggregateView, AggregatorError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(feed) = this.feed.as_mut() else {
            return Poll::Ready(None);
        };

        match feed.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(items))) => {
                let view = aggregate_within(&items, this.clock.now(), this.horizon_days);
                Poll::Ready(Some(Ok(view)))
            }
            Poll::Ready(Some(Err(err))) => {
                log::warn!("Pantry subscription for {} failed: {}", this.user_id, err);
                this.feed = None;
                Poll::Ready(Some(Err(AggregatorError::SubscriptionFailed(err))))
            }
            Poll::Ready(None) => {
                this.feed = None;
                Poll::Ready(None)
            }
        }
    }
}

impl std::fmt::Debug for PantrySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PantrySubscription")
            .field("user_id", &self.user_id)
            .field("active", &self.is_active())
            .field("horizon_days", &self.horizon_days)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::NewItem;
    use crate::store::MemoryItemStore;
    use futures_util::StreamExt;
    use time::macros::datetime;

    fn aggregator(store: &MemoryItemStore) -> ExpiryAggregator {
        ExpiryAggregator::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(datetime!(2024-06-10 0:00 UTC))),
        )
    }

    #[tokio::test]
    async fn snapshot_uses_configured_horizon() {
        let store = MemoryItemStore::new();
        store
            .create_item(NewItem {
                user_id: "alice".to_string(),
                name: "Ham".to_string(),
                category: "Food".to_string(),
                expiry_date: "2024-06-15".to_string(),
                image_uri: None,
            })
            .await
            .unwrap();

        let query = ItemQuery::for_user("alice");
        let default_view = aggregator(&store).snapshot(&query).await.unwrap();
        assert_eq!(default_view.expiring_soon_count, 0);

        let wide_view = aggregator(&store).with_horizon(7).snapshot(&query).await.unwrap();
        assert_eq!(wide_view.horizon_days, 7);
        assert_eq!(wide_view.expiring_soon_count, 1);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_ends_the_stream() {
        let store = MemoryItemStore::new();
        let mut subscription = aggregator(&store).subscribe("alice");
        assert!(subscription.is_active());

        subscription.cancel();
        subscription.cancel();

        assert!(!subscription.is_active());
        assert!(subscription.next().await.is_none());
        assert_eq!(store.watcher_count(), 0);
    }
}

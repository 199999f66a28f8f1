use futures_util::StreamExt;
use pantry_core::{
    AggregatorError, Category, ExpiryAggregator, FixedClock, ItemChanges, ItemStore,
    MemoryItemStore, NewItem,
};
use std::sync::Arc;
use std::time::Duration;
use time::macros::datetime;

fn setup() -> (MemoryItemStore, Arc<FixedClock>, ExpiryAggregator) {
    let store = MemoryItemStore::new();
    let clock = Arc::new(FixedClock::new(datetime!(2024-06-10 0:00 UTC)));
    let aggregator = ExpiryAggregator::new(Arc::new(store.clone()), clock.clone());
    (store, clock, aggregator)
}

fn new_item(user_id: &str, name: &str, category: &str, expiry_date: &str) -> NewItem {
    NewItem {
        user_id: user_id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        expiry_date: expiry_date.to_string(),
        image_uri: None,
    }
}

#[tokio::test]
async fn first_view_reflects_current_items() {
    let (store, _clock, aggregator) = setup();
    store.create_item(new_item("alice", "Bread", "Food", "2024-06-09")).await.unwrap();
    store.create_item(new_item("alice", "Milk", "Dairy", "2024-06-11")).await.unwrap();
    store.create_item(new_item("alice", "Pills", "Medicine", "2024-06-20")).await.unwrap();
    store.create_item(new_item("alice", "Mystery", "Other", "garbage")).await.unwrap();

    let mut subscription = aggregator.subscribe("alice");
    let view = subscription.next().await.unwrap().unwrap();

    assert_eq!(view.total_count, 4);
    assert_eq!(view.expiring_soon_count, 2);
    assert_eq!(view.urgent_list[0].item.name, "Bread");
    assert_eq!(view.urgent_list[1].item.name, "Milk");
    assert_eq!(view.unknown_list[0].name, "Mystery");
}

#[tokio::test]
async fn views_follow_add_edit_and_delete() {
    let (store, _clock, aggregator) = setup();
    let mut subscription = aggregator.subscribe("alice");

    let empty = subscription.next().await.unwrap().unwrap();
    assert!(empty.is_empty());

    let milk = store
        .create_item(new_item("alice", "Milk", "Dairy", "2024-06-20"))
        .await
        .unwrap();
    let added = subscription.next().await.unwrap().unwrap();
    assert_eq!(added.total_count, 1);
    assert_eq!(added.expiring_soon_count, 0);

    store
        .update_item(
            "alice",
            milk.id,
            ItemChanges {
                name: "Milk".to_string(),
                category: "Dairy".to_string(),
                expiry_date: "2024-06-12".to_string(),
                image_uri: None,
            },
        )
        .await
        .unwrap();
    let edited = subscription.next().await.unwrap().unwrap();
    assert_eq!(edited.expiring_soon_count, 1);
    assert_eq!(edited.urgent_list[0].status.days_remaining, 2);
    assert_eq!(edited.category(Category::Dairy).urgent, 1);

    store.delete_item("alice", milk.id).await.unwrap();
    let deleted = subscription.next().await.unwrap().unwrap();
    assert!(deleted.is_empty());
}

#[tokio::test]
async fn views_use_the_clock_at_emission_time() {
    let (store, clock, aggregator) = setup();
    store.create_item(new_item("alice", "Eggs", "Food", "2024-06-15")).await.unwrap();

    let mut subscription = aggregator.subscribe("alice");
    let before = subscription.next().await.unwrap().unwrap();
    assert_eq!(before.expiring_soon_count, 0);

    clock.advance(time::Duration::days(3));
    store.create_item(new_item("alice", "Jam", "Food", "2025-01-01")).await.unwrap();

    let after = subscription.next().await.unwrap().unwrap();
    assert_eq!(after.reference, datetime!(2024-06-13 0:00 UTC));
    assert_eq!(after.expiring_soon_count, 1);
    assert_eq!(after.urgent_list[0].item.name, "Eggs");
}

#[tokio::test]
async fn other_users_changes_do_not_emit() {
    let (store, _clock, aggregator) = setup();
    let mut subscription = aggregator.subscribe("alice");
    subscription.next().await.unwrap().unwrap();

    store.create_item(new_item("bob", "Aspirin", "Medicine", "2024-06-10")).await.unwrap();
    store.create_item(new_item("alice", "Butter", "Dairy", "2024-06-30")).await.unwrap();

    let view = subscription.next().await.unwrap().unwrap();
    assert_eq!(view.total_count, 1);
    assert_eq!(view.unknown_list.len() + view.urgent_list.len(), 0);
}

#[tokio::test]
async fn independent_subscriptions_each_receive_changes() {
    let (store, _clock, aggregator) = setup();
    let mut dashboard = aggregator.subscribe("alice");
    let mut notifications = aggregator.clone().with_horizon(0).subscribe("alice");
    dashboard.next().await.unwrap().unwrap();
    notifications.next().await.unwrap().unwrap();

    store.create_item(new_item("alice", "Yogurt", "Dairy", "2024-06-11")).await.unwrap();

    let dashboard_view = dashboard.next().await.unwrap().unwrap();
    let notifications_view = notifications.next().await.unwrap().unwrap();
    assert_eq!(dashboard_view.expiring_soon_count, 1);
    assert_eq!(notifications_view.expiring_soon_count, 0);

    dashboard.cancel();
    store.create_item(new_item("alice", "Kefir", "Dairy", "2024-06-09")).await.unwrap();

    let still_live = notifications.next().await.unwrap().unwrap();
    assert_eq!(still_live.expiring_soon_count, 1);
    assert!(dashboard.next().await.is_none());
}

#[tokio::test]
async fn no_emission_after_cancel_even_for_delayed_changes() {
    let (store, _clock, aggregator) = setup();
    let mut subscription = aggregator.subscribe("alice");

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store
                .create_item(new_item("alice", "Cream", "Dairy", "2024-06-11"))
                .await
                .unwrap();
        })
    };

    subscription.cancel();
    writer.await.unwrap();

    let next = tokio::time::timeout(Duration::from_millis(100), subscription.next())
        .await
        .expect("a cancelled subscription resolves immediately");
    assert!(next.is_none());
    assert_eq!(store.watcher_count(), 0);
}

#[tokio::test]
async fn repeated_subscribe_cancel_cycles_do_not_leak_watchers() {
    let (store, _clock, aggregator) = setup();

    for round in 0..50 {
        let mut subscription = aggregator.subscribe("alice");
        assert_eq!(store.watcher_count(), 1, "round {round}");
        subscription.next().await.unwrap().unwrap();
        if round % 2 == 0 {
            subscription.cancel();
        } else {
            drop(subscription);
        }
        assert_eq!(store.watcher_count(), 0, "round {round}");
    }

    let mut restarted = aggregator.subscribe("alice");
    store.create_item(new_item("alice", "Rice", "Food", "2025-03-01")).await.unwrap();
    let first = restarted.next().await.unwrap().unwrap();
    assert_eq!(first.total_count, 1);
}

#[tokio::test]
async fn feed_failure_is_distinct_from_an_empty_pantry() {
    let (store, _clock, aggregator) = setup();
    let mut subscription = aggregator.subscribe("alice");

    let empty = subscription.next().await.unwrap();
    assert!(empty.unwrap().is_empty());

    store.fail_watchers("backend went away");

    let failure = subscription.next().await.unwrap();
    assert!(matches!(failure, Err(AggregatorError::SubscriptionFailed(_))));
    assert!(!subscription.is_active());
    assert!(subscription.next().await.is_none());
    assert_eq!(store.watcher_count(), 0);
}

//! Expiry tracking for a personal pantry.
//!
//! Items live in an [`ItemStore`]; the [`ExpiryAggregator`] turns a user's
//! items into an [`AggregateView`] and keeps it current as the store changes.

pub mod aggregator;
pub mod clock;
pub mod error;
pub mod expiry;
pub mod models;
pub mod store;

pub use aggregator::{ExpiryAggregator, PantrySubscription};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AggregatorError, StoreError, StoreResult};
pub use expiry::{
    aggregate, aggregate_within, classify, classify_within, days_remaining, filter_by_category,
    parse_expiry, AggregateView, CategorySummary, Classification, ClassifiedItem, ExpiryStatus,
    DEFAULT_HORIZON_DAYS,
};
pub use models::{Category, CategoryFilter, Item, ItemChanges, ItemQuery, NewItem};
pub use store::{change_feed, ItemChange, ItemFeed, ItemStore, MemoryItemStore, CHANGE_CAPACITY};

use thiserror::Error;

/// Errors raised by an item store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The store closed a live feed it could not keep delivering.
    #[error("item feed closed: {0}")]
    FeedClosed(String),

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced to consumers of the expiry aggregator.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// The underlying item feed failed. Terminal for a live subscription.
    #[error("pantry subscription failed: {0}")]
    SubscriptionFailed(#[source] StoreError),

    #[error("failed to load pantry: {0}")]
    Load(#[source] StoreError),
}

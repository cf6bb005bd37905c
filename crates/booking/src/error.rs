use aether_core::calendar::SuggestedSlot;
use aether_core::error::CoreError;

/// Failure of the durability layer behind a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store's own per-day lock was held past the allowed wait.
    #[error("Timed out waiting for the day lock")]
    LockTimeout,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if aether_db::is_lock_timeout(&err) {
            StoreError::LockTimeout
        } else {
            StoreError::Database(err)
        }
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Outcome kinds surfaced by the booking coordinator and chat bridge.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Missing or invalid request fields. Not retried.
    #[error("{0}")]
    Validation(String),

    /// Capacity was exhausted when the write was attempted.
    #[error("{message}")]
    SlotConflict {
        message: String,
        suggested_slots: Vec<SuggestedSlot>,
    },

    /// The per-day serialization point was not acquired in time. Safe to retry.
    #[error("Another booking for this day is in progress, please retry")]
    Busy,

    /// The record does not exist, the requester may not act on it, or it is
    /// already terminal.
    #[error("{0}")]
    NotFound(String),

    /// Stale writes to versioned configuration.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout => BookingError::Busy,
            other => BookingError::Store(other),
        }
    }
}

impl From<CoreError> for BookingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => BookingError::Validation(msg),
            CoreError::NotFound { .. } => BookingError::NotFound(err.to_string()),
            CoreError::Conflict(msg) => BookingError::Conflict(msg),
            CoreError::Internal(msg) => BookingError::Store(StoreError::Unavailable(msg)),
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from(err).into()
    }
}

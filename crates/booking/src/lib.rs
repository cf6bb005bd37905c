//! Booking engine: availability, the capacity-guarded booking coordinator
//! and the chat bridge, built on pluggable stores.

pub mod availability;
pub mod chat_bridge;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod keyed_lock;
pub mod memory;
pub mod postgres;
pub mod store;

pub use availability::{Availability, AvailabilityEngine};
pub use chat_bridge::{BookingAttempt, ChatExchange, ChatService, MessageDeletion};
pub use clock::{Clock, FixedClock, SystemClock};
pub use coordinator::{BookingCoordinator, BookingPolicy, Rescheduled};
pub use error::{BookingError, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::Stores;

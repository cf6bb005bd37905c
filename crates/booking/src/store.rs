//! Storage seams used by the booking engine.
//!
//! Every engine component talks to persistence through these traits so the
//! same coordinator runs against PostgreSQL in production and against
//! [`MemoryStore`] in tests and database-less deployments.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use aether_core::appointment::{Appointment, AppointmentStatus, DayKey, NewAppointment, SlotKey};
use aether_core::chat::{ChatMessage, Conversation, MessageSender};
use aether_core::scheduling_config::SchedulingConfig;
use aether_core::types::{DbId, SlotTime};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::StoreError;
use crate::memory::MemoryStore;
use crate::postgres::PgStore;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Appointment),
    /// The slot already holds `capacity` active appointments.
    AtCapacity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(Appointment),
    /// The record's status no longer matched the expected prior status.
    Stale(Appointment),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleOutcome {
    Rescheduled {
        prior: Appointment,
        replacement: Appointment,
    },
    AtCapacity,
    Stale(Appointment),
    NotFound,
}

/// Result of a pin or unpin: the full set after the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinChange {
    pub pinned: Vec<DbId>,
    pub changed: bool,
}

/// A bookable service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: DbId,
    pub name: String,
    pub requires_confirmation: bool,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Durable appointment records.
///
/// Both capacity-guarded writes are atomic with respect to each other for a
/// given (date, branch): the count and the insert happen as one unit.
#[async_trait]
pub trait AppointmentLedger: Send + Sync + 'static {
    async fn get(&self, id: DbId) -> Result<Option<Appointment>, StoreError>;

    /// Insert only if the slot's active count is below `capacity`.
    async fn insert_within_capacity(
        &self,
        input: NewAppointment,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError>;

    /// Active (`booked`/`pending_confirmation`) count at one slot.
    async fn count_active(&self, slot: SlotKey) -> Result<u32, StoreError>;

    /// Active counts keyed by slot start for one date and branch.
    async fn active_counts_for_day(
        &self,
        day: DayKey,
    ) -> Result<BTreeMap<SlotTime, u32>, StoreError>;

    /// Active appointments for a customer dated `from` or later, ordered by
    /// (date, time) ascending.
    async fn list_upcoming(
        &self,
        customer_id: DbId,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Compare-and-set status change.
    async fn transition(
        &self,
        id: DbId,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Insert `replacement` within capacity and mark `prior_id` as
    /// `rescheduled` in one atomic step. The prior status must equal
    /// `expected`.
    async fn reschedule(
        &self,
        prior_id: DbId,
        expected: AppointmentStatus,
        replacement: NewAppointment,
        capacity: u32,
    ) -> Result<RescheduleOutcome, StoreError>;
}

/// Conversations, transcripts and pinned sets.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    async fn conversation(&self, id: DbId) -> Result<Option<Conversation>, StoreError>;

    /// The customer's conversation, created on first use.
    async fn conversation_for_customer(&self, customer_id: DbId)
        -> Result<Conversation, StoreError>;

    async fn append_message(
        &self,
        conversation_id: DbId,
        sender: MessageSender,
        content: &str,
    ) -> Result<ChatMessage, StoreError>;

    async fn list_messages(&self, conversation_id: DbId) -> Result<Vec<ChatMessage>, StoreError>;

    /// The latest `limit` messages, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: DbId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    async fn message_in_conversation(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<bool, StoreError>;

    async fn message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Option<ChatMessage>, StoreError>;

    /// Replace a message's content. `None` when the message is not in the
    /// conversation.
    async fn edit_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
        content: &str,
    ) -> Result<Option<ChatMessage>, StoreError>;

    /// Delete a message and drop it from the pinned set in the same step.
    /// `None` when the message is not in the conversation; otherwise the
    /// remaining pinned set, `changed` when the message had been pinned.
    async fn delete_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Option<PinChange>, StoreError>;

    async fn pin(&self, conversation_id: DbId, message_id: DbId) -> Result<PinChange, StoreError>;

    async fn unpin(&self, conversation_id: DbId, message_id: DbId)
        -> Result<PinChange, StoreError>;

    async fn pinned(&self, conversation_id: DbId) -> Result<Vec<DbId>, StoreError>;
}

/// The versioned scheduling configuration document.
#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    /// `None` when no configuration has ever been saved.
    async fn load(&self) -> Result<Option<SchedulingConfig>, StoreError>;

    /// Save `config` if the stored version equals `expected_version`.
    /// Returns the saved document with its new version, or `None` when stale.
    async fn save(
        &self,
        config: SchedulingConfig,
        expected_version: i64,
    ) -> Result<Option<SchedulingConfig>, StoreError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync + 'static {
    async fn product(&self, id: DbId) -> Result<Option<Product>, StoreError>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The full set of stores the engine runs on.
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn AppointmentLedger>,
    pub conversations: Arc<dyn ConversationStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub products: Arc<dyn ProductCatalog>,
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Memory,
    Postgres(aether_db::DbPool),
}

impl Stores {
    /// All four stores served by one in-memory instance.
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            ledger: store.clone(),
            conversations: store.clone(),
            settings: store.clone(),
            products: store,
            backend: Backend::Memory,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::default()))
    }

    /// Stores on PostgreSQL. Capacity-guarded writes wait at most
    /// `lock_wait` for the database's day lock.
    pub fn postgres(pool: aether_db::DbPool, lock_wait: Duration) -> Self {
        let store = Arc::new(PgStore::new(pool.clone(), lock_wait));
        Self {
            ledger: store.clone(),
            conversations: store.clone(),
            settings: store.clone(),
            products: store,
            backend: Backend::Postgres(pool),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Memory => "memory",
            Backend::Postgres(_) => "postgres",
        }
    }

    /// Whether the backing store is reachable.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Memory => Ok(()),
            Backend::Postgres(pool) => Ok(aether_db::health_check(pool).await?),
        }
    }
}

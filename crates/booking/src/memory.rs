//! Process-local implementation of every store trait.
//!
//! One `tokio::sync::Mutex` guards all state, so each trait method is atomic
//! on its own; in particular the capacity check and insert happen under the
//! same guard. Used by tests and by the server when no database is
//! configured. Nothing survives a restart.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use aether_core::appointment::{Appointment, AppointmentStatus, DayKey, NewAppointment, SlotKey};
use aether_core::chat::{self, ChatMessage, Conversation, MessageSender};
use aether_core::scheduling_config::SchedulingConfig;
use aether_core::types::{DbId, SlotTime};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{
    AppointmentLedger, ConversationStore, InsertOutcome, PinChange, Product, ProductCatalog,
    RescheduleOutcome, SettingsStore, TransitionOutcome,
};

#[derive(Default)]
struct MemoryState {
    last_appointment_id: DbId,
    last_conversation_id: DbId,
    last_message_id: DbId,
    last_product_id: DbId,
    appointments: BTreeMap<DbId, Appointment>,
    conversations: BTreeMap<DbId, Conversation>,
    conversation_by_customer: HashMap<DbId, DbId>,
    messages: HashMap<DbId, Vec<ChatMessage>>,
    pins: HashMap<DbId, BTreeSet<DbId>>,
    settings: Option<SchedulingConfig>,
    products: BTreeMap<DbId, Product>,
}

impl MemoryState {
    fn count_active(&self, slot: SlotKey) -> u32 {
        self.appointments
            .values()
            .filter(|a| a.status.is_active() && a.slot_key() == slot)
            .count() as u32
    }

    fn insert(&mut self, input: NewAppointment) -> Appointment {
        self.last_appointment_id += 1;
        let appointment = input.into_appointment(self.last_appointment_id, Utc::now());
        self.appointments.insert(appointment.id, appointment.clone());
        appointment
    }
}

/// In-memory store. Cheap to construct; share it behind an `Arc`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bookable product and return it.
    pub async fn add_product(&self, name: &str, requires_confirmation: bool) -> Product {
        let mut state = self.state.lock().await;
        state.last_product_id += 1;
        let product = Product {
            id: state.last_product_id,
            name: name.to_string(),
            requires_confirmation,
        };
        state.products.insert(product.id, product.clone());
        product
    }

    /// Make every write fail with [`StoreError::Unavailable`], as a lost
    /// database would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AppointmentLedger for MemoryStore {
    async fn get(&self, id: DbId) -> Result<Option<Appointment>, StoreError> {
        Ok(self.state.lock().await.appointments.get(&id).cloned())
    }

    async fn insert_within_capacity(
        &self,
        input: NewAppointment,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if state.count_active(input.slot_key()) >= capacity {
            return Ok(InsertOutcome::AtCapacity);
        }
        Ok(InsertOutcome::Inserted(state.insert(input)))
    }

    async fn count_active(&self, slot: SlotKey) -> Result<u32, StoreError> {
        Ok(self.state.lock().await.count_active(slot))
    }

    async fn active_counts_for_day(
        &self,
        day: DayKey,
    ) -> Result<BTreeMap<SlotTime, u32>, StoreError> {
        let state = self.state.lock().await;
        let mut counts = BTreeMap::new();
        for appointment in state.appointments.values() {
            if appointment.status.is_active()
                && appointment.date == day.date
                && appointment.branch_id == day.branch_id
            {
                *counts.entry(appointment.time).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn list_upcoming(
        &self,
        customer_id: DbId,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.lock().await;
        let mut upcoming: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.customer_id == customer_id && a.date >= from && a.status.is_active())
            .cloned()
            .collect();
        upcoming.sort_by_key(|a| (a.date, a.time, a.id));
        Ok(upcoming)
    }

    async fn transition(
        &self,
        id: DbId,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<TransitionOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let Some(appointment) = state.appointments.get_mut(&id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if appointment.status != expected {
            return Ok(TransitionOutcome::Stale(appointment.clone()));
        }
        appointment.status = next;
        appointment.updated_at = Utc::now();
        Ok(TransitionOutcome::Applied(appointment.clone()))
    }

    async fn reschedule(
        &self,
        prior_id: DbId,
        expected: AppointmentStatus,
        replacement: NewAppointment,
        capacity: u32,
    ) -> Result<RescheduleOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let Some(prior) = state.appointments.get(&prior_id) else {
            return Ok(RescheduleOutcome::NotFound);
        };
        if prior.status != expected {
            return Ok(RescheduleOutcome::Stale(prior.clone()));
        }
        if state.count_active(replacement.slot_key()) >= capacity {
            return Ok(RescheduleOutcome::AtCapacity);
        }

        let replacement = state.insert(replacement);
        let Some(prior) = state.appointments.get_mut(&prior_id) else {
            return Ok(RescheduleOutcome::NotFound);
        };
        prior.status = AppointmentStatus::Rescheduled;
        prior.rescheduled_to = Some(replacement.id);
        prior.updated_at = replacement.created_at;
        Ok(RescheduleOutcome::Rescheduled {
            prior: prior.clone(),
            replacement,
        })
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn conversation(&self, id: DbId) -> Result<Option<Conversation>, StoreError> {
        Ok(self.state.lock().await.conversations.get(&id).cloned())
    }

    async fn conversation_for_customer(
        &self,
        customer_id: DbId,
    ) -> Result<Conversation, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(id) = state.conversation_by_customer.get(&customer_id).copied() {
            if let Some(conversation) = state.conversations.get(&id) {
                return Ok(conversation.clone());
            }
        }
        self.check_available()?;
        state.last_conversation_id += 1;
        let conversation = Conversation {
            id: state.last_conversation_id,
            customer_id,
            created_at: Utc::now(),
        };
        state
            .conversation_by_customer
            .insert(customer_id, conversation.id);
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn append_message(
        &self,
        conversation_id: DbId,
        sender: MessageSender,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if !state.conversations.contains_key(&conversation_id) {
            return Err(StoreError::Corrupt(format!(
                "conversation {conversation_id} does not exist"
            )));
        }
        state.last_message_id += 1;
        let message = ChatMessage {
            id: state.last_message_id,
            conversation_id,
            sender,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        state
            .messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: DbId) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_messages(
        &self,
        conversation_id: DbId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let state = self.state.lock().await;
        let messages = state
            .messages
            .get(&conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn message_in_conversation(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .messages
            .get(&conversation_id)
            .is_some_and(|m| m.iter().any(|m| m.id == message_id)))
    }

    async fn message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Option<ChatMessage>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .messages
            .get(&conversation_id)
            .and_then(|m| m.iter().find(|m| m.id == message_id))
            .cloned())
    }

    async fn edit_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
        content: &str,
    ) -> Result<Option<ChatMessage>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let Some(message) = state
            .messages
            .get_mut(&conversation_id)
            .and_then(|m| m.iter_mut().find(|m| m.id == message_id))
        else {
            return Ok(None);
        };
        message.content = content.to_string();
        Ok(Some(message.clone()))
    }

    async fn delete_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Option<PinChange>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let Some(messages) = state.messages.get_mut(&conversation_id) else {
            return Ok(None);
        };
        let before = messages.len();
        messages.retain(|m| m.id != message_id);
        if messages.len() == before {
            return Ok(None);
        }
        let pinned = state.pins.entry(conversation_id).or_default();
        let changed = chat::unpin(pinned, message_id);
        Ok(Some(PinChange {
            pinned: chat::pinned_snapshot(pinned),
            changed,
        }))
    }

    async fn pin(&self, conversation_id: DbId, message_id: DbId) -> Result<PinChange, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let pinned = state.pins.entry(conversation_id).or_default();
        let changed = chat::pin(pinned, message_id);
        Ok(PinChange {
            pinned: chat::pinned_snapshot(pinned),
            changed,
        })
    }

    async fn unpin(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<PinChange, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let pinned = state.pins.entry(conversation_id).or_default();
        let changed = chat::unpin(pinned, message_id);
        Ok(PinChange {
            pinned: chat::pinned_snapshot(pinned),
            changed,
        })
    }

    async fn pinned(&self, conversation_id: DbId) -> Result<Vec<DbId>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .pins
            .get(&conversation_id)
            .map(chat::pinned_snapshot)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<Option<SchedulingConfig>, StoreError> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn save(
        &self,
        mut config: SchedulingConfig,
        expected_version: i64,
    ) -> Result<Option<SchedulingConfig>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let current = state.settings.as_ref().map_or(0, |c| c.version);
        if current != expected_version {
            return Ok(None);
        }
        config.version = current + 1;
        state.settings = Some(config.clone());
        Ok(Some(config))
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn product(&self, id: DbId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }
}

//! PostgreSQL implementation of the store traits, delegating to the
//! `aether-db` repositories.

use std::collections::BTreeMap;
use std::time::Duration;

use aether_core::appointment::{Appointment, AppointmentStatus, DayKey, NewAppointment, SlotKey};
use aether_core::chat::{ChatMessage, Conversation, MessageSender};
use aether_core::scheduling_config::SchedulingConfig;
use aether_core::types::{DbId, SlotTime};
use aether_db::models::appointment::{CreateAppointment, RescheduleRows};
use aether_db::repositories::{
    AppointmentRepo, ConversationRepo, ProductRepo, SchedulingSettingsRepo,
};
use aether_db::DbPool;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;
use crate::store::{
    AppointmentLedger, ConversationStore, InsertOutcome, PinChange, Product, ProductCatalog,
    RescheduleOutcome, SettingsStore, TransitionOutcome,
};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    /// Bound on waiting for another instance's day lock.
    lock_wait: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, lock_wait: Duration) -> Self {
        Self { pool, lock_wait }
    }
}

#[async_trait]
impl AppointmentLedger for PgStore {
    async fn get(&self, id: DbId) -> Result<Option<Appointment>, StoreError> {
        let row = AppointmentRepo::find_by_id(&self.pool, id).await?;
        Ok(row.map(Appointment::try_from).transpose()?)
    }

    async fn insert_within_capacity(
        &self,
        input: NewAppointment,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError> {
        let create = CreateAppointment::from(&input);
        match AppointmentRepo::insert_within_capacity(
            &self.pool,
            &create,
            i64::from(capacity),
            self.lock_wait,
        )
        .await?
        {
            Some(row) => Ok(InsertOutcome::Inserted(row.try_into()?)),
            None => Ok(InsertOutcome::AtCapacity),
        }
    }

    async fn count_active(&self, slot: SlotKey) -> Result<u32, StoreError> {
        let count = AppointmentRepo::count_active(
            &self.pool,
            slot.date,
            slot.time.as_naive(),
            slot.branch_id,
        )
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn active_counts_for_day(
        &self,
        day: DayKey,
    ) -> Result<BTreeMap<SlotTime, u32>, StoreError> {
        let rows = AppointmentRepo::active_counts_for_day(&self.pool, day.date, day.branch_id).await?;
        Ok(rows
            .into_iter()
            .map(|r| (SlotTime::from(r.time), u32::try_from(r.active).unwrap_or(u32::MAX)))
            .collect())
    }

    async fn list_upcoming(
        &self,
        customer_id: DbId,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = AppointmentRepo::list_upcoming(&self.pool, customer_id, from).await?;
        Ok(rows
            .into_iter()
            .map(Appointment::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn transition(
        &self,
        id: DbId,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<TransitionOutcome, StoreError> {
        if let Some(row) =
            AppointmentRepo::transition(&self.pool, id, expected.as_str(), next.as_str()).await?
        {
            return Ok(TransitionOutcome::Applied(row.try_into()?));
        }
        // Lost the compare-and-set; report what is there now.
        match AppointmentRepo::find_by_id(&self.pool, id).await? {
            Some(row) => Ok(TransitionOutcome::Stale(row.try_into()?)),
            None => Ok(TransitionOutcome::NotFound),
        }
    }

    async fn reschedule(
        &self,
        prior_id: DbId,
        expected: AppointmentStatus,
        replacement: NewAppointment,
        capacity: u32,
    ) -> Result<RescheduleOutcome, StoreError> {
        let create = CreateAppointment::from(&replacement);
        let rows = AppointmentRepo::reschedule(
            &self.pool,
            prior_id,
            expected.as_str(),
            &create,
            i64::from(capacity),
            self.lock_wait,
        )
        .await?;
        Ok(match rows {
            RescheduleRows::Done { prior, replacement } => RescheduleOutcome::Rescheduled {
                prior: prior.try_into()?,
                replacement: replacement.try_into()?,
            },
            RescheduleRows::AtCapacity => RescheduleOutcome::AtCapacity,
            RescheduleRows::Stale(row) => RescheduleOutcome::Stale(row.try_into()?),
            RescheduleRows::NotFound => RescheduleOutcome::NotFound,
        })
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn conversation(&self, id: DbId) -> Result<Option<Conversation>, StoreError> {
        Ok(ConversationRepo::find_by_id(&self.pool, id)
            .await?
            .map(Conversation::from))
    }

    async fn conversation_for_customer(
        &self,
        customer_id: DbId,
    ) -> Result<Conversation, StoreError> {
        Ok(ConversationRepo::find_or_create_for_customer(&self.pool, customer_id)
            .await?
            .into())
    }

    async fn append_message(
        &self,
        conversation_id: DbId,
        sender: MessageSender,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let row =
            ConversationRepo::append_message(&self.pool, conversation_id, sender.as_str(), content)
                .await?;
        Ok(row.try_into()?)
    }

    async fn list_messages(&self, conversation_id: DbId) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = ConversationRepo::list_messages(&self.pool, conversation_id).await?;
        Ok(rows
            .into_iter()
            .map(ChatMessage::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn recent_messages(
        &self,
        conversation_id: DbId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = ConversationRepo::recent_messages(&self.pool, conversation_id, limit).await?;
        Ok(rows
            .into_iter()
            .map(ChatMessage::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn message_in_conversation(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<bool, StoreError> {
        Ok(ConversationRepo::message_exists(&self.pool, conversation_id, message_id).await?)
    }

    async fn message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Option<ChatMessage>, StoreError> {
        let row = ConversationRepo::find_message(&self.pool, conversation_id, message_id).await?;
        Ok(row.map(ChatMessage::try_from).transpose()?)
    }

    async fn edit_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
        content: &str,
    ) -> Result<Option<ChatMessage>, StoreError> {
        let row =
            ConversationRepo::edit_message(&self.pool, conversation_id, message_id, content)
                .await?;
        Ok(row.map(ChatMessage::try_from).transpose()?)
    }

    async fn delete_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Option<PinChange>, StoreError> {
        let Some(changed) =
            ConversationRepo::delete_message(&self.pool, conversation_id, message_id).await?
        else {
            return Ok(None);
        };
        let pinned = ConversationRepo::pinned_ids(&self.pool, conversation_id).await?;
        Ok(Some(PinChange { pinned, changed }))
    }

    async fn pin(&self, conversation_id: DbId, message_id: DbId) -> Result<PinChange, StoreError> {
        let changed = ConversationRepo::pin(&self.pool, conversation_id, message_id).await?;
        let pinned = ConversationRepo::pinned_ids(&self.pool, conversation_id).await?;
        Ok(PinChange { pinned, changed })
    }

    async fn unpin(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<PinChange, StoreError> {
        let changed = ConversationRepo::unpin(&self.pool, conversation_id, message_id).await?;
        let pinned = ConversationRepo::pinned_ids(&self.pool, conversation_id).await?;
        Ok(PinChange { pinned, changed })
    }

    async fn pinned(&self, conversation_id: DbId) -> Result<Vec<DbId>, StoreError> {
        Ok(ConversationRepo::pinned_ids(&self.pool, conversation_id).await?)
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn load(&self) -> Result<Option<SchedulingConfig>, StoreError> {
        let Some(row) = SchedulingSettingsRepo::load(&self.pool).await? else {
            return Ok(None);
        };
        let mut config: SchedulingConfig = serde_json::from_value(row.config)?;
        config.version = row.version;
        Ok(Some(config))
    }

    async fn save(
        &self,
        config: SchedulingConfig,
        expected_version: i64,
    ) -> Result<Option<SchedulingConfig>, StoreError> {
        let document = serde_json::to_value(&config)?;
        let Some(row) = SchedulingSettingsRepo::save(&self.pool, &document, expected_version).await?
        else {
            return Ok(None);
        };
        Ok(Some(SchedulingConfig {
            version: row.version,
            ..config
        }))
    }
}

#[async_trait]
impl ProductCatalog for PgStore {
    async fn product(&self, id: DbId) -> Result<Option<Product>, StoreError> {
        Ok(ProductRepo::find_by_id(&self.pool, id).await?.map(|row| Product {
            id: row.id,
            name: row.name,
            requires_confirmation: row.requires_confirmation,
        }))
    }
}

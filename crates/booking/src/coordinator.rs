//! The booking coordinator: the only writer of appointment records.
//!
//! A booking decision runs under a per-(date, branch) lock with a bounded
//! wait, loads the configuration fresh inside that window, and commits
//! through the ledger's capacity-guarded insert. The ledger's own atomicity
//! keeps the capacity invariant even when several server processes share a
//! database and the in-process lock cannot see each other.

use std::sync::Arc;
use std::time::Duration;

use aether_core::appointment::{
    self, state_machine, Appointment, AppointmentStatus, BookingRequest, DayKey, NewAppointment,
    Requester,
};
use aether_core::calendar;
use aether_core::chat::{self, MessageSender};
use aether_core::realtime::RoomEvent;
use aether_core::scheduling_config::{self, SchedulingConfig};
use aether_core::types::{DbId, SlotTime};
use aether_events::RoomHub;
use chrono::NaiveDate;
use serde::Serialize;

use crate::availability::{Availability, AvailabilityEngine};
use crate::clock::{Clock, SystemClock};
use crate::error::{BookingError, StoreError};
use crate::keyed_lock::{KeyGuard, KeyedLock};
use crate::store::{InsertOutcome, RescheduleOutcome, Stores, TransitionOutcome};

/// Default bound on waiting for a day's booking lock.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);

/// Default number of alternates offered on a slot conflict.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

/// Default number of days after the requested date searched for alternates.
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 7;

/// Tunables for booking decisions.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// Reject requests without a branch (deployments with branches).
    pub require_branch: bool,
    pub lock_wait: Duration,
    pub suggestion_limit: usize,
    pub lookahead_days: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            require_branch: false,
            lock_wait: DEFAULT_LOCK_WAIT,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }
}

/// Both records touched by a successful reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rescheduled {
    pub prior: Appointment,
    pub replacement: Appointment,
}

pub struct BookingCoordinator {
    stores: Stores,
    rooms: Arc<RoomHub>,
    availability: AvailabilityEngine,
    locks: KeyedLock<DayKey>,
    policy: BookingPolicy,
    clock: Arc<dyn Clock>,
}

impl BookingCoordinator {
    pub fn new(stores: Stores, rooms: Arc<RoomHub>, policy: BookingPolicy) -> Self {
        let availability = AvailabilityEngine::new(stores.ledger.clone(), stores.settings.clone());
        Self {
            stores,
            rooms,
            availability,
            locks: KeyedLock::new(),
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for "today".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn availability(
        &self,
        date: NaiveDate,
        branch_id: Option<DbId>,
    ) -> Result<Availability, BookingError> {
        Ok(self.availability.available(date, branch_id).await?)
    }

    pub async fn booked_slots(
        &self,
        date: NaiveDate,
        branch_id: Option<DbId>,
    ) -> Result<Vec<SlotTime>, BookingError> {
        Ok(self.availability.booked_slots(date, branch_id).await?)
    }

    /// The customer's active appointments from today on, by (date, time).
    pub async fn list_upcoming(&self, customer_id: DbId) -> Result<Vec<Appointment>, BookingError> {
        Ok(self
            .stores
            .ledger
            .list_upcoming(customer_id, self.today())
            .await?)
    }

    /// Fetch one appointment the requester may see.
    pub async fn get(&self, id: DbId, requester: Requester) -> Result<Appointment, BookingError> {
        match self.stores.ledger.get(id).await? {
            Some(appointment) if requester.may_act_on(&appointment) => Ok(appointment),
            _ => Err(not_found(id)),
        }
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub async fn scheduling_config(&self) -> Result<SchedulingConfig, BookingError> {
        Ok(self.availability.current_config().await?)
    }

    /// Validate and store a new configuration if `config.version` is still
    /// the stored version.
    pub async fn update_scheduling_config(
        &self,
        mut config: SchedulingConfig,
    ) -> Result<SchedulingConfig, BookingError> {
        scheduling_config::validate_config(&config)?;
        config.normalize();
        let expected = config.version;
        match self.stores.settings.save(config, expected).await? {
            Some(saved) => {
                tracing::info!(version = saved.version, "Scheduling configuration updated");
                Ok(saved)
            }
            None => Err(BookingError::Conflict(format!(
                "Scheduling configuration changed since version {expected}, reload and retry"
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Booking
    // -----------------------------------------------------------------------

    /// Book a slot. Fails with `SlotConflict` (carrying alternates) when the
    /// slot is at capacity at commit time; the conflict notice is also
    /// appended to the customer's conversation.
    pub async fn book(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        appointment::validate_booking_request(
            &request,
            self.today(),
            self.policy.require_branch,
        )?;

        let product = self
            .stores
            .products
            .product(request.product_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("Product {} not found", request.product_id))
            })?;
        let status = if product.requires_confirmation {
            AppointmentStatus::PendingConfirmation
        } else {
            AppointmentStatus::Booked
        };

        let input = NewAppointment {
            customer_id: request.customer_id,
            staff_id: request.staff_id,
            product_id: request.product_id,
            branch_id: request.branch_id,
            date: request.date,
            time: request.time,
            status,
            notes: request.notes.clone(),
            rescheduled_from: None,
        };

        let guard = self.lock_day(request.day_key()).await?;
        let config = self.availability.current_config().await?;
        let capacity = bookable_capacity(&config, request.date, request.time)?;
        let outcome = self
            .stores
            .ledger
            .insert_within_capacity(input, capacity)
            .await?;
        drop(guard);

        match outcome {
            InsertOutcome::Inserted(appointment) => {
                tracing::info!(
                    appointment_id = appointment.id,
                    customer_id = appointment.customer_id,
                    date = %appointment.date,
                    time = %appointment.time,
                    status = %appointment.status,
                    "Appointment booked"
                );
                self.announce(&appointment, None).await;
                Ok(appointment)
            }
            InsertOutcome::AtCapacity => {
                let conflict = self
                    .slot_conflict(&config, request.date, request.time, request.branch_id)
                    .await?;
                self.announce_conflict(request.customer_id, &conflict).await;
                Err(conflict)
            }
        }
    }

    /// Move a `booked` appointment to a new slot. The prior record becomes
    /// `rescheduled` and links to the replacement.
    pub async fn reschedule(
        &self,
        id: DbId,
        requester: Requester,
        date: NaiveDate,
        time: SlotTime,
        branch_id: Option<DbId>,
    ) -> Result<Rescheduled, BookingError> {
        appointment::validate_booking_date(date, self.today())?;
        if self.policy.require_branch && branch_id.is_none() {
            return Err(BookingError::Validation("branch_id is required".to_string()));
        }

        let current = self.get(id, requester).await?;
        if current.status.is_terminal() {
            return Err(already_terminal(&current));
        }
        state_machine::validate_transition(current.status, AppointmentStatus::Rescheduled)?;

        let replacement = NewAppointment {
            customer_id: current.customer_id,
            staff_id: current.staff_id,
            product_id: current.product_id,
            branch_id,
            date,
            time,
            status: AppointmentStatus::Booked,
            notes: current.notes.clone(),
            rescheduled_from: Some(current.id),
        };

        let guard = self.lock_day(DayKey { date, branch_id }).await?;
        let config = self.availability.current_config().await?;
        let capacity = bookable_capacity(&config, date, time)?;
        let outcome = self
            .stores
            .ledger
            .reschedule(id, AppointmentStatus::Booked, replacement, capacity)
            .await?;
        drop(guard);

        match outcome {
            RescheduleOutcome::Rescheduled { prior, replacement } => {
                tracing::info!(
                    appointment_id = prior.id,
                    replacement_id = replacement.id,
                    date = %replacement.date,
                    time = %replacement.time,
                    "Appointment rescheduled"
                );
                self.announce(&replacement, Some(&prior)).await;
                Ok(Rescheduled { prior, replacement })
            }
            RescheduleOutcome::AtCapacity => {
                let conflict = self.slot_conflict(&config, date, time, branch_id).await?;
                self.announce_conflict(current.customer_id, &conflict).await;
                Err(conflict)
            }
            // Only a move to a terminal status can beat us here.
            RescheduleOutcome::Stale(latest) => Err(already_terminal(&latest)),
            RescheduleOutcome::NotFound => Err(not_found(id)),
        }
    }

    // -----------------------------------------------------------------------
    // Status transitions
    // -----------------------------------------------------------------------

    /// Cancel a `booked` or `pending_confirmation` appointment. Customers may
    /// only cancel their own; terminal appointments report `NotFound` and are
    /// left untouched.
    pub async fn cancel(&self, id: DbId, requester: Requester) -> Result<Appointment, BookingError> {
        self.change_status(id, requester, AppointmentStatus::Cancelled)
            .await
    }

    /// Staff confirmation of a `pending_confirmation` appointment.
    pub async fn confirm(&self, id: DbId, requester: Requester) -> Result<Appointment, BookingError> {
        if !requester.is_staff() {
            return Err(not_found(id));
        }
        self.change_status(id, requester, AppointmentStatus::Booked)
            .await
    }

    /// Staff marks a `booked` appointment as served.
    pub async fn complete(&self, id: DbId, requester: Requester) -> Result<Appointment, BookingError> {
        if !requester.is_staff() {
            return Err(not_found(id));
        }
        self.change_status(id, requester, AppointmentStatus::Completed)
            .await
    }

    async fn change_status(
        &self,
        id: DbId,
        requester: Requester,
        next: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let mut current = self.get(id, requester).await?;
        loop {
            if current.status.is_terminal() {
                return Err(already_terminal(&current));
            }
            state_machine::validate_transition(current.status, next)?;

            match self
                .stores
                .ledger
                .transition(id, current.status, next)
                .await?
            {
                TransitionOutcome::Applied(updated) => {
                    tracing::info!(
                        appointment_id = id,
                        from = %current.status,
                        to = %updated.status,
                        "Appointment status changed"
                    );
                    self.announce(&updated, None).await;
                    return Ok(updated);
                }
                // Statuses only move forward, so this re-check terminates.
                TransitionOutcome::Stale(latest) => current = latest,
                TransitionOutcome::NotFound => return Err(not_found(id)),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn lock_day(&self, key: DayKey) -> Result<KeyGuard, BookingError> {
        self.locks
            .acquire(key, self.policy.lock_wait)
            .await
            .map_err(|_| {
                tracing::warn!(day = %key, "Booking lock wait exceeded");
                BookingError::Busy
            })
    }

    async fn slot_conflict(
        &self,
        config: &SchedulingConfig,
        date: NaiveDate,
        time: SlotTime,
        branch_id: Option<DbId>,
    ) -> Result<BookingError, StoreError> {
        let suggested_slots = self
            .availability
            .alternatives(
                config,
                date,
                time,
                branch_id,
                self.policy.suggestion_limit,
                self.policy.lookahead_days,
            )
            .await?;
        tracing::warn!(
            date = %date,
            time = %time,
            branch_id,
            suggestions = suggested_slots.len(),
            "Slot at capacity"
        );
        Ok(BookingError::SlotConflict {
            message: chat::conflict_message(time, &suggested_slots),
            suggested_slots,
        })
    }

    /// Record the change in the customer's conversation and publish it to
    /// the conversation room. Failures here never undo the booking.
    async fn announce(&self, subject: &Appointment, replaced: Option<&Appointment>) {
        if let Err(err) = self.try_announce(subject, replaced).await {
            tracing::error!(
                appointment_id = subject.id,
                error = %err,
                "Failed to record appointment status message"
            );
        }
    }

    async fn try_announce(
        &self,
        subject: &Appointment,
        replaced: Option<&Appointment>,
    ) -> Result<(), StoreError> {
        let conversation_id = self
            .append_system_message(subject.customer_id, &chat::status_message(subject))
            .await?;
        for appointment in replaced.into_iter().chain(std::iter::once(subject)) {
            self.rooms
                .publish(RoomEvent::AppointmentStatusChanged {
                    conversation_id,
                    appointment: appointment.clone(),
                })
                .await;
        }
        Ok(())
    }

    /// Tell the customer which slot was lost and what is still open. The
    /// conflict itself is returned to the caller either way.
    async fn announce_conflict(&self, customer_id: DbId, conflict: &BookingError) {
        let BookingError::SlotConflict { message, .. } = conflict else {
            return;
        };
        if let Err(err) = self.append_system_message(customer_id, message).await {
            tracing::error!(customer_id, error = %err, "Failed to record slot conflict message");
        }
    }

    /// Append a system line to the customer's conversation and publish it.
    /// Returns the conversation id.
    async fn append_system_message(
        &self,
        customer_id: DbId,
        content: &str,
    ) -> Result<DbId, StoreError> {
        let conversation = self
            .stores
            .conversations
            .conversation_for_customer(customer_id)
            .await?;
        let message = self
            .stores
            .conversations
            .append_message(conversation.id, MessageSender::System, content)
            .await?;
        self.rooms
            .publish(RoomEvent::MessageAppended {
                conversation_id: conversation.id,
                message,
            })
            .await;
        Ok(conversation.id)
    }
}

/// Capacity of `time` on `date`, or a validation error if it is not a
/// bookable slot under `config`.
fn bookable_capacity(
    config: &SchedulingConfig,
    date: NaiveDate,
    time: SlotTime,
) -> Result<u32, BookingError> {
    let rule = calendar::resolve(config, date);
    if let Some(reason) = rule.closure {
        return Err(BookingError::Validation(format!(
            "{date} is not open for booking: {}",
            reason.describe()
        )));
    }
    if !calendar::generate_slots(&rule).contains(&time) {
        return Err(BookingError::Validation(format!(
            "{time} is not a bookable time on {date}"
        )));
    }
    Ok(rule.capacity)
}

fn not_found(id: DbId) -> BookingError {
    BookingError::NotFound(format!("Appointment {id} not found"))
}

fn already_terminal(appointment: &Appointment) -> BookingError {
    BookingError::NotFound(format!(
        "Appointment {} is already {}",
        appointment.id, appointment.status
    ))
}

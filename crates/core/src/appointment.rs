//! Appointment domain types, status state machine and booking validation.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{DbId, SlotTime, Timestamp};

/// Maximum length of free-text appointment notes.
pub const MAX_NOTES_LENGTH: u64 = 1000;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    PendingConfirmation,
    Rescheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Statuses that occupy capacity in a slot.
    pub const ACTIVE: [AppointmentStatus; 2] =
        [AppointmentStatus::Booked, AppointmentStatus::PendingConfirmation];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "booked",
            AppointmentStatus::PendingConfirmation => "pending_confirmation",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    /// `booked` and `pending_confirmation` count against slot capacity.
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        state_machine::valid_transitions(*self).is_empty()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(AppointmentStatus::Booked),
            "pending_confirmation" => Ok(AppointmentStatus::PendingConfirmation),
            "rescheduled" => Ok(AppointmentStatus::Rescheduled),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(CoreError::Validation(format!(
                "Unknown appointment status '{other}'"
            ))),
        }
    }
}

/// Allowed status transitions.
///
/// ```text
/// pending_confirmation -> booked | cancelled
/// booked               -> cancelled | rescheduled | completed
/// rescheduled, cancelled, completed: terminal
/// ```
pub mod state_machine {
    use super::AppointmentStatus::{self, *};
    use crate::error::CoreError;

    /// Returns the statuses reachable from `from`.
    pub fn valid_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
        match from {
            PendingConfirmation => &[Booked, Cancelled],
            Booked => &[Cancelled, Rescheduled, Completed],
            Rescheduled | Cancelled | Completed => &[],
        }
    }

    pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a transition, describing both ends when it is not allowed.
    pub fn validate_transition(
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Invalid transition: {from} -> {to}"
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A persisted appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: DbId,
    pub customer_id: DbId,
    pub staff_id: Option<DbId>,
    pub product_id: DbId,
    pub branch_id: Option<DbId>,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    /// The appointment this one replaced, when created by a reschedule.
    pub rescheduled_from: Option<DbId>,
    /// The replacement, once this appointment has been rescheduled.
    pub rescheduled_to: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Appointment {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            date: self.date,
            time: self.time,
            branch_id: self.branch_id,
        }
    }
}

/// Input for inserting a new appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub customer_id: DbId,
    pub staff_id: Option<DbId>,
    pub product_id: DbId,
    pub branch_id: Option<DbId>,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub rescheduled_from: Option<DbId>,
}

impl NewAppointment {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            date: self.date,
            time: self.time,
            branch_id: self.branch_id,
        }
    }

    /// Materialize into a record with the given id and timestamp.
    pub fn into_appointment(self, id: DbId, now: Timestamp) -> Appointment {
        Appointment {
            id,
            customer_id: self.customer_id,
            staff_id: self.staff_id,
            product_id: self.product_id,
            branch_id: self.branch_id,
            date: self.date,
            time: self.time,
            status: self.status,
            notes: self.notes,
            rescheduled_from: self.rescheduled_from,
            rescheduled_to: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The (date, time, branch) unit whose active count is bounded by capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: SlotTime,
    pub branch_id: Option<DbId>,
}

/// The serialization scope for booking decisions: one date at one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey {
    pub date: NaiveDate,
    pub branch_id: Option<DbId>,
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.branch_id {
            Some(branch) => write!(f, "{}@{branch}", self.date),
            None => write!(f, "{}@-", self.date),
        }
    }
}

impl From<SlotKey> for DayKey {
    fn from(key: SlotKey) -> Self {
        Self {
            date: key.date,
            branch_id: key.branch_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Requesters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

/// Who is asking for a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: DbId,
    pub role: Role,
}

impl Requester {
    pub fn customer(id: DbId) -> Self {
        Self {
            id,
            role: Role::Customer,
        }
    }

    pub fn staff(id: DbId) -> Self {
        Self {
            id,
            role: Role::Staff,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Staff | Role::Admin)
    }

    /// Customers may only act on their own appointments; staff act on any.
    pub fn may_act_on(&self, appointment: &Appointment) -> bool {
        self.is_staff() || appointment.customer_id == self.id
    }
}

// ---------------------------------------------------------------------------
// Booking requests
// ---------------------------------------------------------------------------

/// A request to book an appointment, from the booking form or chat intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BookingRequest {
    #[validate(range(min = 1, message = "customer_id is required"))]
    pub customer_id: DbId,
    #[validate(range(min = 1, message = "product_id is required"))]
    pub product_id: DbId,
    pub date: NaiveDate,
    pub time: SlotTime,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub branch_id: Option<DbId>,
    #[serde(default)]
    pub staff_id: Option<DbId>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl BookingRequest {
    pub fn day_key(&self) -> DayKey {
        DayKey {
            date: self.date,
            branch_id: self.branch_id,
        }
    }
}

/// Check the static shape of a booking request. Slot validity against the
/// calendar is checked later by the coordinator.
pub fn validate_booking_request(
    request: &BookingRequest,
    today: NaiveDate,
    require_branch: bool,
) -> Result<(), CoreError> {
    request
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    validate_booking_date(request.date, today)?;

    if require_branch && request.branch_id.is_none() {
        return Err(CoreError::Validation("branch_id is required".to_string()));
    }

    if request
        .notes
        .as_deref()
        .is_some_and(|n| n.chars().count() as u64 > MAX_NOTES_LENGTH)
    {
        return Err(CoreError::Validation(format!(
            "Notes exceed maximum length of {MAX_NOTES_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Appointments cannot be placed on dates before `today`.
pub fn validate_booking_date(date: NaiveDate, today: NaiveDate) -> Result<(), CoreError> {
    if date < today {
        return Err(CoreError::Validation(format!(
            "Appointment date {date} is in the past"
        )));
    }
    Ok(())
}

//! Conversation messages, pinned-message sets and appointment system
//! messages appended to a customer's transcript.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::appointment::{Appointment, AppointmentStatus, Requester};
use crate::calendar::SuggestedSlot;
use crate::error::CoreError;
use crate::types::{DbId, SlotTime, Timestamp};

/// Number of recent messages handed to the interpreter as history.
pub const HISTORY_WINDOW: usize = 20;

/// Maximum length of a single chat message.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    User,
    Ai,
    System,
}

impl MessageSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSender::User => "user",
            MessageSender::Ai => "ai",
            MessageSender::System => "system",
        }
    }
}

impl std::str::FromStr for MessageSender {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageSender::User),
            "ai" => Ok(MessageSender::Ai),
            "system" => Ok(MessageSender::System),
            other => Err(CoreError::Validation(format!(
                "Unknown message sender '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: DbId,
    pub conversation_id: DbId,
    pub sender: MessageSender,
    pub content: String,
    pub created_at: Timestamp,
}

/// A conversation owned by one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: DbId,
    pub customer_id: DbId,
    pub created_at: Timestamp,
}

/// Validate the body of a message before it is appended.
pub fn validate_message_content(content: &str) -> Result<(), CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::Validation(
            "Message content must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Message exceeds maximum length of {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Whether `requester` may edit or delete `message` in `conversation`.
///
/// Staff may change any message. A customer may change only the messages
/// they wrote in their own conversation.
pub fn may_modify(requester: Requester, conversation: &Conversation, message: &ChatMessage) -> bool {
    requester.is_staff()
        || (conversation.customer_id == requester.id && message.sender == MessageSender::User)
}

// ---------------------------------------------------------------------------
// Pins
// ---------------------------------------------------------------------------

/// Add `message_id` to the pinned set. Returns `true` if the set changed.
///
/// The caller must have verified the message belongs to the conversation.
pub fn pin(pinned: &mut BTreeSet<DbId>, message_id: DbId) -> bool {
    pinned.insert(message_id)
}

/// Remove `message_id` from the pinned set. Returns `true` if the set changed.
pub fn unpin(pinned: &mut BTreeSet<DbId>, message_id: DbId) -> bool {
    pinned.remove(&message_id)
}

/// The authoritative pinned-id list broadcast to clients, ascending.
pub fn pinned_snapshot(pinned: &BTreeSet<DbId>) -> Vec<DbId> {
    pinned.iter().copied().collect()
}

// ---------------------------------------------------------------------------
// System messages
// ---------------------------------------------------------------------------

fn describe_slot(appointment: &Appointment) -> String {
    match appointment.branch_id {
        Some(branch) => format!(
            "{} at {} (branch {branch})",
            appointment.date, appointment.time
        ),
        None => format!("{} at {}", appointment.date, appointment.time),
    }
}

/// Transcript line describing an appointment's current status.
pub fn status_message(appointment: &Appointment) -> String {
    let slot = describe_slot(appointment);
    match appointment.status {
        AppointmentStatus::Booked if appointment.rescheduled_from.is_some() => {
            format!("Appointment #{} rescheduled to {slot}.", appointment.id)
        }
        AppointmentStatus::Booked => format!("Appointment #{} confirmed for {slot}.", appointment.id),
        AppointmentStatus::PendingConfirmation => format!(
            "Appointment #{} requested for {slot}; awaiting staff confirmation.",
            appointment.id
        ),
        AppointmentStatus::Cancelled => {
            format!("Appointment #{} on {slot} was cancelled.", appointment.id)
        }
        AppointmentStatus::Completed => {
            format!("Appointment #{} on {slot} is completed.", appointment.id)
        }
        AppointmentStatus::Rescheduled => {
            format!("Appointment #{} on {slot} was moved.", appointment.id)
        }
    }
}

/// Transcript line for a booking attempt that lost its slot.
pub fn conflict_message(time: SlotTime, suggested: &[SuggestedSlot]) -> String {
    if suggested.is_empty() {
        return format!("The {time} slot is no longer available and no alternatives were found.");
    }
    let options: Vec<String> = suggested
        .iter()
        .map(|s| format!("{} {}", s.date, s.time))
        .collect();
    format!(
        "The {time} slot is no longer available. Available alternatives: {}.",
        options.join(", ")
    )
}

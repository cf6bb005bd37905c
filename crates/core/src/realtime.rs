//! Realtime room protocol.
//!
//! Rooms are scoped per conversation id. Server events are serialized as
//! JSON with an internally-tagged `"type"` discriminator so the frontend can
//! route them by type string.

use serde::{Deserialize, Serialize};

use crate::appointment::Appointment;
use crate::chat::ChatMessage;
use crate::types::DbId;

/// A realtime room is identified by its conversation id.
pub type RoomId = DbId;

/// Events published to a conversation room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RoomEvent {
    /// An appointment owned by the conversation's customer changed status.
    #[serde(rename = "appointment.status_changed")]
    AppointmentStatusChanged {
        conversation_id: DbId,
        appointment: Appointment,
    },

    /// A message was appended to the transcript.
    #[serde(rename = "message.appended")]
    MessageAppended {
        conversation_id: DbId,
        message: ChatMessage,
    },

    /// A message's content was replaced.
    #[serde(rename = "message.edited")]
    MessageEdited {
        conversation_id: DbId,
        message: ChatMessage,
    },

    /// A message was removed from the transcript. When it was pinned, a
    /// `messages.pinned_changed` with the remaining set follows.
    #[serde(rename = "message.deleted")]
    MessageDeleted {
        conversation_id: DbId,
        message_id: DbId,
    },

    /// The pinned set changed. Always the full set, never a delta.
    #[serde(rename = "messages.pinned_changed")]
    PinnedChanged {
        conversation_id: DbId,
        pinned_message_ids: Vec<DbId>,
    },
}

impl RoomEvent {
    pub fn room(&self) -> RoomId {
        match self {
            RoomEvent::AppointmentStatusChanged {
                conversation_id, ..
            }
            | RoomEvent::MessageAppended {
                conversation_id, ..
            }
            | RoomEvent::MessageEdited {
                conversation_id, ..
            }
            | RoomEvent::MessageDeleted {
                conversation_id, ..
            }
            | RoomEvent::PinnedChanged {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// The `"type"` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RoomEvent::AppointmentStatusChanged { .. } => "appointment.status_changed",
            RoomEvent::MessageAppended { .. } => "message.appended",
            RoomEvent::MessageEdited { .. } => "message.edited",
            RoomEvent::MessageDeleted { .. } => "message.deleted",
            RoomEvent::PinnedChanged { .. } => "messages.pinned_changed",
        }
    }
}

/// Frames a client sends over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "room.join")]
    RoomJoin { conversation_id: DbId },

    #[serde(rename = "room.leave")]
    RoomLeave { conversation_id: DbId },
}

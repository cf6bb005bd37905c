//! Bridges the conversation transcript, the message interpreter and the
//! booking coordinator, and owns pin/unpin for conversations.

use std::sync::Arc;

use aether_core::appointment::{Appointment, BookingRequest, Requester};
use aether_core::calendar::SuggestedSlot;
use aether_core::chat::{self, ChatMessage, Conversation, MessageSender, HISTORY_WINDOW};
use aether_core::intent::{BookingIntent, MessageInterpreter};
use aether_core::realtime::RoomEvent;
use aether_core::types::DbId;
use aether_events::RoomHub;
use serde::Serialize;

use crate::coordinator::BookingCoordinator;
use crate::error::{BookingError, StoreError};
use crate::store::ConversationStore;

/// What happened to a booking intent extracted from a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingAttempt {
    Booked {
        appointment: Appointment,
    },
    Conflict {
        message: String,
        suggested_slots: Vec<SuggestedSlot>,
    },
    Rejected {
        message: String,
    },
}

/// Result of deleting a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageDeletion {
    pub message_id: DbId,
    pub pinned_message_ids: Vec<DbId>,
}

/// The messages produced by one user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatExchange {
    pub user_message: ChatMessage,
    pub reply: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingAttempt>,
}

pub struct ChatService {
    conversations: Arc<dyn ConversationStore>,
    rooms: Arc<RoomHub>,
    coordinator: Arc<BookingCoordinator>,
    interpreter: Arc<dyn MessageInterpreter>,
}

impl ChatService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        rooms: Arc<RoomHub>,
        coordinator: Arc<BookingCoordinator>,
        interpreter: Arc<dyn MessageInterpreter>,
    ) -> Self {
        Self {
            conversations,
            rooms,
            coordinator,
            interpreter,
        }
    }

    /// Fetch a conversation by id.
    pub async fn conversation(&self, conversation_id: DbId) -> Result<Conversation, BookingError> {
        self.conversations
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("Conversation {conversation_id} not found"))
            })
    }

    /// The customer's conversation, created on first use.
    pub async fn conversation_for_customer(
        &self,
        customer_id: DbId,
    ) -> Result<Conversation, BookingError> {
        Ok(self
            .conversations
            .conversation_for_customer(customer_id)
            .await?)
    }

    pub async fn messages(&self, conversation_id: DbId) -> Result<Vec<ChatMessage>, BookingError> {
        self.conversation(conversation_id).await?;
        Ok(self.conversations.list_messages(conversation_id).await?)
    }

    pub async fn pinned(&self, conversation_id: DbId) -> Result<Vec<DbId>, BookingError> {
        self.conversation(conversation_id).await?;
        Ok(self.conversations.pinned(conversation_id).await?)
    }

    /// Append a user message, reply through the interpreter and, when the
    /// interpreter extracted a complete booking intent, book on the
    /// customer's behalf.
    pub async fn post_message(
        &self,
        conversation_id: DbId,
        text: &str,
    ) -> Result<ChatExchange, BookingError> {
        chat::validate_message_content(text)?;
        let conversation = self.conversation(conversation_id).await?;

        let history = self
            .conversations
            .recent_messages(conversation_id, HISTORY_WINDOW)
            .await?;
        let user_message = self
            .append(conversation_id, MessageSender::User, text)
            .await?;

        let interpretation = self.interpreter.interpret(text, &history).await;
        let reply = self
            .append(conversation_id, MessageSender::Ai, &interpretation.reply_text)
            .await?;

        let booking = match interpretation.booking_intent {
            Some(intent) if intent.is_actionable() => {
                Some(self.book_intent(&conversation, intent).await?)
            }
            _ => None,
        };

        Ok(ChatExchange {
            user_message,
            reply,
            booking,
        })
    }

    async fn book_intent(
        &self,
        conversation: &Conversation,
        intent: BookingIntent,
    ) -> Result<BookingAttempt, BookingError> {
        let (Some(date), Some(time), Some(product_id)) = (intent.date, intent.time, intent.product_id)
        else {
            return Ok(BookingAttempt::Rejected {
                message: "Booking details are incomplete".to_string(),
            });
        };
        let request = BookingRequest {
            customer_id: conversation.customer_id,
            product_id,
            date,
            time,
            branch_id: intent.branch_id,
            staff_id: None,
            notes: intent.notes,
        };

        // The coordinator writes the status or conflict message itself.
        let message = match self.coordinator.book(request).await {
            Ok(appointment) => return Ok(BookingAttempt::Booked { appointment }),
            Err(BookingError::SlotConflict {
                message,
                suggested_slots,
            }) => {
                return Ok(BookingAttempt::Conflict {
                    message,
                    suggested_slots,
                })
            }
            Err(
                BookingError::Validation(message)
                | BookingError::NotFound(message)
                | BookingError::Conflict(message),
            ) => format!("Could not book the appointment: {message}"),
            Err(BookingError::Busy) => BookingError::Busy.to_string(),
            Err(err @ BookingError::Store(_)) => return Err(err),
        };

        self.append(conversation.id, MessageSender::System, &message)
            .await?;
        Ok(BookingAttempt::Rejected { message })
    }

    /// Replace a message's content and publish `message.edited`.
    pub async fn edit_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
        requester: Requester,
        content: &str,
    ) -> Result<ChatMessage, BookingError> {
        chat::validate_message_content(content)?;
        self.modifiable_message(conversation_id, message_id, requester)
            .await?;
        let message = self
            .conversations
            .edit_message(conversation_id, message_id, content)
            .await?
            .ok_or_else(|| message_not_found(conversation_id, message_id))?;

        self.rooms
            .publish(RoomEvent::MessageEdited {
                conversation_id,
                message: message.clone(),
            })
            .await;
        Ok(message)
    }

    /// Delete a message. Publishes `message.deleted`, then the remaining
    /// pinned set if the message had been pinned.
    pub async fn delete_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
        requester: Requester,
    ) -> Result<MessageDeletion, BookingError> {
        self.modifiable_message(conversation_id, message_id, requester)
            .await?;
        let change = self
            .conversations
            .delete_message(conversation_id, message_id)
            .await?
            .ok_or_else(|| message_not_found(conversation_id, message_id))?;

        tracing::debug!(conversation_id, message_id, "Message deleted");
        self.rooms
            .publish(RoomEvent::MessageDeleted {
                conversation_id,
                message_id,
            })
            .await;
        if change.changed {
            self.publish_pins(conversation_id, &change.pinned).await;
        }
        Ok(MessageDeletion {
            message_id,
            pinned_message_ids: change.pinned,
        })
    }

    /// The message, if `requester` may change it. Anything else reads as
    /// not found.
    async fn modifiable_message(
        &self,
        conversation_id: DbId,
        message_id: DbId,
        requester: Requester,
    ) -> Result<ChatMessage, BookingError> {
        let conversation = self.conversation(conversation_id).await?;
        match self.conversations.message(conversation_id, message_id).await? {
            Some(message) if chat::may_modify(requester, &conversation, &message) => Ok(message),
            _ => Err(message_not_found(conversation_id, message_id)),
        }
    }

    /// Pin a message of this conversation. Pinning twice is a no-op and
    /// publishes nothing. Returns the full pinned set.
    pub async fn pin(&self, conversation_id: DbId, message_id: DbId) -> Result<Vec<DbId>, BookingError> {
        self.conversation(conversation_id).await?;
        if !self
            .conversations
            .message_in_conversation(conversation_id, message_id)
            .await?
        {
            return Err(message_not_found(conversation_id, message_id));
        }
        let change = self.conversations.pin(conversation_id, message_id).await?;
        if change.changed {
            self.publish_pins(conversation_id, &change.pinned).await;
        }
        Ok(change.pinned)
    }

    /// Unpin a message. Unpinning an unpinned id is a no-op.
    pub async fn unpin(
        &self,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Vec<DbId>, BookingError> {
        self.conversation(conversation_id).await?;
        let change = self.conversations.unpin(conversation_id, message_id).await?;
        if change.changed {
            self.publish_pins(conversation_id, &change.pinned).await;
        }
        Ok(change.pinned)
    }

    async fn publish_pins(&self, conversation_id: DbId, pinned: &[DbId]) {
        tracing::debug!(conversation_id, pinned = pinned.len(), "Pinned set changed");
        self.rooms
            .publish(RoomEvent::PinnedChanged {
                conversation_id,
                pinned_message_ids: pinned.to_vec(),
            })
            .await;
    }

    async fn append(
        &self,
        conversation_id: DbId,
        sender: MessageSender,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let message = self
            .conversations
            .append_message(conversation_id, sender, content)
            .await?;
        self.rooms
            .publish(RoomEvent::MessageAppended {
                conversation_id,
                message: message.clone(),
            })
            .await;
        Ok(message)
    }
}

fn message_not_found(conversation_id: DbId, message_id: DbId) -> BookingError {
    BookingError::NotFound(format!(
        "Message {message_id} not found in conversation {conversation_id}"
    ))
}

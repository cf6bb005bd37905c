//! Conversation, message and pin models.

use aether_core::chat::{ChatMessage, Conversation};
use aether_core::error::CoreError;
use aether_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `conversations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConversationRow {
    pub id: DbId,
    pub customer_id: DbId,
    pub created_at: Timestamp,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            customer_id: row.customer_id,
            created_at: row.created_at,
        }
    }
}

/// A row from the `messages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageRow {
    pub id: DbId,
    pub conversation_id: DbId,
    pub sender: String,
    pub content: String,
    pub created_at: Timestamp,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = CoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(ChatMessage {
            id: row.id,
            conversation_id: row.conversation_id,
            sender: row.sender.parse()?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

//! Repository for the `conversations`, `messages` and `pinned_messages` tables.

use aether_core::types::DbId;
use sqlx::PgPool;

use crate::models::conversation::{ConversationRow, MessageRow};

/// Column list for messages queries.
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender, content, created_at";

/// Provides conversation transcript and pin operations.
pub struct ConversationRepo;

impl ConversationRepo {
    /// Find a conversation by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ConversationRow>, sqlx::Error> {
        sqlx::query_as::<_, ConversationRow>(
            "SELECT id, customer_id, created_at FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Return the customer's conversation, creating it on first use.
    pub async fn find_or_create_for_customer(
        pool: &PgPool,
        customer_id: DbId,
    ) -> Result<ConversationRow, sqlx::Error> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        sqlx::query_as::<_, ConversationRow>(
            "INSERT INTO conversations (customer_id) VALUES ($1)
             ON CONFLICT (customer_id) DO UPDATE SET customer_id = EXCLUDED.customer_id
             RETURNING id, customer_id, created_at",
        )
        .bind(customer_id)
        .fetch_one(pool)
        .await
    }

    /// Append a message to a conversation, returning the created row.
    pub async fn append_message(
        pool: &PgPool,
        conversation_id: DbId,
        sender: &str,
        content: &str,
    ) -> Result<MessageRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO messages (conversation_id, sender, content)
             VALUES ($1, $2, $3)
             RETURNING {MESSAGE_COLUMNS}"
        );
        sqlx::query_as::<_, MessageRow>(&query)
            .bind(conversation_id)
            .bind(sender)
            .bind(content)
            .fetch_one(pool)
            .await
    }

    /// The most recent `limit` messages, returned oldest first.
    pub async fn recent_messages(
        pool: &PgPool,
        conversation_id: DbId,
        limit: i64,
    ) -> Result<Vec<MessageRow>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                SELECT {MESSAGE_COLUMNS} FROM messages
                WHERE conversation_id = $1
                ORDER BY id DESC
                LIMIT $2
             ) recent
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, MessageRow>(&query)
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Full transcript, oldest first.
    pub async fn list_messages(
        pool: &PgPool,
        conversation_id: DbId,
    ) -> Result<Vec<MessageRow>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, MessageRow>(&query)
            .bind(conversation_id)
            .fetch_all(pool)
            .await
    }

    /// Whether `message_id` belongs to `conversation_id`.
    pub async fn message_exists(
        pool: &PgPool,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE conversation_id = $1 AND id = $2)",
        )
        .bind(conversation_id)
        .bind(message_id)
        .fetch_one(pool)
        .await
    }

    /// Fetch one message of a conversation.
    pub async fn find_message(
        pool: &PgPool,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Option<MessageRow>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 AND id = $2"
        );
        sqlx::query_as::<_, MessageRow>(&query)
            .bind(conversation_id)
            .bind(message_id)
            .fetch_optional(pool)
            .await
    }

    /// Replace a message's content. Returns `None` if the message is not in
    /// the conversation.
    pub async fn edit_message(
        pool: &PgPool,
        conversation_id: DbId,
        message_id: DbId,
        content: &str,
    ) -> Result<Option<MessageRow>, sqlx::Error> {
        let query = format!(
            "UPDATE messages SET content = $3
             WHERE conversation_id = $1 AND id = $2
             RETURNING {MESSAGE_COLUMNS}"
        );
        sqlx::query_as::<_, MessageRow>(&query)
            .bind(conversation_id)
            .bind(message_id)
            .bind(content)
            .fetch_optional(pool)
            .await
    }

    /// Delete a message; its pin goes with it through the cascade.
    ///
    /// Returns `None` if the message is not in the conversation, otherwise
    /// whether it was pinned.
    pub async fn delete_message(
        pool: &PgPool,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<Option<bool>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let was_pinned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                SELECT 1 FROM pinned_messages
                WHERE conversation_id = $1 AND message_id = $2
             )",
        )
        .bind(conversation_id)
        .bind(message_id)
        .fetch_one(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM messages WHERE conversation_id = $1 AND id = $2")
            .bind(conversation_id)
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(was_pinned))
    }

    /// Pin a message. Returns `true` if it was not already pinned.
    pub async fn pin(
        pool: &PgPool,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO pinned_messages (conversation_id, message_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(conversation_id)
        .bind(message_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unpin a message. Returns `true` if it was pinned.
    pub async fn unpin(
        pool: &PgPool,
        conversation_id: DbId,
        message_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM pinned_messages WHERE conversation_id = $1 AND message_id = $2",
        )
        .bind(conversation_id)
        .bind(message_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Current pinned message ids, ascending.
    pub async fn pinned_ids(pool: &PgPool, conversation_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT message_id FROM pinned_messages
             WHERE conversation_id = $1
             ORDER BY message_id ASC",
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await
    }
}

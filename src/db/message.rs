//! Message repository.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::{new_id, timestamp, DbPool};
use crate::{Result, TempmailError};

/// Message entity.
///
/// Messages are never updated after creation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    /// Message ID (UUID).
    pub id: String,
    /// Owning mailbox.
    pub mailbox_id: String,
    /// Sender address.
    pub from_address: String,
    /// Recipient address.
    pub to_address: String,
    /// Subject line.
    pub subject: Option<String>,
    /// Plain-text body.
    pub text_body: Option<String>,
    /// HTML body.
    pub html_body: Option<String>,
    /// Raw message bytes as received.
    pub raw_message: Vec<u8>,
    /// Reception timestamp.
    pub received_at: DateTime<Utc>,
}

/// Message row for listings, without bodies.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageSummary {
    pub id: String,
    pub mailbox_id: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    pub attachment_count: i64,
}

/// New message for creation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub mailbox_id: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub raw_message: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a message on the given connection and return its ID.
    ///
    /// Takes a connection rather than the pool so the insert can join an
    /// open transaction.
    pub async fn insert(conn: &mut SqliteConnection, message: &NewMessage) -> Result<String> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO messages
                (id, mailbox_id, from_address, to_address, subject, text_body, html_body,
                 raw_message, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&message.mailbox_id)
        .bind(&message.from_address)
        .bind(&message.to_address)
        .bind(&message.subject)
        .bind(&message.text_body)
        .bind(&message.html_body)
        .bind(&message.raw_message)
        .bind(timestamp(&message.received_at))
        .execute(conn)
        .await
        .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(id)
    }

    /// Get a message by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT id, mailbox_id, from_address, to_address, subject, text_body, html_body,
                    raw_message, received_at
             FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(message)
    }

    /// List messages in a mailbox, newest first.
    pub async fn list_by_mailbox(
        &self,
        mailbox_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<MessageSummary>> {
        let messages = sqlx::query_as::<_, MessageSummary>(
            "SELECT m.id, m.mailbox_id, m.from_address, m.to_address, m.subject, m.received_at,
                    (SELECT COUNT(*) FROM attachments a WHERE a.message_id = m.id) AS attachment_count
             FROM messages m
             WHERE m.mailbox_id = ?
             ORDER BY m.received_at DESC, m.id
             LIMIT ? OFFSET ?",
        )
        .bind(mailbox_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await
        .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(messages)
    }

    /// Count messages in a mailbox.
    pub async fn count_by_mailbox(&self, mailbox_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE mailbox_id = ?")
            .bind(mailbox_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(count)
    }

    /// List the IDs of every message in a mailbox.
    pub async fn list_ids_by_mailbox(&self, mailbox_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM messages WHERE mailbox_id = ?")
            .bind(mailbox_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(ids)
    }

    /// List IDs of messages whose mailbox no longer exists.
    pub async fn list_orphans(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT m.id FROM messages m
             WHERE NOT EXISTS (SELECT 1 FROM mailboxes b WHERE b.id = m.mailbox_id)",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(ids)
    }

    /// Delete a message record.
    ///
    /// Owned attachments must be removed beforehand.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

//! Attachment repository.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::{new_id, timestamp, DbPool};
use crate::{Result, TempmailError};

/// Attachment metadata.
///
/// The bytes live on disk at `storage_path`, under the attachment root.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Attachment {
    /// Attachment ID (UUID).
    pub id: String,
    /// Owning message.
    pub message_id: String,
    /// Sanitized filename.
    pub filename: String,
    /// Declared content type.
    pub content_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Path of the stored file.
    pub storage_path: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// New attachment for creation.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub message_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str =
    "SELECT a.id, a.message_id, a.filename, a.content_type, a.size, a.storage_path, a.created_at
     FROM attachments a";

/// Repository for attachment operations.
pub struct AttachmentRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> AttachmentRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert an attachment record on the given connection and return its ID.
    pub async fn insert(conn: &mut SqliteConnection, attachment: &NewAttachment) -> Result<String> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO attachments
                (id, message_id, filename, content_type, size, storage_path, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&attachment.message_id)
        .bind(&attachment.filename)
        .bind(&attachment.content_type)
        .bind(attachment.size)
        .bind(&attachment.storage_path)
        .bind(timestamp(&attachment.created_at))
        .execute(conn)
        .await
        .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(id)
    }

    /// Get an attachment by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Attachment>> {
        let sql = format!("{SELECT_COLUMNS} WHERE a.id = ?");
        let attachment = sqlx::query_as::<_, Attachment>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(attachment)
    }

    /// List attachments of a message.
    pub async fn list_by_message(&self, message_id: &str) -> Result<Vec<Attachment>> {
        let sql = format!("{SELECT_COLUMNS} WHERE a.message_id = ? ORDER BY a.created_at, a.id");
        let attachments = sqlx::query_as::<_, Attachment>(&sql)
            .bind(message_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(attachments)
    }

    /// List attachments of every message in a mailbox.
    pub async fn list_by_mailbox(&self, mailbox_id: &str) -> Result<Vec<Attachment>> {
        let sql = format!(
            "{SELECT_COLUMNS} JOIN messages m ON m.id = a.message_id
             WHERE m.mailbox_id = ? ORDER BY a.created_at, a.id"
        );
        let attachments = sqlx::query_as::<_, Attachment>(&sql)
            .bind(mailbox_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(attachments)
    }

    /// List attachments whose message no longer exists.
    pub async fn list_orphans(&self) -> Result<Vec<Attachment>> {
        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE NOT EXISTS (SELECT 1 FROM messages m WHERE m.id = a.message_id)"
        );
        let attachments = sqlx::query_as::<_, Attachment>(&sql)
            .fetch_all(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(attachments)
    }

    /// Delete an attachment record.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all attachment records.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attachments")
            .fetch_one(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(count)
    }
}

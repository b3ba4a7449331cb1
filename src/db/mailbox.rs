//! Mailbox repository.

use chrono::{DateTime, Utc};

use super::{new_id, timestamp, DbPool};
use crate::{Result, TempmailError};

/// Mailbox entity: a disposable address with a bounded lifetime.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Mailbox {
    /// Mailbox ID (UUID).
    pub id: String,
    /// Normalized address.
    pub address: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
    /// Last read or write access.
    pub last_activity: DateTime<Utc>,
}

impl Mailbox {
    /// A mailbox is valid strictly before its expiry.
    ///
    /// `expires_at` never changes, so once this returns false for some
    /// `now` it stays false for every later `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// New mailbox for creation.
#[derive(Debug, Clone)]
pub struct NewMailbox {
    /// Normalized address.
    pub address: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl NewMailbox {
    /// Create a new mailbox valid for `lifetime` starting at `now`.
    pub fn new(address: impl Into<String>, now: DateTime<Utc>, lifetime: chrono::Duration) -> Self {
        Self {
            address: address.into(),
            created_at: now,
            expires_at: now + lifetime,
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, address, created_at, expires_at, last_activity FROM mailboxes";

/// Repository for mailbox operations.
pub struct MailboxRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> MailboxRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new mailbox.
    pub async fn create(&self, new_mailbox: &NewMailbox) -> Result<Mailbox> {
        if new_mailbox.expires_at <= new_mailbox.created_at {
            return Err(TempmailError::Validation(
                "mailbox expiry must be after its creation".to_string(),
            ));
        }

        let created_at = timestamp(&new_mailbox.created_at);
        let mailbox = sqlx::query_as::<_, Mailbox>(
            "INSERT INTO mailboxes (id, address, created_at, expires_at, last_activity)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, address, created_at, expires_at, last_activity",
        )
        .bind(new_id())
        .bind(&new_mailbox.address)
        .bind(&created_at)
        .bind(timestamp(&new_mailbox.expires_at))
        .bind(&created_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(mailbox)
    }

    /// Get a mailbox by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Mailbox>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let mailbox = sqlx::query_as::<_, Mailbox>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(mailbox)
    }

    /// Get a mailbox by its normalized address.
    pub async fn get_by_address(&self, address: &str) -> Result<Option<Mailbox>> {
        let sql = format!("{SELECT_COLUMNS} WHERE address = ?");
        let mailbox = sqlx::query_as::<_, Mailbox>(&sql)
            .bind(address)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(mailbox)
    }

    /// Update the last-activity timestamp.
    ///
    /// Returns false if the mailbox no longer exists.
    pub async fn touch(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE mailboxes SET last_activity = ? WHERE id = ?")
            .bind(timestamp(&now))
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// List mailboxes whose expiry is at or before `now`.
    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Mailbox>> {
        let sql = format!("{SELECT_COLUMNS} WHERE expires_at <= ? ORDER BY expires_at");
        let mailboxes = sqlx::query_as::<_, Mailbox>(&sql)
            .bind(timestamp(&now))
            .fetch_all(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(mailboxes)
    }

    /// Delete a mailbox record.
    ///
    /// Owned messages and attachments must be removed beforehand.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mailboxes WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all mailboxes.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mailboxes")
            .fetch_one(self.pool)
            .await
            .map_err(|e| TempmailError::Database(e.to_string()))?;

        Ok(count)
    }
}

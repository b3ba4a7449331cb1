//! Mailbox creation and cascading deletion.
//!
//! Deletion always runs in the same order: each attachment's file, then its
//! record, then the messages, then the mailbox. Storage-level cascades are
//! not relied upon.

use std::ops::AddAssign;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::resolver::normalize_address;
use crate::attachment::AttachmentStore;
use crate::db::{
    Attachment, AttachmentRepository, Database, Mailbox, MailboxRepository, MessageRepository,
    NewMailbox,
};
use crate::{Result, TempmailError};

/// Counts of what a purge removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub mailboxes: u64,
    pub messages: u64,
    pub attachments: u64,
    /// Attachment files actually found and removed from disk.
    pub files: u64,
}

impl PurgeStats {
    /// True if nothing was removed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for PurgeStats {
    fn add_assign(&mut self, other: Self) {
        self.mailboxes += other.mailboxes;
        self.messages += other.messages;
        self.attachments += other.attachments;
        self.files += other.files;
    }
}

/// Outcome of [`MailboxLifecycle::create_or_reuse`].
#[derive(Debug, Clone)]
pub struct CreatedMailbox {
    pub mailbox: Mailbox,
    /// False when an existing valid mailbox was returned.
    pub created: bool,
}

/// Mailbox lifecycle operations.
pub struct MailboxLifecycle<'a> {
    db: &'a Database,
    store: &'a AttachmentStore,
}

impl<'a> MailboxLifecycle<'a> {
    /// Create a new lifecycle service.
    pub fn new(db: &'a Database, store: &'a AttachmentStore) -> Self {
        Self { db, store }
    }

    /// Create a mailbox for `address`, or return the existing valid one.
    ///
    /// An existing but expired mailbox is purged first and replaced by a
    /// fresh one.
    pub async fn create_or_reuse(
        &self,
        address: &str,
        lifetime: Duration,
        now: DateTime<Utc>,
    ) -> Result<CreatedMailbox> {
        let address = normalize_address(address);
        let repo = MailboxRepository::new(self.db.pool());

        if let Some(existing) = repo.get_by_address(&address).await? {
            if existing.is_valid(now) {
                repo.touch(&existing.id, now).await?;
                return Ok(CreatedMailbox {
                    mailbox: Mailbox {
                        last_activity: now,
                        ..existing
                    },
                    created: false,
                });
            }

            info!(mailbox_id = %existing.id, "Replacing expired mailbox");
            self.purge_mailbox(&existing).await?;
        }

        match repo.create(&NewMailbox::new(&address, now, lifetime)).await {
            Ok(mailbox) => {
                info!(mailbox_id = %mailbox.id, address = %mailbox.address, "Mailbox created");
                Ok(CreatedMailbox {
                    mailbox,
                    created: true,
                })
            }
            // Lost a race against a concurrent create for the same address.
            Err(TempmailError::Database(e)) => match repo.get_by_address(&address).await? {
                Some(existing) if existing.is_valid(now) => Ok(CreatedMailbox {
                    mailbox: existing,
                    created: false,
                }),
                _ => Err(TempmailError::Database(e)),
            },
            Err(e) => Err(e),
        }
    }

    /// Delete a mailbox and everything it owns.
    pub async fn purge_mailbox(&self, mailbox: &Mailbox) -> Result<PurgeStats> {
        let mut stats = PurgeStats::default();

        let attachments = AttachmentRepository::new(self.db.pool())
            .list_by_mailbox(&mailbox.id)
            .await?;
        for attachment in &attachments {
            stats += self.purge_attachment(attachment).await?;
        }

        let messages = MessageRepository::new(self.db.pool());
        for message_id in messages.list_ids_by_mailbox(&mailbox.id).await? {
            // Attachments that arrived after the listing above.
            stats += self.purge_message_attachments(&message_id).await?;
            if messages.delete(&message_id).await? {
                stats.messages += 1;
            }
        }

        if MailboxRepository::new(self.db.pool())
            .delete(&mailbox.id)
            .await?
        {
            stats.mailboxes += 1;
        }

        debug!(mailbox_id = %mailbox.id, ?stats, "Mailbox purged");
        Ok(stats)
    }

    /// Delete a message and its attachments.
    pub async fn purge_message(&self, message_id: &str) -> Result<PurgeStats> {
        let mut stats = self.purge_message_attachments(message_id).await?;

        if MessageRepository::new(self.db.pool())
            .delete(message_id)
            .await?
        {
            stats.messages += 1;
        }

        Ok(stats)
    }

    async fn purge_message_attachments(&self, message_id: &str) -> Result<PurgeStats> {
        let mut stats = PurgeStats::default();
        let attachments = AttachmentRepository::new(self.db.pool())
            .list_by_message(message_id)
            .await?;
        for attachment in &attachments {
            stats += self.purge_attachment(attachment).await?;
        }
        Ok(stats)
    }

    /// Remove an attachment's file, then its record.
    ///
    /// A file that is already gone is not an error. A path outside the
    /// attachment root is never touched, but the record is still deleted.
    pub async fn purge_attachment(&self, attachment: &Attachment) -> Result<PurgeStats> {
        let mut stats = PurgeStats::default();

        match self.store.remove(&attachment.storage_path) {
            Ok(true) => stats.files += 1,
            Ok(false) => {}
            Err(TempmailError::StorageIntegrity(e)) => {
                warn!(
                    attachment_id = %attachment.id,
                    storage_path = %attachment.storage_path,
                    error = %e,
                    "Attachment path outside storage root, deleting record only"
                );
            }
            Err(e) => return Err(e),
        }
        if AttachmentRepository::new(self.db.pool())
            .delete(&attachment.id)
            .await?
        {
            stats.attachments += 1;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewAttachment, NewMessage};
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        db: Database,
        store: AttachmentStore,
    }

    async fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = AttachmentStore::new(dir.path().join("att"), 1024).unwrap();
        let db = Database::open_in_memory().await.unwrap();
        Fixture {
            _dir: dir,
            db,
            store,
        }
    }

    async fn add_message(fx: &Fixture, mailbox_id: &str, files: &[&str]) -> String {
        let mut conn = fx.db.pool().acquire().await.unwrap();
        let message_id = MessageRepository::insert(
            &mut conn,
            &NewMessage {
                mailbox_id: mailbox_id.to_string(),
                from_address: "a@example.org".to_string(),
                to_address: "b@example.com".to_string(),
                subject: None,
                text_body: None,
                html_body: None,
                raw_message: b"raw".to_vec(),
                received_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        for name in files {
            let path = fx.store.write(name, b"data").unwrap();
            AttachmentRepository::insert(
                &mut conn,
                &NewAttachment {
                    message_id: message_id.clone(),
                    filename: name.to_string(),
                    content_type: "text/plain".to_string(),
                    size: 4,
                    storage_path: path.to_string_lossy().into_owned(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }
        message_id
    }

    #[tokio::test]
    async fn test_create_new_mailbox() {
        let fx = setup().await;
        let lifecycle = MailboxLifecycle::new(&fx.db, &fx.store);

        let result = lifecycle
            .create_or_reuse(" New@Example.com ", Duration::hours(24), Utc::now())
            .await
            .unwrap();
        assert!(result.created);
        assert_eq!(result.mailbox.address, "new@example.com");
    }

    #[tokio::test]
    async fn test_reuse_valid_mailbox() {
        let fx = setup().await;
        let lifecycle = MailboxLifecycle::new(&fx.db, &fx.store);
        let now = Utc::now();

        let first = lifecycle
            .create_or_reuse("a@example.com", Duration::hours(24), now)
            .await
            .unwrap();
        let second = lifecycle
            .create_or_reuse("A@example.com", Duration::hours(24), now + Duration::hours(1))
            .await
            .unwrap();

        assert!(!second.created);
        assert_eq!(second.mailbox.id, first.mailbox.id);
        assert_eq!(second.mailbox.expires_at, first.mailbox.expires_at);
    }

    #[tokio::test]
    async fn test_replace_expired_mailbox() {
        let fx = setup().await;
        let lifecycle = MailboxLifecycle::new(&fx.db, &fx.store);
        let now = Utc::now();

        let old = lifecycle
            .create_or_reuse("a@example.com", Duration::hours(1), now - Duration::hours(2))
            .await
            .unwrap();
        add_message(&fx, &old.mailbox.id, &["x.txt"]).await;

        let fresh = lifecycle
            .create_or_reuse("a@example.com", Duration::hours(1), now)
            .await
            .unwrap();

        assert!(fresh.created);
        assert_ne!(fresh.mailbox.id, old.mailbox.id);
        assert!(fresh.mailbox.is_valid(now));
        assert_eq!(
            AttachmentRepository::new(fx.db.pool()).count().await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_purge_mailbox_removes_everything() {
        let fx = setup().await;
        let lifecycle = MailboxLifecycle::new(&fx.db, &fx.store);
        let mailbox = lifecycle
            .create_or_reuse("a@example.com", Duration::hours(1), Utc::now())
            .await
            .unwrap()
            .mailbox;
        add_message(&fx, &mailbox.id, &["one.txt", "two.txt"]).await;
        add_message(&fx, &mailbox.id, &[]).await;

        let paths: Vec<String> = AttachmentRepository::new(fx.db.pool())
            .list_by_mailbox(&mailbox.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.storage_path)
            .collect();

        let stats = lifecycle.purge_mailbox(&mailbox).await.unwrap();
        assert_eq!(
            stats,
            PurgeStats {
                mailboxes: 1,
                messages: 2,
                attachments: 2,
                files: 2,
            }
        );
        for path in paths {
            assert!(!Path::new(&path).exists());
        }
        assert_eq!(
            MailboxRepository::new(fx.db.pool()).count().await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_purge_message() {
        let fx = setup().await;
        let lifecycle = MailboxLifecycle::new(&fx.db, &fx.store);
        let mailbox = lifecycle
            .create_or_reuse("a@example.com", Duration::hours(1), Utc::now())
            .await
            .unwrap()
            .mailbox;
        let keep = add_message(&fx, &mailbox.id, &["keep.txt"]).await;
        let removed = add_message(&fx, &mailbox.id, &["drop.txt"]).await;

        let stats = lifecycle.purge_message(&removed).await.unwrap();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.attachments, 1);

        let messages = MessageRepository::new(fx.db.pool());
        assert!(messages.get_by_id(&removed).await.unwrap().is_none());
        assert!(messages.get_by_id(&keep).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_attachment_outside_root_keeps_file() {
        let fx = setup().await;
        let lifecycle = MailboxLifecycle::new(&fx.db, &fx.store);
        let mailbox = lifecycle
            .create_or_reuse("a@example.com", Duration::hours(1), Utc::now())
            .await
            .unwrap()
            .mailbox;
        let message_id = add_message(&fx, &mailbox.id, &[]).await;

        let mut conn = fx.db.pool().acquire().await.unwrap();
        AttachmentRepository::insert(
            &mut conn,
            &NewAttachment {
                message_id,
                filename: "passwd".to_string(),
                content_type: "text/plain".to_string(),
                size: 1,
                storage_path: "/etc/passwd".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        let stats = lifecycle.purge_mailbox(&mailbox).await.unwrap();
        assert_eq!(stats.mailboxes, 1);
        assert_eq!(stats.attachments, 1);
        assert_eq!(stats.files, 0);
        assert!(Path::new("/etc/passwd").exists());
        assert!(MailboxRepository::new(fx.db.pool())
            .get_by_id(&mailbox.id)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_purge_stats_add() {
        let mut total = PurgeStats::default();
        assert!(total.is_empty());

        total += PurgeStats {
            mailboxes: 1,
            messages: 2,
            attachments: 3,
            files: 3,
        };
        total += PurgeStats {
            mailboxes: 1,
            ..PurgeStats::default()
        };
        assert_eq!(total.mailboxes, 2);
        assert_eq!(total.messages, 2);
        assert!(!total.is_empty());
    }
}

//! Mailbox lookup and validity.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::db::{Database, Mailbox, MailboxRepository};
use crate::{Result, TempmailError};

/// Normalize an address for lookup and storage.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Resolver for mailboxes by address or identity.
pub struct InboxResolver<'a> {
    db: &'a Database,
}

impl<'a> InboxResolver<'a> {
    /// Create a new resolver.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Look up a mailbox by address.
    ///
    /// The address is normalized first. Validity is not checked.
    pub async fn resolve(&self, address: &str) -> Result<Mailbox> {
        let address = normalize_address(address);
        MailboxRepository::new(self.db.pool())
            .get_by_address(&address)
            .await?
            .ok_or_else(|| TempmailError::NotFound("mailbox".to_string()))
    }

    /// Look up a mailbox by identity. Validity is not checked.
    pub async fn get(&self, id: &str) -> Result<Mailbox> {
        MailboxRepository::new(self.db.pool())
            .get_by_id(id)
            .await?
            .ok_or_else(|| TempmailError::NotFound("mailbox".to_string()))
    }

    /// Look up a mailbox for access: it must exist and still be valid.
    ///
    /// Touches the mailbox on success.
    pub async fn open(&self, id: &str, now: DateTime<Utc>) -> Result<Mailbox> {
        let mut mailbox = self.get(id).await?;
        if !Self::is_valid(&mailbox, now) {
            return Err(TempmailError::Expired(mailbox.id));
        }

        self.touch(&mut mailbox, now).await?;
        Ok(mailbox)
    }

    /// Strict validity check: `now` must be before the expiry.
    pub fn is_valid(mailbox: &Mailbox, now: DateTime<Utc>) -> bool {
        mailbox.is_valid(now)
    }

    /// Record an access to the mailbox.
    pub async fn touch(&self, mailbox: &mut Mailbox, now: DateTime<Utc>) -> Result<()> {
        let found = MailboxRepository::new(self.db.pool())
            .touch(&mailbox.id, now)
            .await?;
        if !found {
            debug!(mailbox_id = %mailbox.id, "Touched mailbox no longer exists");
        }

        mailbox.last_activity = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewMailbox;
    use chrono::{Duration, SubsecRound};

    async fn setup() -> (Database, Mailbox) {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc::now().trunc_subsecs(6);
        let mailbox = MailboxRepository::new(db.pool())
            .create(&NewMailbox::new("box@example.com", now, Duration::hours(1)))
            .await
            .unwrap();
        (db, mailbox)
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("  Box@Example.COM \n"), "box@example.com");
        assert_eq!(normalize_address("plain@example.com"), "plain@example.com");
    }

    #[tokio::test]
    async fn test_resolve_normalizes() {
        let (db, mailbox) = setup().await;
        let resolver = InboxResolver::new(&db);

        let found = resolver.resolve(" BOX@example.com ").await.unwrap();
        assert_eq!(found.id, mailbox.id);
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let (db, _) = setup().await;
        let resolver = InboxResolver::new(&db);

        let result = resolver.resolve("nobody@example.com").await;
        assert!(matches!(result, Err(TempmailError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_is_valid_strict() {
        let (_db, mailbox) = setup().await;

        assert!(InboxResolver::is_valid(&mailbox, mailbox.created_at));
        assert!(!InboxResolver::is_valid(&mailbox, mailbox.expires_at));
        assert!(!InboxResolver::is_valid(
            &mailbox,
            mailbox.expires_at + Duration::seconds(1)
        ));
    }

    #[tokio::test]
    async fn test_open_touches_valid_mailbox() {
        let (db, mailbox) = setup().await;
        let resolver = InboxResolver::new(&db);
        let later = mailbox.created_at + Duration::minutes(10);

        let opened = resolver.open(&mailbox.id, later).await.unwrap();
        assert_eq!(opened.last_activity, later);

        let stored = resolver.get(&mailbox.id).await.unwrap();
        assert_eq!(stored.last_activity, later);
        assert_eq!(stored.expires_at, mailbox.expires_at);
    }

    #[tokio::test]
    async fn test_open_expired_mailbox() {
        let (db, mailbox) = setup().await;
        let resolver = InboxResolver::new(&db);
        let after = mailbox.expires_at + Duration::minutes(1);

        let result = resolver.open(&mailbox.id, after).await;
        assert!(matches!(result, Err(TempmailError::Expired(_))));

        let stored = resolver.get(&mailbox.id).await.unwrap();
        assert_eq!(stored.last_activity, mailbox.last_activity);
    }

    #[tokio::test]
    async fn test_open_unknown_mailbox() {
        let (db, _) = setup().await;
        let result = InboxResolver::new(&db).open("missing", Utc::now()).await;
        assert!(matches!(result, Err(TempmailError::NotFound(_))));
    }
}

//! The ingestion transaction.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Acquire, Sqlite, Transaction};
use tracing::{debug, info, warn};

use super::outcome::{AttachmentOutcome, IngestOutcome, IngestStage, SkipReason};
use crate::attachment::{sanitize_filename, AttachmentStore};
use crate::db::{
    AttachmentRepository, Database, Mailbox, MailboxRepository, MessageRepository, NewAttachment,
    NewMessage,
};
use crate::inbox::{normalize_address, InboxResolver};
use crate::mime::{Envelope, ExtractedAttachment, MimeDecoder};
use crate::notify::{Broadcaster, InboxEvent};
use crate::TempmailError;

/// Ingests raw inbound messages into their mailboxes.
#[derive(Clone)]
pub struct IngestService {
    db: Database,
    store: AttachmentStore,
    broadcaster: Arc<Broadcaster>,
    decoder: MimeDecoder,
}

impl IngestService {
    /// Create a new service accepting messages up to `max_email_bytes`.
    pub fn new(
        db: Database,
        store: AttachmentStore,
        broadcaster: Arc<Broadcaster>,
        max_email_bytes: usize,
    ) -> Self {
        Self {
            db,
            store,
            broadcaster,
            decoder: MimeDecoder::new(max_email_bytes),
        }
    }

    /// Maximum accepted raw message size in bytes.
    pub fn max_email_bytes(&self) -> usize {
        self.decoder.max_size()
    }

    /// Ingest one raw message.
    ///
    /// Never fails: every terminal state, including unexpected errors, is
    /// reported as an [`IngestOutcome`] and logged here.
    pub async fn ingest(&self, raw: &[u8], now: DateTime<Utc>) -> IngestOutcome {
        let outcome = self.run(raw, now).await;
        log_outcome(&outcome);
        outcome
    }

    async fn run(&self, raw: &[u8], now: DateTime<Utc>) -> IngestOutcome {
        if raw.is_empty() {
            return IngestOutcome::Empty;
        }
        let limit = self.decoder.max_size();
        if raw.len() > limit {
            return IngestOutcome::Oversized {
                size: raw.len(),
                limit,
            };
        }

        let envelope = match self.decoder.decode(raw) {
            Ok(envelope) => envelope,
            Err(_) => {
                return IngestOutcome::Oversized {
                    size: raw.len(),
                    limit,
                }
            }
        };

        let Some(address) = envelope
            .to
            .as_deref()
            .map(normalize_address)
            .filter(|a| !a.is_empty())
        else {
            return IngestOutcome::Rejected {
                reason: "no recipient address".to_string(),
            };
        };

        let mailbox = match InboxResolver::new(&self.db).resolve(&address).await {
            Ok(mailbox) => mailbox,
            Err(TempmailError::NotFound(_)) => return IngestOutcome::MailboxNotFound { address },
            Err(e) => {
                return IngestOutcome::Failed {
                    stage: IngestStage::Resolve,
                    error: e.to_string(),
                }
            }
        };

        if !InboxResolver::is_valid(&mailbox, now) {
            return IngestOutcome::MailboxExpired {
                mailbox_id: mailbox.id,
            };
        }

        let (message_id, attachments) = match self.commit(&mailbox, envelope, raw, now).await {
            Ok(committed) => committed,
            Err((stage, e)) => {
                return IngestOutcome::Failed {
                    stage,
                    error: e.to_string(),
                }
            }
        };

        if let Err(e) = MailboxRepository::new(self.db.pool())
            .touch(&mailbox.id, now)
            .await
        {
            warn!(mailbox_id = %mailbox.id, error = %e, "Failed to update mailbox activity");
        }

        let notified = self
            .broadcaster
            .broadcast(&InboxEvent::new_message(&mailbox.id, &message_id))
            .await;

        IngestOutcome::Committed {
            mailbox_id: mailbox.id,
            message_id,
            attachments,
            notified,
        }
    }

    /// Persist the message and its attachments in one transaction.
    ///
    /// Attachment failures are recorded per item and never abort the
    /// message. If the transaction does not commit, every file written for
    /// the message is removed.
    async fn commit(
        &self,
        mailbox: &Mailbox,
        envelope: Envelope,
        raw: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(String, Vec<AttachmentOutcome>), (IngestStage, TempmailError)> {
        let persist = |e: TempmailError| (IngestStage::PersistMessage, e);

        let mut tx = self.db.pool().begin().await.map_err(|e| persist(e.into()))?;

        let new_message = NewMessage {
            mailbox_id: mailbox.id.clone(),
            from_address: envelope.from,
            to_address: envelope.to.unwrap_or_default(),
            subject: envelope.subject,
            text_body: envelope.text_body,
            html_body: envelope.html_body,
            raw_message: raw.to_vec(),
            received_at: now,
        };
        let message_id = MessageRepository::insert(&mut tx, &new_message)
            .await
            .map_err(persist)?;

        let mut written = Vec::new();
        let mut outcomes = Vec::with_capacity(envelope.attachments.len());
        for attachment in &envelope.attachments {
            let outcome = self
                .persist_attachment(&mut tx, &message_id, attachment, now, &mut written)
                .await;
            outcomes.push(outcome);
        }

        if let Err(e) = tx.commit().await {
            self.remove_files(&written);
            return Err((IngestStage::Commit, e.into()));
        }

        Ok((message_id, outcomes))
    }

    /// Sanitize, size-check, write and record one attachment.
    async fn persist_attachment(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        message_id: &str,
        attachment: &ExtractedAttachment,
        now: DateTime<Utc>,
        written: &mut Vec<PathBuf>,
    ) -> AttachmentOutcome {
        let filename = sanitize_filename(&attachment.filename);
        let size = attachment.size();

        if !self.store.validate_size(size) {
            return AttachmentOutcome::Skipped {
                filename,
                reason: SkipReason::TooLarge {
                    size,
                    limit: self.store.max_size(),
                },
            };
        }

        let path = match self.store.write(&filename, &attachment.content) {
            Ok(path) => path,
            Err(e) => {
                return AttachmentOutcome::Skipped {
                    filename,
                    reason: SkipReason::Storage(e.to_string()),
                }
            }
        };

        let Some(storage_path) = path.to_str().map(str::to_string) else {
            self.remove_files(&[path]);
            return AttachmentOutcome::Skipped {
                filename,
                reason: SkipReason::Storage("storage path is not valid UTF-8".to_string()),
            };
        };

        let record = NewAttachment {
            message_id: message_id.to_string(),
            filename: filename.clone(),
            content_type: attachment.content_type.clone(),
            size: size as i64,
            storage_path,
            created_at: now,
        };

        // A savepoint keeps a failed insert from touching the rest of the
        // transaction.
        let result = async {
            let mut savepoint = Acquire::begin(&mut *tx).await?;
            let id = AttachmentRepository::insert(&mut savepoint, &record).await?;
            savepoint.commit().await?;
            Ok::<_, TempmailError>(id)
        }
        .await;

        match result {
            Ok(attachment_id) => {
                written.push(path);
                AttachmentOutcome::Stored {
                    attachment_id,
                    filename,
                    size,
                }
            }
            Err(e) => {
                self.remove_files(&[path]);
                AttachmentOutcome::Skipped {
                    filename,
                    reason: SkipReason::Record(e.to_string()),
                }
            }
        }
    }

    fn remove_files(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove attachment file");
            }
        }
    }
}

fn log_outcome(outcome: &IngestOutcome) {
    match outcome {
        IngestOutcome::Committed {
            mailbox_id,
            message_id,
            attachments,
            notified,
        } => {
            for attachment in attachments {
                if let AttachmentOutcome::Skipped { filename, reason } = attachment {
                    warn!(message_id = %message_id, filename = %filename, reason = %reason, "Attachment skipped");
                }
            }
            info!(
                mailbox_id = %mailbox_id,
                message_id = %message_id,
                stored = attachments.iter().filter(|a| a.is_stored()).count(),
                notified,
                "Message committed"
            );
        }
        IngestOutcome::Empty => debug!("Empty submission"),
        IngestOutcome::Oversized { size, limit } => {
            warn!(size, limit, "Message exceeds size limit");
        }
        IngestOutcome::Rejected { reason } => warn!(reason = %reason, "Message rejected"),
        IngestOutcome::MailboxNotFound { address } => {
            info!(address = %address, "No mailbox for recipient, accepted silently");
        }
        IngestOutcome::MailboxExpired { mailbox_id } => {
            info!(mailbox_id = %mailbox_id, "Mailbox expired, accepted silently");
        }
        IngestOutcome::Failed { stage, error } => {
            tracing::error!(stage = %stage, error = %error, "Ingestion failed");
        }
    }
}

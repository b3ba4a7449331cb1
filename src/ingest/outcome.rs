//! Typed results of an ingestion attempt.

use std::fmt;

/// Stage of the ingestion pipeline at which a message-level failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    /// Looking up the recipient mailbox.
    Resolve,
    /// Opening the transaction or inserting the message record.
    PersistMessage,
    /// Committing the transaction.
    Commit,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Resolve => "resolve",
            IngestStage::PersistMessage => "persist_message",
            IngestStage::Commit => "commit",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an attachment was not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Larger than the per-attachment ceiling.
    TooLarge { size: u64, limit: u64 },
    /// Path resolution or file write failed.
    Storage(String),
    /// The attachment record could not be inserted.
    Record(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooLarge { size, limit } => {
                write!(f, "{size} bytes exceeds the {limit} byte limit")
            }
            SkipReason::Storage(e) => write!(f, "storage failed: {e}"),
            SkipReason::Record(e) => write!(f, "record failed: {e}"),
        }
    }
}

/// Result for one extracted attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    Stored {
        attachment_id: String,
        /// Sanitized filename.
        filename: String,
        size: u64,
    },
    Skipped {
        /// Sanitized filename.
        filename: String,
        reason: SkipReason,
    },
}

impl AttachmentOutcome {
    pub fn filename(&self) -> &str {
        match self {
            AttachmentOutcome::Stored { filename, .. } | AttachmentOutcome::Skipped { filename, .. } => {
                filename
            }
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, AttachmentOutcome::Stored { .. })
    }
}

/// Terminal state of one ingestion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Message and the listed attachments were committed.
    Committed {
        mailbox_id: String,
        message_id: String,
        attachments: Vec<AttachmentOutcome>,
        /// Number of live subscribers notified.
        notified: usize,
    },
    /// No content was received.
    Empty,
    /// Raw message larger than the configured ceiling.
    Oversized { size: usize, limit: usize },
    /// No usable recipient address.
    Rejected { reason: String },
    /// No mailbox exists for the recipient.
    MailboxNotFound { address: String },
    /// The mailbox exists but has expired.
    MailboxExpired { mailbox_id: String },
    /// Unexpected failure; nothing was committed.
    Failed { stage: IngestStage, error: String },
}

/// Acknowledgment returned to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgment {
    Accepted,
    BadRequest,
    PayloadTooLarge,
}

impl IngestOutcome {
    /// Map the outcome to what the submitter is told.
    ///
    /// Everything except missing or oversized content is acknowledged as
    /// accepted, so that the upstream transfer agent does not retry
    /// conditions that will never resolve.
    pub fn acknowledgment(&self) -> Acknowledgment {
        match self {
            IngestOutcome::Empty => Acknowledgment::BadRequest,
            IngestOutcome::Oversized { .. } => Acknowledgment::PayloadTooLarge,
            IngestOutcome::Committed { .. }
            | IngestOutcome::Rejected { .. }
            | IngestOutcome::MailboxNotFound { .. }
            | IngestOutcome::MailboxExpired { .. }
            | IngestOutcome::Failed { .. } => Acknowledgment::Accepted,
        }
    }

    /// ID of the committed message, if any.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            IngestOutcome::Committed { message_id, .. } => Some(message_id),
            _ => None,
        }
    }
}

//! tempmail - disposable email backend.
//!
//! Inbound mail is decoded, stored against short-lived mailboxes and pushed
//! to live viewers; expired mailboxes are reclaimed by a periodic sweep.

pub mod attachment;
pub mod config;
pub mod db;
pub mod error;
pub mod inbox;
pub mod ingest;
pub mod logging;
pub mod mime;
pub mod notify;
pub mod relay;
pub mod sweeper;
pub mod web;

pub use attachment::{sanitize_filename, AttachmentStore};
pub use config::Config;
pub use db::{Database, Mailbox, MailboxRepository};
pub use error::{Result, TempmailError};
pub use inbox::{InboxResolver, MailboxLifecycle};
pub use ingest::{Acknowledgment, IngestOutcome, IngestService};
pub use mime::{Envelope, MimeDecoder};
pub use notify::{Broadcaster, InboxEvent};
pub use sweeper::{ExpirySweeper, SweepReport};

//! Mailbox resolution and lifecycle.

mod lifecycle;
mod resolver;

pub use lifecycle::{CreatedMailbox, MailboxLifecycle, PurgeStats};
pub use resolver::{normalize_address, InboxResolver};

//! Events pushed to mailbox subscribers.

use serde::Serialize;

/// Event delivered to live viewers of a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboxEvent {
    /// A message was committed to the mailbox.
    NewMessage {
        mailbox_id: String,
        message_id: String,
    },
}

impl InboxEvent {
    /// Create a new-message event.
    pub fn new_message(mailbox_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        InboxEvent::NewMessage {
            mailbox_id: mailbox_id.into(),
            message_id: message_id.into(),
        }
    }

    /// Mailbox the event belongs to.
    pub fn mailbox_id(&self) -> &str {
        match self {
            InboxEvent::NewMessage { mailbox_id, .. } => mailbox_id,
        }
    }
}

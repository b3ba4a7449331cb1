//! Live notification of mailbox events.

mod broadcaster;
mod event;

pub use broadcaster::{Broadcaster, SubscriberId, CHANNEL_CAPACITY};
pub use event::InboxEvent;

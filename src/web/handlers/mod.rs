//! API handlers.

pub mod attachments;
pub mod inbound;
pub mod inboxes;
pub mod messages;
mod state;

pub use attachments::*;
pub use inbound::*;
pub use inboxes::*;
pub use messages::*;
pub use state::AppState;

//! Web API: mailbox lifecycle, message reads, attachment downloads, the
//! inbound mail endpoint and the notification WebSocket.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;

//! WebSocket endpoints.

pub mod inbox;

pub use inbox::inbox_ws_handler;

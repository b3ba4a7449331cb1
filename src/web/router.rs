//! Router configuration for Web API.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_inbox, delete_inbox, delete_message, download_attachment, get_inbox, get_message,
    list_messages, receive_mail, AppState,
};
use super::middleware::create_cors_layer;
use super::ws::inbox_ws_handler;

/// Room left in the inbound body limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    // The relay sends the message plus its extracted attachments, so the
    // body may be up to twice the message size.
    let inbound_limit = app_state
        .max_email_bytes()
        .saturating_mul(2)
        .saturating_add(MULTIPART_OVERHEAD);

    let inbound_routes = Router::new()
        .route("/mail", post(receive_mail))
        .layer(DefaultBodyLimit::max(inbound_limit));

    let inbox_routes = Router::new()
        .route("/", post(create_inbox))
        .route("/:id", get(get_inbox).delete(delete_inbox));

    let message_routes = Router::new()
        .route("/inbox/:mailbox_id", get(list_messages))
        .route("/:id", get(get_message).delete(delete_message));

    let attachment_routes = Router::new().route("/:id", get(download_attachment));

    let api_routes = Router::new()
        .nest("/inbound", inbound_routes)
        .nest("/inboxes", inbox_routes)
        .nest("/messages", message_routes)
        .nest("/attachments", attachment_routes);

    let ws_routes = Router::new().route("/messages/:mailbox_id", get(inbox_ws_handler));

    Router::new()
        .nest("/api", api_routes)
        .nest("/ws", ws_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

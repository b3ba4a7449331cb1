//! Mailbox handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::inbox::{InboxResolver, MailboxLifecycle};
use crate::web::dto::{ApiResponse, CreateInboxRequest, InboxResponse, ValidatedJson};
use crate::web::error::ApiError;

use super::AppState;

/// POST /api/inboxes - Create a mailbox.
///
/// Returns the existing mailbox with 200 while it is still valid. An expired
/// mailbox is deleted with everything it owns and replaced (201).
pub async fn create_inbox(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateInboxRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InboxResponse>>), ApiError> {
    let result = MailboxLifecycle::new(&state.db, &state.store)
        .create_or_reuse(&req.email, state.mailbox_lifetime, Utc::now())
        .await?;

    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ApiResponse::new(result.mailbox.into()))))
}

/// GET /api/inboxes/:id - Get mailbox details.
pub async fn get_inbox(
    State(state): State<Arc<AppState>>,
    Path(mailbox_id): Path<String>,
) -> Result<Json<ApiResponse<InboxResponse>>, ApiError> {
    let mailbox = InboxResolver::new(&state.db)
        .open(&mailbox_id, Utc::now())
        .await?;
    Ok(Json(ApiResponse::new(mailbox.into())))
}

/// DELETE /api/inboxes/:id - Delete a mailbox and everything it owns.
pub async fn delete_inbox(
    State(state): State<Arc<AppState>>,
    Path(mailbox_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mailbox = InboxResolver::new(&state.db).get(&mailbox_id).await?;
    let stats = MailboxLifecycle::new(&state.db, &state.store)
        .purge_mailbox(&mailbox)
        .await?;

    tracing::info!(
        mailbox_id = %mailbox.id,
        messages = stats.messages,
        attachments = stats.attachments,
        "Mailbox deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

//! Message handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::db::{AttachmentRepository, MessageRepository};
use crate::inbox::{InboxResolver, MailboxLifecycle};
use crate::web::dto::{
    ApiResponse, MessageDetailResponse, MessageListItem, MessageListQuery, PaginatedResponse,
    ValidatedQuery,
};
use crate::web::error::ApiError;
use crate::TempmailError;

use super::AppState;

/// GET /api/messages/inbox/:mailbox_id - List messages, newest first.
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(mailbox_id): Path<String>,
    ValidatedQuery(query): ValidatedQuery<MessageListQuery>,
) -> Result<Json<PaginatedResponse<MessageListItem>>, ApiError> {
    let mailbox = InboxResolver::new(&state.db)
        .open(&mailbox_id, Utc::now())
        .await?;

    let repo = MessageRepository::new(state.db.pool());
    let messages = repo
        .list_by_mailbox(&mailbox.id, query.offset(), i64::from(query.limit))
        .await?;
    let total = repo.count_by_mailbox(&mailbox.id).await?;

    let items = messages.into_iter().map(MessageListItem::from).collect();
    Ok(Json(PaginatedResponse::new(
        items,
        query.page,
        query.limit,
        total as u64,
    )))
}

/// GET /api/messages/:id - Get a message with its attachment metadata.
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
) -> Result<Json<ApiResponse<MessageDetailResponse>>, ApiError> {
    let message = MessageRepository::new(state.db.pool())
        .get_by_id(&message_id)
        .await?
        .ok_or_else(|| TempmailError::NotFound("message".to_string()))?;

    InboxResolver::new(&state.db)
        .open(&message.mailbox_id, Utc::now())
        .await?;

    let attachments = AttachmentRepository::new(state.db.pool())
        .list_by_message(&message.id)
        .await?;

    Ok(Json(ApiResponse::new(MessageDetailResponse::new(
        message,
        attachments,
    ))))
}

/// DELETE /api/messages/:id - Delete a message and its attachments.
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let stats = MailboxLifecycle::new(&state.db, &state.store)
        .purge_message(&message_id)
        .await?;

    if stats.messages == 0 {
        return Err(ApiError::not_found("Message not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

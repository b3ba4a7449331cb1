//! Attachment download.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::Response,
};
use chrono::Utc;

use crate::db::{AttachmentRepository, MessageRepository};
use crate::inbox::InboxResolver;
use crate::web::error::ApiError;
use crate::TempmailError;

use super::AppState;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Generate a safe Content-Disposition header value.
///
/// Stored filenames are already sanitized; control characters, quotes and
/// backslashes are still stripped so the header can never be split.
fn content_disposition_header(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if safe.is_ascii() {
        return format!("attachment; filename=\"{}\"", safe);
    }

    // RFC 5987 encoding for anything else
    let fallback: String = safe
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(&safe)
    )
}

/// GET /api/attachments/:id - Download an attachment.
///
/// 404 for an unknown attachment, 410 when its mailbox expired and 400 when
/// the stored path does not resolve inside the attachment root.
pub async fn download_attachment(
    State(state): State<Arc<AppState>>,
    Path(attachment_id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let attachment = AttachmentRepository::new(state.db.pool())
        .get_by_id(&attachment_id)
        .await?
        .ok_or_else(|| TempmailError::NotFound("attachment".to_string()))?;

    let message = MessageRepository::new(state.db.pool())
        .get_by_id(&attachment.message_id)
        .await?
        .ok_or_else(|| TempmailError::NotFound("message".to_string()))?;

    InboxResolver::new(&state.db)
        .open(&message.mailbox_id, Utc::now())
        .await?;

    let content = state.store.read(&attachment.storage_path)?;

    let content_type = HeaderValue::from_str(&attachment.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&attachment.filename),
        )
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            ApiError::internal("Failed to build response")
        })
}

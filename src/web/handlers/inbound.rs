//! Inbound mail endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
};
use chrono::Utc;

use crate::ingest::Acknowledgment;
use crate::web::error::ApiError;

use super::AppState;

/// Multipart field holding the raw message.
const EMAIL_FIELD: &str = "email";

/// POST /api/inbound/mail - Receive a raw message.
///
/// Accepts the message either as the `email` field of a multipart form or
/// as the raw request body. Apart from an empty or oversized message, every
/// outcome is answered with 200 so the transfer agent never retries
/// conditions that cannot resolve.
pub async fn receive_mail(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<&'static str, ApiError> {
    let raw = read_raw_message(&state, request).await?;

    let outcome = state.ingest.ingest(&raw, Utc::now()).await;
    match outcome.acknowledgment() {
        Acknowledgment::Accepted => Ok("OK"),
        Acknowledgment::BadRequest => Err(ApiError::bad_request("No email content received")),
        Acknowledgment::PayloadTooLarge => Err(too_large(state.max_email_bytes())),
    }
}

async fn read_raw_message(state: &Arc<AppState>, request: Request) -> Result<Bytes, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        return Bytes::from_request(request, state)
            .await
            .map_err(|e| body_error(e.status(), state.max_email_bytes(), e.body_text()));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text())))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| body_error(e.status(), state.max_email_bytes(), e.body_text()))?
    {
        // Attachments sent alongside are re-extracted from the message itself.
        if field.name() != Some(EMAIL_FIELD) {
            continue;
        }
        return field
            .bytes()
            .await
            .map_err(|e| body_error(e.status(), state.max_email_bytes(), e.body_text()));
    }

    Ok(Bytes::new())
}

fn body_error(status: StatusCode, limit: usize, detail: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(limit)
    } else {
        tracing::debug!(error = %detail, "Failed to read inbound body");
        ApiError::bad_request("Invalid request body")
    }
}

fn too_large(limit: usize) -> ApiError {
    ApiError::payload_too_large(format!(
        "Email size exceeds maximum of {} bytes",
        limit
    ))
}

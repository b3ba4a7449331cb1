//! Response DTOs for Web API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{Attachment, Mailbox, Message, MessageSummary};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    /// Response data.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Create a new paginated response.
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(u64::from(per_page))
        };
        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
                total_pages,
            },
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
    /// Number of pages.
    pub total_pages: u64,
}

// ============================================================================
// Mailbox DTOs
// ============================================================================

/// Mailbox response.
#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<Mailbox> for InboxResponse {
    fn from(mailbox: Mailbox) -> Self {
        Self {
            id: mailbox.id,
            email: mailbox.address,
            created_at: mailbox.created_at,
            expires_at: mailbox.expires_at,
            last_activity: mailbox.last_activity,
        }
    }
}

// ============================================================================
// Message DTOs
// ============================================================================

/// Message list entry.
#[derive(Debug, Serialize)]
pub struct MessageListItem {
    pub id: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    pub attachment_count: i64,
}

impl From<MessageSummary> for MessageListItem {
    fn from(summary: MessageSummary) -> Self {
        Self {
            id: summary.id,
            from_address: summary.from_address,
            to_address: summary.to_address,
            subject: summary.subject,
            received_at: summary.received_at,
            attachment_count: summary.attachment_count,
        }
    }
}

/// Attachment metadata in message details.
#[derive(Debug, Serialize)]
pub struct AttachmentInfo {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

impl From<Attachment> for AttachmentInfo {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id,
            filename: attachment.filename,
            content_type: attachment.content_type,
            size: attachment.size,
        }
    }
}

/// Full message.
#[derive(Debug, Serialize)]
pub struct MessageDetailResponse {
    pub id: String,
    pub mailbox_id: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub received_at: DateTime<Utc>,
    pub attachment_count: usize,
    pub attachments: Vec<AttachmentInfo>,
}

impl MessageDetailResponse {
    pub fn new(message: Message, attachments: Vec<Attachment>) -> Self {
        Self {
            id: message.id,
            mailbox_id: message.mailbox_id,
            from_address: message.from_address,
            to_address: message.to_address,
            subject: message.subject,
            text_body: message.text_body,
            html_body: message.html_body,
            received_at: message.received_at,
            attachment_count: attachments.len(),
            attachments: attachments.into_iter().map(AttachmentInfo::from).collect(),
        }
    }
}

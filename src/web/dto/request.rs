//! Request DTOs for Web API.

use serde::Deserialize;
use validator::Validate;

/// Default page size for message listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Mailbox creation request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInboxRequest {
    /// Address of the mailbox.
    #[validate(
        email(message = "Must be a valid email address"),
        length(max = 254, message = "Must be at most 254 characters")
    )]
    pub email: String,
}

/// Pagination query for message listings.
#[derive(Debug, Deserialize, Validate)]
pub struct MessageListQuery {
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Must be at least 1"))]
    pub page: u32,
    /// Items per page.
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "Must be between 1 and 100"))]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl MessageListQuery {
    /// Row offset of the requested page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

impl Default for MessageListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

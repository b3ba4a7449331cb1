//! Attachment handling.
//!
//! - Filename sanitization
//! - Size ceiling enforcement
//! - Contained on-disk storage under the attachment root

mod sanitize;
mod store;

pub use sanitize::{sanitize_filename, DEFAULT_FILENAME, MAX_FILENAME_LEN};
pub use store::AttachmentStore;

//! Ingestion of inbound messages.
//!
//! decode → resolve mailbox → persist message → persist attachments →
//! notify. Every attempt ends in a typed [`IngestOutcome`], which is mapped
//! to the acknowledgment returned to the submitter.

mod outcome;
mod service;

pub use outcome::{Acknowledgment, AttachmentOutcome, IngestOutcome, IngestStage, SkipReason};
pub use service::IngestService;

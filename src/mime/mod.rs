//! MIME decoding of inbound messages.
//!
//! Turns raw message bytes into an [`Envelope`]: sender, recipient, subject,
//! text and HTML bodies, and the attachment parts.

mod decoder;
mod envelope;

pub use decoder::{parse_address, MimeDecoder};
pub use envelope::{Envelope, ExtractedAttachment, UNKNOWN_SENDER};

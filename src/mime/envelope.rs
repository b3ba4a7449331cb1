//! Decoded message structure.

/// Sender used when the `From` header is missing or unparsable.
pub const UNKNOWN_SENDER: &str = "unknown@unknown.com";

/// Structured view of a raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender address, [`UNKNOWN_SENDER`] if none could be parsed.
    pub from: String,
    /// Recipient address from `To`, or `Delivered-To` as a fallback.
    pub to: Option<String>,
    /// Decoded subject.
    pub subject: Option<String>,
    /// First plain-text body part.
    pub text_body: Option<String>,
    /// First HTML body part.
    pub html_body: Option<String>,
    /// Attachment parts in document order.
    pub attachments: Vec<ExtractedAttachment>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            from: UNKNOWN_SENDER.to_string(),
            to: None,
            subject: None,
            text_body: None,
            html_body: None,
            attachments: Vec::new(),
        }
    }
}

/// An attachment part as found in the message.
///
/// The filename is decoded but not sanitized.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractedAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl ExtractedAttachment {
    /// Size of the decoded content in bytes.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

impl std::fmt::Debug for ExtractedAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedAttachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.content.len())
            .finish()
    }
}

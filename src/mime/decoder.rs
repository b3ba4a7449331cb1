//! Raw message decoding.

use mailparse::{DispositionType, MailAddr, MailHeader, MailHeaderMap, ParsedMail};
use tracing::{debug, warn};

use super::envelope::{Envelope, ExtractedAttachment, UNKNOWN_SENDER};
use crate::{Result, TempmailError};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Most multipart containers a message may declare before only its top-level
/// headers are decoded. mailparse recurses once per nesting level.
pub const MAX_MULTIPART_CONTAINERS: usize = 64;

/// Decoder for untrusted raw message bytes.
#[derive(Debug, Clone, Copy)]
pub struct MimeDecoder {
    max_size: usize,
}

impl MimeDecoder {
    /// Create a decoder refusing input larger than `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Maximum accepted input size in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Decode raw message bytes into an [`Envelope`].
    ///
    /// Only oversized input is an error. Malformed headers and parts degrade
    /// to best-effort text or are left out; input mailparse cannot parse at
    /// all yields an envelope without recipient.
    pub fn decode(&self, raw: &[u8]) -> Result<Envelope> {
        if raw.len() > self.max_size {
            return Err(TempmailError::Validation(format!(
                "message of {} bytes exceeds the {} byte limit",
                raw.len(),
                self.max_size
            )));
        }

        let containers = count_multipart_headers(raw);
        if containers > MAX_MULTIPART_CONTAINERS {
            warn!(
                containers,
                limit = MAX_MULTIPART_CONTAINERS,
                "Too many multipart containers, decoding headers only"
            );
            return Ok(match mailparse::parse_headers(raw) {
                Ok((headers, _)) => envelope_from_headers(&headers),
                Err(e) => {
                    warn!(error = %e, "Unparsable headers, decoding as empty envelope");
                    Envelope::default()
                }
            });
        }

        let parsed = match mailparse::parse_mail(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Unparsable message, decoding as empty envelope");
                return Ok(Envelope::default());
            }
        };

        let mut envelope = envelope_from_headers(&parsed.headers);
        if parsed.subparts.is_empty() {
            decode_single_part(&parsed, &mut envelope);
        } else {
            decode_multipart(&parsed, &mut envelope);
        }

        Ok(envelope)
    }
}

/// Addresses and subject from a header block.
fn envelope_from_headers(headers: &[MailHeader<'_>]) -> Envelope {
    let from = headers
        .get_first_value("From")
        .and_then(|value| parse_address(&value))
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
    let to = headers
        .get_first_value("To")
        .and_then(|value| parse_address(&value))
        .or_else(|| {
            headers
                .get_first_value("Delivered-To")
                .and_then(|value| parse_address(&value))
        });
    let subject = headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Envelope {
        from,
        to,
        subject,
        ..Envelope::default()
    }
}

/// Count `Content-Type` headers declaring a multipart type, anywhere in the
/// message. This bounds the nesting depth mailparse would recurse into.
fn count_multipart_headers(raw: &[u8]) -> usize {
    let mut count = 0;
    let mut in_content_type = false;

    for line in raw.split(|&b| b == b'\n') {
        let folded = matches!(line.first(), Some(b' ' | b'\t'));
        if !folded {
            in_content_type = starts_with_ignore_case(line, b"content-type:");
        }
        if in_content_type && contains_ignore_case(line, b"multipart/") {
            count += 1;
            in_content_type = false;
        }
    }
    count
}

fn starts_with_ignore_case(line: &[u8], prefix: &[u8]) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn contains_ignore_case(line: &[u8], needle: &[u8]) -> bool {
    line.windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

fn decode_single_part(part: &ParsedMail<'_>, envelope: &mut Envelope) {
    let body = match part.get_body() {
        Ok(body) if !body.is_empty() => body,
        Ok(_) => return,
        Err(e) => {
            debug!(error = %e, "Skipping undecodable body");
            return;
        }
    };

    if part.ctype.mimetype.eq_ignore_ascii_case("text/html") {
        envelope.html_body = Some(body);
    } else {
        envelope.text_body = Some(body);
    }
}

/// Walk the part tree in document order and classify every leaf.
fn decode_multipart(root: &ParsedMail<'_>, envelope: &mut Envelope) {
    let mut stack = vec![root];

    while let Some(part) = stack.pop() {
        if !part.subparts.is_empty() {
            stack.extend(part.subparts.iter().rev());
            continue;
        }

        let mimetype = part.ctype.mimetype.to_ascii_lowercase();
        if mimetype.starts_with("multipart/") {
            continue;
        }

        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .map(|name| decode_encoded_words(name));

        if matches!(disposition.disposition, DispositionType::Attachment) || filename.is_some() {
            match part.get_body_raw() {
                Ok(content) => envelope.attachments.push(ExtractedAttachment {
                    filename: filename.unwrap_or_default(),
                    content_type: if mimetype.is_empty() {
                        DEFAULT_CONTENT_TYPE.to_string()
                    } else {
                        mimetype
                    },
                    content,
                }),
                Err(e) => debug!(error = %e, "Skipping undecodable attachment part"),
            }
            continue;
        }

        let slot = match mimetype.as_str() {
            "text/plain" => &mut envelope.text_body,
            "text/html" => &mut envelope.html_body,
            _ => continue,
        };
        if slot.is_some() {
            continue;
        }
        match part.get_body() {
            Ok(body) if !body.is_empty() => *slot = Some(body),
            Ok(_) => {}
            Err(e) => debug!(error = %e, mimetype = %mimetype, "Skipping undecodable body part"),
        }
    }
}

/// Extract the first mailbox address from an address header value.
///
/// Falls back to the bracketed or bare value when strict parsing fails.
pub fn parse_address(value: &str) -> Option<String> {
    if let Ok(list) = mailparse::addrparse(value) {
        for address in list.into_inner() {
            let single = match address {
                MailAddr::Single(single) => Some(single),
                MailAddr::Group(group) => group.addrs.into_iter().next(),
            };
            if let Some(single) = single {
                let addr = single.addr.trim();
                if addr.contains('@') && !addr.chars().any(char::is_whitespace) {
                    return Some(addr.to_string());
                }
            }
        }
    }

    lenient_address(value)
}

fn lenient_address(value: &str) -> Option<String> {
    let candidate = match (value.find('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => &value[start + 1..end],
        _ => value,
    };
    let candidate = candidate.trim().trim_matches('"');

    let valid = candidate.contains('@') && !candidate.chars().any(char::is_whitespace);
    valid.then(|| candidate.to_string())
}

/// Decode RFC 2047 encoded words in a parameter value.
///
/// mailparse decodes encoded words in header values but not inside
/// parameters, so the value is run through a synthetic header.
fn decode_encoded_words(value: &str) -> String {
    if !value.contains("=?") {
        return value.to_string();
    }

    match mailparse::parse_header(format!("X: {value}").as_bytes()) {
        Ok((header, _)) => header.get_value(),
        Err(_) => value.to_string(),
    }
}

//! Relay from the mail transfer agent to the ingestion endpoint.
//!
//! Runs as a pipe command: one message is read from the input, forwarded
//! with bounded retries, and the outcome is reported as a `sysexits.h`
//! exit status the transfer agent understands.

mod client;
mod error;
mod spool;

pub use client::{classify, RelayClient, USER_AGENT};
pub use error::{RelayError, RelayExit};
pub use spool::{ScratchSpool, SpooledMessage};

use std::io::Read;
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use crate::attachment::sanitize_filename;
use crate::config::RelayConfig;
use crate::mime::{Envelope, ExtractedAttachment, MimeDecoder};

/// Read one message of at most `limit` bytes.
pub fn read_message<R: Read>(input: R, limit: u64) -> Result<Vec<u8>, RelayError> {
    let mut raw = Vec::new();
    input.take(limit.saturating_add(1)).read_to_end(&mut raw)?;

    if raw.is_empty() {
        return Err(RelayError::Empty);
    }
    if raw.len() as u64 > limit {
        return Err(RelayError::TooLarge { limit });
    }
    Ok(raw)
}

/// Select the attachments forwarded alongside the raw message.
///
/// Filenames are sanitized and attachments above the configured ceiling are
/// left out.
pub fn extract_attachments(envelope: Envelope, config: &RelayConfig) -> Vec<ExtractedAttachment> {
    let limit = config.max_attachment_bytes();
    envelope
        .attachments
        .into_iter()
        .filter_map(|mut attachment| {
            attachment.filename = sanitize_filename(&attachment.filename);
            if attachment.size() > limit {
                warn!(
                    filename = %attachment.filename,
                    size = attachment.size(),
                    limit,
                    "Attachment exceeds maximum size, not forwarded"
                );
                return None;
            }
            debug!(filename = %attachment.filename, size = attachment.size(), "Extracted attachment");
            Some(attachment)
        })
        .collect()
}

/// Relay one message read from `input`.
///
/// Stale scratch files are cleaned up afterwards whatever the outcome.
pub async fn run<R: Read>(config: &RelayConfig, input: R) -> RelayExit {
    let max_age = Duration::from_secs(config.scratch_max_age_hours * 3600);
    let spool = match ScratchSpool::new(&config.scratch_dir, max_age) {
        Ok(spool) => Some(spool),
        Err(e) => {
            warn!(dir = %config.scratch_dir, error = %e, "Scratch directory unavailable");
            None
        }
    };

    let exit = match relay(config, input, spool.as_ref()).await {
        Ok(attempts) => {
            info!(attempts, "Message relayed");
            RelayExit::Delivered
        }
        Err(e) => {
            let exit = RelayExit::from(&e);
            error!(error = %e, exit_code = exit.code(), "Relay failed");
            exit
        }
    };

    if let Some(spool) = &spool {
        let removed = spool.cleanup_stale(SystemTime::now());
        if removed > 0 {
            info!(removed, "Removed stale scratch files");
        }
    }

    exit
}

async fn relay<R: Read>(
    config: &RelayConfig,
    input: R,
    spool: Option<&ScratchSpool>,
) -> Result<u32, RelayError> {
    let raw = read_message(input, config.max_email_bytes())?;

    let _spooled = spool.and_then(|spool| match spool.spool(&raw) {
        Ok(spooled) => Some(spooled),
        Err(e) => {
            warn!(error = %e, "Failed to spool message");
            None
        }
    });

    let envelope = match MimeDecoder::new(raw.len()).decode(&raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Could not decode message");
            Envelope::default()
        }
    };
    info!(
        from = %envelope.from,
        to = envelope.to.as_deref().unwrap_or(""),
        size = raw.len(),
        "Processing message"
    );
    if envelope.to.is_none() {
        warn!("No recipient address found, forwarding anyway");
    }

    let attachments = extract_attachments(envelope, config);
    if !attachments.is_empty() {
        info!(count = attachments.len(), "Found attachments");
    }

    RelayClient::new(config)?.submit(&raw, &attachments).await
}

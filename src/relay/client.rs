//! HTTP submission to the ingestion endpoint.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use super::error::RelayError;
use crate::config::RelayConfig;
use crate::mime::ExtractedAttachment;

/// User agent sent with every submission.
pub const USER_AGENT: &str = "Postfix-MailPipe/1.0";

const EMAIL_PART: &str = "email";
const ATTACHMENT_PART: &str = "attachments";
const EMAIL_FILENAME: &str = "email.eml";
const EMAIL_CONTENT_TYPE: &str = "message/rfc822";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Client submitting one message with bounded retries.
pub struct RelayClient {
    client: Client,
    endpoint: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl RelayClient {
    /// Create a client from the relay configuration.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Transient(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Delay before the attempt following `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Submit a message, retrying transient failures.
    ///
    /// Attempts run strictly one after another with exponential backoff in
    /// between. Returns the number of attempts it took.
    pub async fn submit(
        &self,
        raw: &[u8],
        attachments: &[ExtractedAttachment],
    ) -> Result<u32, RelayError> {
        let mut attempt = 0;
        loop {
            match self.attempt(raw, attachments).await {
                Ok(()) => {
                    info!(attempt = attempt + 1, "Message delivered to backend");
                    return Ok(attempt + 1);
                }
                Err(e) if e.is_transient() && attempt + 1 < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(attempts = self.max_retries, "Giving up after retries");
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(
        &self,
        raw: &[u8],
        attachments: &[ExtractedAttachment],
    ) -> Result<(), RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(build_form(raw, attachments)?)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    "request timed out"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                RelayError::Transient(format!("{kind}: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }
}

/// Classify a non-success response.
pub fn classify(status: StatusCode, body: &str) -> RelayError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.chars().take(200).collect::<String>())
    };

    if status.is_server_error() {
        RelayError::Transient(detail)
    } else {
        RelayError::Permanent(detail)
    }
}

fn build_form(raw: &[u8], attachments: &[ExtractedAttachment]) -> Result<Form, RelayError> {
    let email = Part::bytes(raw.to_vec())
        .file_name(EMAIL_FILENAME)
        .mime_str(EMAIL_CONTENT_TYPE)
        .map_err(|e| RelayError::Permanent(format!("invalid email part: {e}")))?;
    let mut form = Form::new().part(EMAIL_PART, email);

    for attachment in attachments {
        let part = Part::bytes(attachment.content.clone()).file_name(attachment.filename.clone());
        let part = match part.mime_str(&attachment.content_type) {
            Ok(part) => part,
            Err(_) => Part::bytes(attachment.content.clone())
                .file_name(attachment.filename.clone())
                .mime_str(FALLBACK_CONTENT_TYPE)
                .map_err(|e| RelayError::Permanent(format!("invalid attachment part: {e}")))?,
        };
        form = form.part(ATTACHMENT_PART, part);
    }

    Ok(form)
}

//! Configuration module for tempmail.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, TempmailError};

const MB: u64 = 1024 * 1024;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins (empty allows any origin).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/tempmail.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Attachment storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for attachment files.
    #[serde(default = "default_attachments_path")]
    pub attachments_path: String,
    /// Per-attachment size ceiling in megabytes.
    #[serde(default = "default_max_attachment_size")]
    pub max_attachment_size_mb: u64,
}

fn default_attachments_path() -> String {
    "data/attachments".to_string()
}

fn default_max_attachment_size() -> u64 {
    5
}

impl StorageConfig {
    /// Per-attachment size ceiling in bytes.
    pub fn max_attachment_bytes(&self) -> u64 {
        self.max_attachment_size_mb * MB
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            attachments_path: default_attachments_path(),
            max_attachment_size_mb: default_max_attachment_size(),
        }
    }
}

/// Mailbox configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InboxConfig {
    /// Lifetime of a freshly created mailbox in hours.
    #[serde(default = "default_lifetime_hours")]
    pub lifetime_hours: u64,
    /// Maximum size of a raw inbound message in megabytes.
    #[serde(default = "default_max_email_size")]
    pub max_email_size_mb: u64,
}

fn default_lifetime_hours() -> u64 {
    24
}

fn default_max_email_size() -> u64 {
    10
}

impl InboxConfig {
    /// Maximum size of a raw inbound message in bytes.
    pub fn max_email_bytes(&self) -> u64 {
        self.max_email_size_mb * MB
    }

    /// Lifetime of a freshly created mailbox.
    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.lifetime_hours as i64)
    }
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            lifetime_hours: default_lifetime_hours(),
            max_email_size_mb: default_max_email_size(),
        }
    }
}

/// Expiry sweeper configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Whether the sweeper runs at all.
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
    /// Interval between sweeps in minutes.
    #[serde(default = "default_cleanup_interval")]
    pub interval_minutes: u64,
}

fn default_cleanup_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_cleanup_enabled(),
            interval_minutes: default_cleanup_interval(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/tempmail.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Relay client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the ingestion backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Maximum size of a message read from the transfer agent, in megabytes.
    #[serde(default = "default_max_email_size")]
    pub max_email_size_mb: u64,
    /// Per-attachment ceiling used when extracting attachments for logging, in megabytes.
    #[serde(default = "default_max_attachment_size")]
    pub max_attachment_size_mb: u64,
    /// Total number of submission attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds; doubled after every failed attempt.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Request timeout in seconds.
    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
    /// Scratch directory owned by the relay.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
    /// Scratch files older than this are removed on every run.
    #[serde(default = "default_scratch_max_age")]
    pub scratch_max_age_hours: u64,
    /// Log level for the relay process.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_relay_timeout() -> u64 {
    30
}

fn default_scratch_dir() -> String {
    "/tmp/mailpipe".to_string()
}

fn default_scratch_max_age() -> u64 {
    24
}

impl RelayConfig {
    /// Full URL of the ingestion endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/api/inbound/mail", self.backend_url.trim_end_matches('/'))
    }

    /// Maximum size of a relayed message in bytes.
    pub fn max_email_bytes(&self) -> u64 {
        self.max_email_size_mb * MB
    }

    /// Per-attachment ceiling in bytes.
    pub fn max_attachment_bytes(&self) -> u64 {
        self.max_attachment_size_mb * MB
    }

    /// Check that the backend URL is an absolute http(s) URL.
    pub fn validate_backend_url(&self) -> Result<()> {
        match url::Url::parse(&self.backend_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
            Ok(url) => Err(TempmailError::Config(format!(
                "relay.backend_url must be an http(s) URL, got {}",
                url
            ))),
            Err(e) => Err(TempmailError::Config(format!(
                "relay.backend_url is invalid: {}",
                e
            ))),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            max_email_size_mb: default_max_email_size(),
            max_attachment_size_mb: default_max_attachment_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            timeout_secs: default_relay_timeout(),
            scratch_dir: default_scratch_dir(),
            scratch_max_age_hours: default_scratch_max_age(),
            log_level: default_log_level(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Attachment storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Mailbox configuration.
    #[serde(default)]
    pub inbox: InboxConfig,
    /// Expiry sweeper configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Relay client configuration.
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(TempmailError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file that may not exist.
    ///
    /// Returns `Ok(None)` when the file is missing. Unreadable or invalid files are errors.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Self::parse(&content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TempmailError::Io(e)),
        }
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| TempmailError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `TEMPMAIL_DATABASE_PATH`: SQLite database path
    /// - `TEMPMAIL_ATTACHMENTS_PATH`: attachment root directory
    /// - `MAILPIPE_BACKEND_URL`: ingestion backend used by the relay
    /// - `MAILPIPE_TEMP_DIR`: relay scratch directory
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 4] = [
            ("TEMPMAIL_DATABASE_PATH", &mut self.database.path),
            ("TEMPMAIL_ATTACHMENTS_PATH", &mut self.storage.attachments_path),
            ("MAILPIPE_BACKEND_URL", &mut self.relay.backend_url),
            ("MAILPIPE_TEMP_DIR", &mut self.relay.scratch_dir),
        ];

        for (name, target) in overrides {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    *target = value;
                }
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.inbox.lifetime_hours == 0, "inbox.lifetime_hours must be positive"),
            (self.inbox.max_email_size_mb == 0, "inbox.max_email_size_mb must be positive"),
            (
                self.storage.max_attachment_size_mb == 0,
                "storage.max_attachment_size_mb must be positive",
            ),
            (
                self.cleanup.enabled && self.cleanup.interval_minutes == 0,
                "cleanup.interval_minutes must be positive",
            ),
            (self.relay.max_retries == 0, "relay.max_retries must be at least 1"),
            (self.relay.max_email_size_mb == 0, "relay.max_email_size_mb must be positive"),
        ];

        for (failed, message) in checks {
            if failed {
                return Err(TempmailError::Config(message.to_string()));
            }
        }
        self.relay.validate_backend_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert!(config.server.cors_origins.is_empty());

        assert_eq!(config.database.path, "data/tempmail.db");

        assert_eq!(config.storage.attachments_path, "data/attachments");
        assert_eq!(config.storage.max_attachment_size_mb, 5);
        assert_eq!(config.storage.max_attachment_bytes(), 5 * 1024 * 1024);

        assert_eq!(config.inbox.lifetime_hours, 24);
        assert_eq!(config.inbox.max_email_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.inbox.lifetime(), chrono::Duration::hours(24));

        assert!(config.cleanup.enabled);
        assert_eq!(config.cleanup.interval_minutes, 60);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/tempmail.log");

        assert_eq!(config.relay.backend_url, "http://localhost:8000");
        assert_eq!(config.relay.max_retries, 3);
        assert_eq!(config.relay.retry_delay_ms, 2000);
        assert_eq!(config.relay.timeout_secs, 30);
        assert_eq!(config.relay.scratch_dir, "/tmp/mailpipe");
        assert_eq!(config.relay.scratch_max_age_hours, 24);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
cors_origins = ["http://localhost:5173"]

[database]
path = "custom/mail.db"

[storage]
attachments_path = "custom/att"
max_attachment_size_mb = 2

[inbox]
lifetime_hours = 1
max_email_size_mb = 3

[cleanup]
enabled = false
interval_minutes = 5

[logging]
level = "debug"
file = "custom/logs/app.log"

[relay]
backend_url = "http://backend:8000/"
max_email_size_mb = 4
max_retries = 5
retry_delay_ms = 10
timeout_secs = 3
scratch_dir = "/var/spool/mailpipe"
scratch_max_age_hours = 2
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.database.path, "custom/mail.db");
        assert_eq!(config.storage.attachments_path, "custom/att");
        assert_eq!(config.storage.max_attachment_size_mb, 2);
        assert_eq!(config.inbox.lifetime_hours, 1);
        assert_eq!(config.inbox.max_email_size_mb, 3);
        assert!(!config.cleanup.enabled);
        assert_eq!(config.cleanup.interval_minutes, 5);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.relay.max_retries, 5);
        assert_eq!(config.relay.retry_delay_ms, 10);
        assert_eq!(config.relay.scratch_dir, "/var/spool/mailpipe");
        assert_eq!(config.relay.endpoint(), "http://backend:8000/api/inbound/mail");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[inbox]
lifetime_hours = 2
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.inbox.lifetime_hours, 2);
        assert_eq!(config.inbox.max_email_size_mb, 10);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.path, "data/tempmail.db");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.cleanup.interval_minutes, 60);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(TempmailError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(TempmailError::Io(_))));
    }

    #[test]
    fn test_load_optional_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = Config::load_optional(dir.path().join("absent.toml"));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_load_optional_reports_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[relay\nbackend_url = ").unwrap();

        let result = Config::load_optional(&path);
        assert!(matches!(result, Err(TempmailError::Config(_))));
    }

    #[test]
    fn test_load_optional_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[relay]\nbackend_url = \"http://backend:9000\"\n").unwrap();

        let config = Config::load_optional(&path).unwrap().unwrap();
        assert_eq!(config.relay.backend_url, "http://backend:9000");
    }

    #[test]
    fn test_apply_env_overrides() {
        let original = std::env::var("MAILPIPE_TEMP_DIR").ok();

        std::env::set_var("MAILPIPE_TEMP_DIR", "/tmp/relay-scratch");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.relay.scratch_dir, "/tmp/relay-scratch");

        std::env::set_var("MAILPIPE_TEMP_DIR", "");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.relay.scratch_dir, "/tmp/mailpipe");

        if let Some(val) = original {
            std::env::set_var("MAILPIPE_TEMP_DIR", val);
        } else {
            std::env::remove_var("MAILPIPE_TEMP_DIR");
        }
    }

    #[test]
    fn test_validate_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_lifetime() {
        let mut config = Config::default();
        config.inbox.lifetime_hours = 0;

        let result = config.validate();
        assert!(matches!(result, Err(TempmailError::Config(msg)) if msg.contains("lifetime")));
    }

    #[test]
    fn test_validate_zero_retries() {
        let mut config = Config::default();
        config.relay.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_backend_url() {
        let mut config = Config::default();
        config.relay.backend_url = "https://mail.example.com/".to_string();
        assert!(config.validate().is_ok());

        for bad in ["localhost:8000", "ftp://example.com", "not a url"] {
            config.relay.backend_url = bad.to_string();
            assert!(
                matches!(config.validate(), Err(TempmailError::Config(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_validate_zero_interval_only_when_enabled() {
        let mut config = Config::default();
        config.cleanup.interval_minutes = 0;
        assert!(config.validate().is_err());

        config.cleanup.enabled = false;
        assert!(config.validate().is_ok());
    }
}

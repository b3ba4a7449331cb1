//! Shared helpers for the HTTP API tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use tempmail::config::Config;
use tempmail::db::{MailboxRepository, NewMailbox};
use tempmail::notify::Broadcaster;
use tempmail::web::{create_health_router, create_router, AppState};
use tempmail::{AttachmentStore, Database, Mailbox};

/// A test server backed by an in-memory database and a temporary
/// attachment directory.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub dir: TempDir,
}

/// Configuration with small limits so size checks are cheap to exercise.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.inbox.max_email_size_mb = 1;
    config.inbox.lifetime_hours = 1;
    config.storage.max_attachment_size_mb = 1;
    config
}

/// Create a test application with the default test configuration.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_config()).await
}

/// Create a test application served over a real HTTP transport, as
/// WebSocket tests require.
pub async fn create_test_app_http() -> TestApp {
    build_test_app(test_config(), true).await
}

/// Create a test application with the given configuration.
pub async fn create_test_app_with(config: Config) -> TestApp {
    build_test_app(config, false).await
}

async fn build_test_app(config: Config, http_transport: bool) -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let store = AttachmentStore::new(
        dir.path().join("attachments"),
        config.storage.max_attachment_bytes(),
    )
    .expect("Failed to create attachment store");

    let state = Arc::new(AppState::new(
        db,
        store,
        Arc::new(Broadcaster::new()),
        &config,
    ));
    let router = create_router(state.clone(), &[]).merge(create_health_router());
    let server = if http_transport {
        TestServer::builder()
            .http_transport()
            .build(router)
            .expect("Failed to create test server")
    } else {
        TestServer::new(router).expect("Failed to create test server")
    };

    TestApp { server, state, dir }
}

impl TestApp {
    /// Create a mailbox through the API and return its ID.
    pub async fn create_inbox(&self, email: &str) -> String {
        let response = self
            .server
            .post("/api/inboxes")
            .json(&json!({ "email": email }))
            .await;
        let body: Value = response.json();
        body["data"]["id"]
            .as_str()
            .expect("mailbox id in response")
            .to_string()
    }

    /// Insert a mailbox that expired an hour ago.
    pub async fn create_expired_inbox(&self, address: &str) -> Mailbox {
        let now = Utc::now();
        MailboxRepository::new(self.state.db.pool())
            .create(&NewMailbox::new(
                address,
                now - Duration::hours(2),
                Duration::hours(1),
            ))
            .await
            .expect("Failed to create expired mailbox")
    }

    /// Post a raw message to the inbound endpoint and assert it was accepted.
    pub async fn deliver(&self, raw: &str) {
        let response = self
            .server
            .post("/api/inbound/mail")
            .bytes(raw.as_bytes().to_vec().into())
            .await;
        response.assert_status_ok();
    }

    /// List the messages of a mailbox.
    pub async fn list_messages(&self, mailbox_id: &str) -> Value {
        self.server
            .get(&format!("/api/messages/inbox/{}", mailbox_id))
            .await
            .json()
    }
}

/// A plain-text message.
pub fn plain_message(to: &str, subject: &str) -> String {
    format!(
        "From: Sender <sender@example.org>\r\n\
         To: {to}\r\n\
         Subject: {subject}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         Hello there.\r\n"
    )
}

/// A multipart message carrying one text attachment.
pub fn message_with_attachment(to: &str, filename: &str, content: &str) -> String {
    format!(
        "From: sender@example.org\r\n\
         To: {to}\r\n\
         Subject: With attachment\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
         \r\n\
         --XYZ\r\n\
         Content-Type: text/plain\r\n\
         \r\n\
         See attached.\r\n\
         --XYZ\r\n\
         Content-Type: text/plain\r\n\
         Content-Disposition: attachment; filename=\"{filename}\"\r\n\
         \r\n\
         {content}\r\n\
         --XYZ--\r\n"
    )
}

impl TestApp {
    /// Move the expiry of an existing mailbox into the past.
    pub async fn expire_mailbox(&self, mailbox_id: &str) {
        let past = Utc::now() - Duration::minutes(1);
        sqlx::query("UPDATE mailboxes SET expires_at = ? WHERE id = ?")
            .bind(tempmail::db::timestamp(&past))
            .bind(mailbox_id)
            .execute(self.state.db.pool())
            .await
            .expect("Failed to expire mailbox");
    }

    /// ID of the newest message in a mailbox.
    pub async fn first_message_id(&self, mailbox_id: &str) -> String {
        let list = self.list_messages(mailbox_id).await;
        list["data"][0]["id"]
            .as_str()
            .expect("message in mailbox")
            .to_string()
    }
}

//! Shared application state.

use std::sync::Arc;

use chrono::Duration;

use crate::attachment::AttachmentStore;
use crate::config::Config;
use crate::db::Database;
use crate::ingest::IngestService;
use crate::notify::Broadcaster;

/// State shared by all handlers.
pub struct AppState {
    pub db: Database,
    pub store: AttachmentStore,
    pub broadcaster: Arc<Broadcaster>,
    pub ingest: IngestService,
    /// Lifetime of newly created mailboxes.
    pub mailbox_lifetime: Duration,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        db: Database,
        store: AttachmentStore,
        broadcaster: Arc<Broadcaster>,
        config: &Config,
    ) -> Self {
        let ingest = IngestService::new(
            db.clone(),
            store.clone(),
            broadcaster.clone(),
            config.inbox.max_email_bytes() as usize,
        );

        Self {
            db,
            store,
            broadcaster,
            ingest,
            mailbox_lifetime: config.inbox.lifetime(),
        }
    }

    /// Maximum accepted raw message size in bytes.
    pub fn max_email_bytes(&self) -> usize {
        self.ingest.max_email_bytes()
    }
}

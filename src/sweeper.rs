//! Periodic reclamation of expired mailboxes.
//!
//! Every cycle deletes the mailboxes whose expiry has passed, then reclaims
//! messages and attachments left without an owner by an ingestion that
//! raced a previous sweep.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::attachment::AttachmentStore;
use crate::db::{AttachmentRepository, Database, MailboxRepository, MessageRepository};
use crate::inbox::{MailboxLifecycle, PurgeStats};

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired mailboxes found.
    pub expired: usize,
    /// Mailboxes (or orphans) whose cleanup failed.
    pub failures: usize,
    /// What was removed for expired mailboxes.
    pub purged: PurgeStats,
    /// What was removed for ownerless records.
    pub orphans: PurgeStats,
}

/// Expiry sweeper.
#[derive(Clone)]
pub struct ExpirySweeper {
    db: Database,
    store: AttachmentStore,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(db: Database, store: AttachmentStore, interval: Duration) -> Self {
        Self {
            db,
            store,
            interval,
        }
    }

    /// Interval between sweeps.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the sweep loop until `shutdown` changes or its sender is dropped.
    ///
    /// The first sweep runs immediately. A sweep in progress always
    /// completes before shutdown is observed.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper started"
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep_once(Utc::now()).await;
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Expiry sweeper stopped");
    }

    /// Run a single sweep.
    ///
    /// Failures are isolated per mailbox: a mailbox that cannot be purged is
    /// logged and counted, and the sweep moves on to the next one.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let lifecycle = MailboxLifecycle::new(&self.db, &self.store);

        match MailboxRepository::new(self.db.pool()).list_expired(now).await {
            Ok(expired) => {
                report.expired = expired.len();
                for mailbox in &expired {
                    match lifecycle.purge_mailbox(mailbox).await {
                        Ok(stats) => report.purged += stats,
                        Err(e) => {
                            report.failures += 1;
                            error!(mailbox_id = %mailbox.id, error = %e, "Failed to purge expired mailbox");
                        }
                    }
                }
            }
            Err(e) => {
                report.failures += 1;
                error!(error = %e, "Failed to list expired mailboxes");
            }
        }

        self.reclaim_orphans(&lifecycle, &mut report).await;

        match self.store.cleanup_empty_dirs() {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Removed empty attachment directories"),
            Err(e) => warn!(error = %e, "Failed to clean up attachment directories"),
        }

        if report.expired > 0 || report.failures > 0 || !report.orphans.is_empty() {
            info!(
                expired = report.expired,
                failures = report.failures,
                mailboxes = report.purged.mailboxes,
                messages = report.purged.messages + report.orphans.messages,
                attachments = report.purged.attachments + report.orphans.attachments,
                files = report.purged.files + report.orphans.files,
                "Sweep finished"
            );
        } else {
            debug!("Sweep finished, nothing expired");
        }

        report
    }

    async fn reclaim_orphans(&self, lifecycle: &MailboxLifecycle<'_>, report: &mut SweepReport) {
        match AttachmentRepository::new(self.db.pool()).list_orphans().await {
            Ok(attachments) => {
                for attachment in &attachments {
                    match lifecycle.purge_attachment(attachment).await {
                        Ok(stats) => report.orphans += stats,
                        Err(e) => {
                            report.failures += 1;
                            warn!(attachment_id = %attachment.id, error = %e, "Failed to reclaim orphaned attachment");
                        }
                    }
                }
            }
            Err(e) => {
                report.failures += 1;
                warn!(error = %e, "Failed to list orphaned attachments");
            }
        }

        match MessageRepository::new(self.db.pool()).list_orphans().await {
            Ok(message_ids) => {
                for message_id in &message_ids {
                    match lifecycle.purge_message(message_id).await {
                        Ok(stats) => report.orphans += stats,
                        Err(e) => {
                            report.failures += 1;
                            warn!(message_id = %message_id, error = %e, "Failed to reclaim orphaned message");
                        }
                    }
                }
            }
            Err(e) => {
                report.failures += 1;
                warn!(error = %e, "Failed to list orphaned messages");
            }
        }
    }
}

/// Spawn the sweeper as a background task.
pub fn start_sweeper(sweeper: ExpirySweeper, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        sweeper.run(shutdown).await;
    })
}

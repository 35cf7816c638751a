// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Document Expiry Sweeper
//!
//! Background task that moves documents out of `sent` once their signing
//! window closes, so expiry holds even when nobody opens the document.
//!
//! ## Strategy
//!
//! Every `sweep_interval` (default 5 min) the sweeper:
//! 1. Marks every `sent` document whose `expires_at` has passed as `expired`
//!    and writes a `document_expired` audit event for each.
//! 2. Purges revoked token ids whose tokens have expired anyway.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_SWEEP_INTERVAL;
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, DocumentRepository, FileStore, WalletDb,
};

/// Summary of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_documents: Vec<String>,
    pub purged_tokens: usize,
}

/// Background sweeper for document expiry and stale token revocations.
pub struct ExpirySweeper {
    db: Arc<WalletDb>,
    files: Arc<FileStore>,
    sweep_interval: Duration,
}

impl ExpirySweeper {
    pub fn new(db: Arc<WalletDb>, files: Arc<FileStore>) -> Self {
        Self {
            db,
            files,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Document expiry sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Document expiry sweeper shutting down");
                return;
            }

            self.sweep_once();

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Document expiry sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep. Failures are logged and retried next interval.
    pub fn sweep_once(&self) -> SweepReport {
        let now = Utc::now();
        let mut report = SweepReport::default();

        match DocumentRepository::new(&self.db).expire_due(now) {
            Ok(expired) => {
                if !expired.is_empty() {
                    info!(count = expired.len(), "Expiry sweeper: documents expired");
                }
                let audit = AuditRepository::new(&self.files);
                for document_id in &expired {
                    audit.record(
                        AuditEvent::new(AuditEventType::DocumentExpired)
                            .with_resource("document", document_id.clone()),
                    );
                }
                report.expired_documents = expired;
            }
            Err(e) => warn!(error = %e, "Expiry sweeper: failed to expire documents"),
        }

        match self.db.purge_revoked_tokens(now.timestamp()) {
            Ok(purged) => {
                if purged > 0 {
                    debug!(count = purged, "Expiry sweeper: purged revoked tokens");
                }
                report.purged_tokens = purged;
            }
            Err(e) => warn!(error = %e, "Expiry sweeper: failed to purge revoked tokens"),
        }

        report
    }
}

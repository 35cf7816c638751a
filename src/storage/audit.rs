// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Account, money-movement and document lifecycle events are appended to a
//! daily JSONL file under the data directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::files::{FileError, FileResult, FileStore};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Account events
    CustomerRegistered,
    LoginSucceeded,
    LoginFailed,
    LoggedOut,

    // Money movement
    TransferCompleted,
    TransferRejected,
    RechargeOrderCreated,
    RechargeCaptured,
    RechargeVerificationFailed,

    // Document lifecycle
    DocumentUploaded,
    DocumentSent,
    DocumentSigned,
    DocumentDeleted,
    DocumentExpired,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Customer who triggered the event (if known).
    pub customer_id: Option<String>,
    /// Resource affected (transaction id, document id, ...).
    pub resource_id: Option<String>,
    /// Resource type (transaction, document, ...).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            customer_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    files: &'a FileStore,
}

impl<'a> AuditRepository<'a> {
    pub fn new(files: &'a FileStore) -> Self {
        Self { files }
    }

    /// Append an event to the log file of its day.
    pub fn log(&self, event: &AuditEvent) -> FileResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.files.paths().audit_events_file(&date);
        let line = serde_json::to_string(event)
            .map_err(|e| FileError::IntegrityViolation(format!("unserializable audit event: {e}")))?;
        self.files.append_line(&path, &line)
    }

    /// Log an event, reporting failures to tracing instead of the caller.
    pub fn record(&self, event: AuditEvent) {
        if let Err(error) = self.log(&event) {
            tracing::warn!(
                event_type = ?event.event_type,
                error = %error,
                "failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> FileResult<Vec<AuditEvent>> {
        let path = self.files.paths().audit_events_file(date);
        let content = self.files.read_raw(&path)?;
        let content = String::from_utf8(content)
            .map_err(|e| FileError::IntegrityViolation(format!("invalid UTF-8 in audit log: {e}")))?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    FileError::IntegrityViolation(format!("malformed audit event: {e}"))
                })
            })
            .collect()
    }

    /// Events of one customer on a given date.
    pub fn search_by_customer(&self, customer_id: &str, date: &str) -> FileResult<Vec<AuditEvent>> {
        Ok(self
            .read_events(date)?
            .into_iter()
            .filter(|e| e.customer_id.as_deref() == Some(customer_id))
            .collect())
    }
}

/// Helper macro for logging audit events.
#[macro_export]
macro_rules! audit_log {
    ($files:expr, $event_type:expr, $customer:expr) => {{
        let repo = $crate::storage::AuditRepository::new($files);
        repo.record($crate::storage::AuditEvent::new($event_type).with_customer(&$customer.id));
    }};
    ($files:expr, $event_type:expr, $customer:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($files);
        repo.record(
            $crate::storage::AuditEvent::new($event_type)
                .with_customer(&$customer.id)
                .with_resource($resource_type, $resource_id),
        );
    }};
}

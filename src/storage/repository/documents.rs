// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! e-Sign document records.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{load, save, StoreError, StoreResult, WalletDb, DOCUMENTS};

/// Lifecycle of a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Sent,
    Signed,
    Expired,
}

/// Signature box in page-relative fractions, origin at the bottom-left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SignatureCoordinates {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One signed artifact of a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SignedVersion {
    pub version: u32,
    pub file_name: String,
    pub signed_by: String,
    pub signer_name: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct StoredDocument {
    pub id: String,
    /// Display name chosen at upload.
    pub name: String,
    /// Original upload file name.
    pub file_name: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_email: String,
    pub recipient_email: Option<String>,
    pub message: Option<String>,
    pub status: DocumentStatus,
    pub file_size: u64,
    pub page_count: u32,
    pub uploaded_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub signed_by: Option<String>,
    pub signer_name: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signature_position: Option<String>,
    pub signature_coordinates: Option<SignatureCoordinates>,
    #[serde(default)]
    pub signed_versions: Vec<SignedVersion>,
}

impl StoredDocument {
    /// Whether the customer may see and act on this document.
    pub fn is_participant(&self, customer_id: &str, email: &str) -> bool {
        self.sender_id == customer_id
            || self
                .recipient_email
                .as_deref()
                .is_some_and(|recipient| recipient.eq_ignore_ascii_case(email))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == DocumentStatus::Expired
            || self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn latest_version(&self) -> Option<&SignedVersion> {
        self.signed_versions.last()
    }

    pub fn next_version_number(&self) -> u32 {
        self.latest_version().map_or(1, |v| v.version + 1)
    }
}

/// Repository for documents.
pub struct DocumentRepository<'a> {
    db: &'a WalletDb,
}

impl<'a> DocumentRepository<'a> {
    pub fn new(db: &'a WalletDb) -> Self {
        Self { db }
    }

    pub fn create(&self, document: &StoredDocument) -> StoreResult<()> {
        self.db.write(|txn| {
            let mut table = txn.open_table(DOCUMENTS)?;
            if table.get(document.id.as_str())?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "document {} already exists",
                    document.id
                )));
            }
            save(&mut table, &document.id, document)
        })
    }

    pub fn get(&self, document_id: &str) -> StoreResult<Option<StoredDocument>> {
        self.db.read(|txn| {
            let table = txn.open_table(DOCUMENTS)?;
            load(&table, document_id)
        })
    }

    /// Re-read a document inside one write transaction, apply `change` and
    /// store the result.
    ///
    /// `change` sees the committed record, so checks it makes cannot be
    /// invalidated by a concurrent writer. An error from `change` aborts
    /// without writing.
    pub fn modify(
        &self,
        document_id: &str,
        change: impl FnOnce(&mut StoredDocument) -> StoreResult<()>,
    ) -> StoreResult<StoredDocument> {
        self.db.write(|txn| {
            let mut table = txn.open_table(DOCUMENTS)?;
            let mut document: StoredDocument = load(&table, document_id)?
                .ok_or_else(|| StoreError::NotFound(format!("document {document_id}")))?;
            change(&mut document)?;
            save(&mut table, document_id, &document)?;
            Ok(document)
        })
    }

    pub fn delete(&self, document_id: &str) -> StoreResult<()> {
        self.db.write(|txn| {
            let mut table = txn.open_table(DOCUMENTS)?;
            let removed = table.remove(document_id)?.is_some();
            if removed {
                Ok(())
            } else {
                Err(StoreError::NotFound(format!("document {document_id}")))
            }
        })
    }

    /// Documents the customer sent or received, newest upload first.
    pub fn list_for_participant(
        &self,
        customer_id: &str,
        email: &str,
    ) -> StoreResult<Vec<StoredDocument>> {
        let mut documents = self.db.read(|txn| {
            let table = txn.open_table(DOCUMENTS)?;
            let mut documents = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let document: StoredDocument = serde_json::from_slice(value.value())?;
                if document.is_participant(customer_id, email) {
                    documents.push(document);
                }
            }
            Ok(documents)
        })?;
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }

    /// Mark every `sent` document past its expiry as `expired`.
    ///
    /// Returns the ids that changed.
    pub fn expire_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<String>> {
        self.db.write(|txn| {
            let mut table = txn.open_table(DOCUMENTS)?;
            let mut due = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let document: StoredDocument = serde_json::from_slice(value.value())?;
                if document.status == DocumentStatus::Sent
                    && document.expires_at.is_some_and(|expires_at| expires_at <= now)
                {
                    due.push(document);
                }
            }

            let mut expired = Vec::with_capacity(due.len());
            for mut document in due {
                document.status = DocumentStatus::Expired;
                save(&mut table, &document.id, &document)?;
                expired.push(document.id);
            }
            Ok(expired)
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_document(id: &str, sender_id: &str) -> StoredDocument {
    StoredDocument {
        id: id.to_string(),
        name: "Lease".to_string(),
        file_name: "lease.pdf".to_string(),
        sender_id: sender_id.to_string(),
        sender_name: "Sender Person".to_string(),
        sender_email: "sender@example.com".to_string(),
        recipient_email: None,
        message: None,
        status: DocumentStatus::Pending,
        file_size: 1024,
        page_count: 1,
        uploaded_at: Utc::now(),
        sent_at: None,
        expires_at: None,
        signed_by: None,
        signer_name: None,
        signed_at: None,
        signature_position: None,
        signature_coordinates: None,
        signed_versions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_db;
    use chrono::Duration;

    #[test]
    fn create_get_modify_delete() {
        let (db, _dir) = temp_db();
        let repo = DocumentRepository::new(&db);
        let document = sample_document("doc_1", "cus_sender");

        repo.create(&document).unwrap();
        assert!(matches!(repo.create(&document), Err(StoreError::Conflict(_))));
        assert_eq!(repo.get("doc_1").unwrap().unwrap(), document);

        let updated = repo
            .modify("doc_1", |doc| {
                doc.status = DocumentStatus::Sent;
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.status, DocumentStatus::Sent);
        assert_eq!(
            repo.get("doc_1").unwrap().unwrap().status,
            DocumentStatus::Sent
        );
        assert!(matches!(
            repo.modify("doc_missing", |_| Ok(())),
            Err(StoreError::NotFound(_))
        ));

        repo.delete("doc_1").unwrap();
        assert!(repo.get("doc_1").unwrap().is_none());
        assert!(matches!(repo.delete("doc_1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn participants_see_sent_and_received_documents() {
        let (db, _dir) = temp_db();
        let repo = DocumentRepository::new(&db);

        let mut received = sample_document("doc_in", "cus_other");
        received.recipient_email = Some("Me@Example.com".to_string());
        repo.create(&received).unwrap();
        repo.create(&sample_document("doc_out", "cus_me")).unwrap();
        repo.create(&sample_document("doc_unrelated", "cus_other")).unwrap();

        let listed = repo.list_for_participant("cus_me", "me@example.com").unwrap();
        let mut ids: Vec<_> = listed.iter().map(|d| d.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["doc_in", "doc_out"]);
    }

    #[test]
    fn expire_due_only_touches_overdue_sent_documents() {
        let (db, _dir) = temp_db();
        let repo = DocumentRepository::new(&db);
        let now = Utc::now();

        let mut overdue = sample_document("doc_overdue", "cus_1");
        overdue.status = DocumentStatus::Sent;
        overdue.expires_at = Some(now - Duration::days(1));
        repo.create(&overdue).unwrap();

        let mut fresh = sample_document("doc_fresh", "cus_1");
        fresh.status = DocumentStatus::Sent;
        fresh.expires_at = Some(now + Duration::days(1));
        repo.create(&fresh).unwrap();

        let mut signed = sample_document("doc_signed", "cus_1");
        signed.status = DocumentStatus::Signed;
        signed.expires_at = Some(now - Duration::days(1));
        repo.create(&signed).unwrap();

        let expired = repo.expire_due(now).unwrap();
        assert_eq!(expired, vec!["doc_overdue".to_string()]);
        assert_eq!(
            repo.get("doc_overdue").unwrap().unwrap().status,
            DocumentStatus::Expired
        );
        assert_eq!(
            repo.get("doc_signed").unwrap().unwrap().status,
            DocumentStatus::Signed
        );
    }

    #[test]
    fn rejected_modify_leaves_record_untouched() {
        let (db, _dir) = temp_db();
        let repo = DocumentRepository::new(&db);
        repo.create(&sample_document("doc_1", "cus_sender")).unwrap();

        let result = repo.modify("doc_1", |doc| {
            doc.status = DocumentStatus::Signed;
            Err(StoreError::InvalidState("nope".to_string()))
        });
        assert!(matches!(result, Err(StoreError::InvalidState(_))));
        assert_eq!(
            repo.get("doc_1").unwrap().unwrap().status,
            DocumentStatus::Pending
        );
    }

    #[test]
    fn version_numbers_increase() {
        let mut document = sample_document("doc_v", "cus_1");
        assert_eq!(document.next_version_number(), 1);
        document.signed_versions.push(SignedVersion {
            version: 1,
            file_name: "lease_signed_v1_1.pdf".to_string(),
            signed_by: "a@example.com".to_string(),
            signer_name: "A".to_string(),
            signed_at: Utc::now(),
        });
        assert_eq!(document.next_version_number(), 2);
    }
}

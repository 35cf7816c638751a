// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the on-disk data layout.

use std::path::{Path, PathBuf};

/// Default base directory for all persistent data.
pub const DATA_ROOT: &str = "/data";

/// File name of the embedded database inside the data root.
const DATABASE_FILE: &str = "wallet.redb";

/// File name of an uploaded document inside its directory.
const ORIGINAL_DOCUMENT_FILE: &str = "original.pdf";

/// Storage path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the redb database file.
    pub fn database_file(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    // ========== Document Paths ==========

    /// Directory containing all uploaded documents.
    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    /// Directory for one document: the original plus every signed version.
    pub fn document_dir(&self, document_id: &str) -> PathBuf {
        self.documents_dir().join(document_id)
    }

    /// Path to the original uploaded PDF.
    pub fn document_original(&self, document_id: &str) -> PathBuf {
        self.document_dir(document_id).join(ORIGINAL_DOCUMENT_FILE)
    }

    /// Path to a signed artifact of a document.
    pub fn document_version(&self, document_id: &str, file_name: &str) -> PathBuf {
        self.document_dir(document_id).join(file_name)
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
        assert_eq!(paths.database_file(), PathBuf::from("/data/wallet.redb"));
    }

    #[test]
    fn document_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(
            paths.document_dir("doc_1"),
            PathBuf::from("/tmp/test-data/documents/doc_1")
        );
        assert_eq!(
            paths.document_original("doc_1"),
            PathBuf::from("/tmp/test-data/documents/doc_1/original.pdf")
        );
        assert_eq!(
            paths.document_version("doc_1", "lease_signed_v1_1700000000000.pdf"),
            PathBuf::from("/tmp/test-data/documents/doc_1/lease_signed_v1_1700000000000.pdf")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-01-28"),
            PathBuf::from("/data/audit/2026-01-28/events.jsonl")
        );
    }
}

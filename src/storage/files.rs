// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File storage for uploaded documents, signed artifacts and audit logs.
//!
//! Signed artifacts are created with `create_new`, so an existing file is
//! never overwritten. Everything else is written to a temp file and renamed
//! into place.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use super::StoragePaths;

/// Error type for file storage operations.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("File storage not initialized")]
    NotInitialized,

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
}

impl From<io::Error> for FileError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => FileError::NotFound(e.to_string()),
            io::ErrorKind::AlreadyExists => FileError::AlreadyExists(e.to_string()),
            _ => FileError::Io(e),
        }
    }
}

/// Result type for file storage operations.
pub type FileResult<T> = Result<T, FileError>;

/// File storage rooted at the data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StoragePaths,
    initialized: bool,
}

impl FileStore {
    /// Create a new FileStore. Call `initialize()` before use.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the directory structure. Safe to call multiple times.
    pub fn initialize(&mut self) -> FileResult<()> {
        for dir in [self.paths.documents_dir(), self.paths.audit_dir()] {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Write-read-delete probe of the data directory.
    pub fn health_check(&self) -> FileResult<()> {
        self.ensure_initialized()?;

        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(FileError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if a file exists.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Create a new file with the given bytes; fails if the path exists.
    pub fn write_new(&self, path: impl AsRef<Path>, data: &[u8]) -> FileResult<()> {
        self.ensure_initialized()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Write raw bytes (atomic write via rename).
    pub fn write_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> FileResult<()> {
        self.ensure_initialized()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.flush()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Append one line to a file, creating it if missing.
    pub fn append_line(&self, path: impl AsRef<Path>, line: &str) -> FileResult<()> {
        self.ensure_initialized()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Read raw bytes from a file.
    pub fn read_raw(&self, path: impl AsRef<Path>) -> FileResult<Vec<u8>> {
        self.ensure_initialized()?;
        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Delete a file.
    pub fn delete(&self, path: impl AsRef<Path>) -> FileResult<()> {
        self.ensure_initialized()?;
        fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// Delete a directory and all its contents.
    pub fn delete_dir(&self, path: impl AsRef<Path>) -> FileResult<()> {
        self.ensure_initialized()?;
        fs::remove_dir_all(path.as_ref())?;
        Ok(())
    }

    fn ensure_initialized(&self) -> FileResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(FileError::NotInitialized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(StoragePaths::new(temp.path()));
        store.initialize().unwrap();
        (store, temp)
    }

    #[test]
    fn initialize_creates_directories() {
        let (store, _temp) = test_store();
        assert!(store.paths().documents_dir().is_dir());
        assert!(store.paths().audit_dir().is_dir());
    }

    #[test]
    fn write_new_refuses_to_overwrite() {
        let (store, _temp) = test_store();
        let path = store.paths().document_original("doc_1");

        store.write_new(&path, b"first").unwrap();
        let second = store.write_new(&path, b"second");
        assert!(matches!(second, Err(FileError::AlreadyExists(_))));
        assert_eq!(store.read_raw(&path).unwrap(), b"first");
    }

    #[test]
    fn write_and_read_raw() {
        let (store, _temp) = test_store();
        let data = b"raw bytes: \x00\x01\x02";
        let path = store.paths().root().join("blob.bin");

        store.write_raw(&path, data).unwrap();
        assert_eq!(store.read_raw(&path).unwrap(), data);
    }

    #[test]
    fn append_line_accumulates() {
        let (store, _temp) = test_store();
        let path = store.paths().audit_events_file("2026-01-01");

        store.append_line(&path, "one").unwrap();
        store.append_line(&path, "two").unwrap();
        assert_eq!(store.read_raw(&path).unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn delete_dir_removes_recursively() {
        let (store, _temp) = test_store();
        let dir = store.paths().document_dir("doc_2");
        store
            .write_new(store.paths().document_original("doc_2"), b"%PDF")
            .unwrap();

        assert!(dir.exists());
        store.delete_dir(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn health_check_works() {
        let (store, _temp) = test_store();
        store.health_check().expect("health check should pass");
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let (store, _temp) = test_store();
        let result = store.read_raw(store.paths().root().join("missing.pdf"));
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[test]
    fn uninitialized_store_returns_error() {
        let store = FileStore::new(StoragePaths::new("/tmp/never-init"));
        let result = store.read_raw("/tmp/any.pdf");
        assert!(matches!(result, Err(FileError::NotInitialized)));
    }
}

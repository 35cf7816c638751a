// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthConfig;
use crate::providers::PaymentGateway;
use crate::storage::{FileStore, HistoryCache, KeyedLocks, WalletDb};

/// Customers whose first history page is cached.
const HISTORY_CACHE_CAPACITY: usize = 1_000;
const HISTORY_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<WalletDb>,
    pub files: Arc<FileStore>,
    pub auth: Arc<AuthConfig>,
    /// `None` when no gateway credentials are configured.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub history_cache: Arc<HistoryCache>,
    /// Serializes signings of the same document.
    pub document_locks: Arc<KeyedLocks>,
}

impl AppState {
    pub fn new(db: WalletDb, files: FileStore, auth: AuthConfig) -> Self {
        Self {
            db: Arc::new(db),
            files: Arc::new(files),
            auth: Arc::new(auth),
            gateway: None,
            history_cache: Arc::new(HistoryCache::new(HISTORY_CACHE_CAPACITY, HISTORY_CACHE_TTL)),
            document_locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn with_payment_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }
}

/// State over a fresh temporary data directory.
#[cfg(test)]
pub(crate) fn test_state() -> (AppState, tempfile::TempDir) {
    use crate::auth::tokens::DEFAULT_TOKEN_TTL;
    use crate::storage::StoragePaths;

    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let paths = StoragePaths::new(temp_dir.path());
    let db = WalletDb::open(&paths.database_file()).expect("Failed to open database");
    let mut files = FileStore::new(paths);
    files.initialize().expect("Failed to initialize storage");
    let auth = AuthConfig::new(b"test-secret-test-secret-test-secret", DEFAULT_TOKEN_TTL);
    (AppState::new(db, files, auth), temp_dir)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded wallet database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `customers`: customer_id → serialized StoredCustomer
//! - `customer_emails`: lowercase email → customer_id
//! - `cards`: card_id → serialized StoredCard
//! - `transactions`: transaction_id → serialized StoredTransaction
//! - `customer_tx_index`: composite key (customer|!sequence|txn_id) → direction
//! - `recharge_orders`: gateway order_id → serialized StoredRechargeOrder
//! - `recharge_payments`: gateway payment_id → serialized StoredRechargePayment
//! - `customer_payment_index`: composite key (customer|!sequence|payment_id) → payment_id
//! - `documents`: document_id → serialized StoredDocument
//! - `revoked_tokens`: token jti → expiry (unix seconds)
//! - `sequences`: index name → last ordinal handed out
//!
//! Every multi-record change (a transfer, a capture) runs inside one write
//! transaction: either all tables change or none do.

use std::path::Path;

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, Table, TableDefinition,
    WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::auth::tokens::CLOCK_SKEW_LEEWAY;

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const CUSTOMERS: TableDefinition<&str, &[u8]> = TableDefinition::new("customers");

pub(crate) const CUSTOMER_EMAILS: TableDefinition<&str, &str> =
    TableDefinition::new("customer_emails");

pub(crate) const CARDS: TableDefinition<&str, &[u8]> = TableDefinition::new("cards");

pub(crate) const TRANSACTIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("transactions");

/// Key format: `customer_id|!sequence_be|txn_id` for newest-first range scans.
pub(crate) const CUSTOMER_TX_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("customer_tx_index");

pub(crate) const RECHARGE_ORDERS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("recharge_orders");

pub(crate) const RECHARGE_PAYMENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("recharge_payments");

pub(crate) const CUSTOMER_PAYMENT_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("customer_payment_index");

pub(crate) const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

pub(crate) const REVOKED_TOKENS: TableDefinition<&str, i64> =
    TableDefinition::new("revoked_tokens");

/// Monotonic counters ordering the per-customer index tables.
pub(crate) const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The record exists but its current state forbids the change.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("balance overflow")]
    BalanceOverflow,
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for a per-customer index table.
///
/// Format: `owner | inverted_ordinal_be_bytes | record_id`
///
/// `ordinal` comes from [`next_sequence`], so a forward scan yields records
/// newest first even when several commit within the same clock tick.
pub(crate) fn make_index_key(owner: &str, ordinal: u64, record_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.len() + 1 + 8 + 1 + record_id.len());
    key.extend_from_slice(owner.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!ordinal).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(record_id.as_bytes());
    key
}

/// Lower bound for a range scan over one owner's index entries.
pub(crate) fn make_prefix(owner: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(owner.len() + 1);
    prefix.extend_from_slice(owner.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a range scan (prefix with 0xFF bytes appended).
pub(crate) fn make_prefix_end(owner: &str) -> Vec<u8> {
    let mut end = make_prefix(owner);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

/// Extract the record id portion from a composite index key.
pub(crate) fn record_id_from_key(key: &[u8]) -> Option<String> {
    // The ordinal bytes may contain b'|', so skip them by length.
    let owner_end = key.iter().position(|&b| b == b'|')?;
    let id_start = owner_end + 1 + 8 + 1;
    if key.len() <= id_start {
        return None;
    }
    String::from_utf8(key[id_start..].to_vec()).ok()
}

/// Hand out the next ordinal of a named sequence.
///
/// Write transactions are serialized, so ordinals follow commit order.
pub(crate) fn next_sequence(txn: &WriteTransaction, name: &str) -> StoreResult<u64> {
    let mut table = txn.open_table(SEQUENCES)?;
    let current = table.get(name)?.map(|value| value.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(name, next)?;
    Ok(next)
}

// =============================================================================
// Record Helpers
// =============================================================================

/// Read and deserialize one JSON record.
pub(crate) fn load<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StoreResult<Option<T>> {
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Serialize and write one JSON record.
pub(crate) fn save<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let json = serde_json::to_vec(value)?;
    table.insert(key, json.as_slice())?;
    Ok(())
}

// =============================================================================
// WalletDb
// =============================================================================

/// Embedded ACID database holding every wallet record.
pub struct WalletDb {
    db: Database,
}

impl WalletDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CUSTOMERS)?;
            let _ = write_txn.open_table(CUSTOMER_EMAILS)?;
            let _ = write_txn.open_table(CARDS)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(CUSTOMER_TX_INDEX)?;
            let _ = write_txn.open_table(RECHARGE_ORDERS)?;
            let _ = write_txn.open_table(RECHARGE_PAYMENTS)?;
            let _ = write_txn.open_table(CUSTOMER_PAYMENT_INDEX)?;
            let _ = write_txn.open_table(DOCUMENTS)?;
            let _ = write_txn.open_table(REVOKED_TOKENS)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Run `apply` inside one write transaction.
    ///
    /// Commits when `apply` succeeds and aborts otherwise, so a failed
    /// operation leaves no partial writes behind.
    pub fn write<T>(
        &self,
        apply: impl FnOnce(&WriteTransaction) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let write_txn = self.db.begin_write()?;
        match apply(&write_txn) {
            Ok(value) => {
                write_txn.commit()?;
                Ok(value)
            }
            Err(error) => {
                if let Err(abort_error) = write_txn.abort() {
                    tracing::warn!(error = %abort_error, "failed to abort write transaction");
                }
                Err(error)
            }
        }
    }

    /// Run `view` against a consistent read snapshot.
    pub fn read<T>(&self, view: impl FnOnce(&ReadTransaction) -> StoreResult<T>) -> StoreResult<T> {
        let read_txn = self.db.begin_read()?;
        view(&read_txn)
    }

    /// Confirm the database answers a read transaction.
    pub fn health_check(&self) -> StoreResult<()> {
        self.read(|txn| {
            let _ = txn.open_table(CUSTOMERS)?;
            Ok(())
        })
    }

    // =========================================================================
    // Token revocation
    // =========================================================================

    /// Revoke a token id until its natural expiry.
    pub fn revoke_token(&self, jti: &str, expires_at: i64) -> StoreResult<()> {
        self.write(|txn| {
            let mut table = txn.open_table(REVOKED_TOKENS)?;
            table.insert(jti, expires_at)?;
            Ok(())
        })
    }

    pub fn is_token_revoked(&self, jti: &str) -> StoreResult<bool> {
        self.read(|txn| {
            let table = txn.open_table(REVOKED_TOKENS)?;
            let revoked = table.get(jti)?.is_some();
            Ok(revoked)
        })
    }

    /// Drop revocations for tokens that verification would reject anyway.
    ///
    /// A token stays verifiable for [`CLOCK_SKEW_LEEWAY`] seconds past its
    /// expiry, so its revocation is kept at least that long. Returns the
    /// count removed.
    pub fn purge_revoked_tokens(&self, now: i64) -> StoreResult<usize> {
        let leeway = i64::try_from(CLOCK_SKEW_LEEWAY).unwrap_or(i64::MAX);
        self.write(|txn| {
            let mut table = txn.open_table(REVOKED_TOKENS)?;
            let mut expired = Vec::new();
            for entry in table.iter()? {
                let (jti, expires_at) = entry?;
                if expires_at.value().saturating_add(leeway) < now {
                    expired.push(jti.value().to_string());
                }
            }
            for jti in &expired {
                table.remove(jti.as_str())?;
            }
            Ok(expired.len())
        })
    }
}

/// Fresh database in a temporary directory, for tests across the crate.
#[cfg(test)]
pub(crate) fn temp_db() -> (WalletDb, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = WalletDb::open(&dir.path().join("test.redb")).unwrap();
    (db, dir)
}

// =============================================================================
// Tests
// =============================================================================

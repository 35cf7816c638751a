// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives under `DATA_DIR`:
//!
//! ```text
//! $DATA_DIR/
//!   wallet.redb                 # customers, cards, transfers, recharges,
//!                               # documents, revoked tokens (ACID)
//!   documents/{document_id}/
//!     original.pdf              # uploaded file, never modified
//!     {stem}_signed_v{N}_{ms}.pdf  # one file per signing
//!   audit/
//!     {date}/events.jsonl       # daily audit logs
//! ```
//!
//! Balances only change inside redb write transactions. PDF files are
//! write-once.

pub mod audit;
pub mod database;
pub mod files;
pub mod history_cache;
pub mod keyed_locks;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use database::{StoreError, StoreResult, WalletDb};
pub use files::{FileError, FileResult, FileStore};
pub use history_cache::HistoryCache;
pub use keyed_locks::KeyedLocks;
pub use paths::StoragePaths;
pub use repository::{
    CaptureOutcome, CustomerRepository, Direction, DocumentRepository, DocumentStatus,
    HistoryPage, NewCustomer, OrderStatus, PaymentRepository, PaymentStatus, SignatureCoordinates,
    SignedVersion, StoredCard, StoredCustomer, StoredDocument, StoredRechargeOrder,
    StoredRechargePayment, StoredTransaction, TransactionRepository, TransferReceipt,
    TransferStatus,
};

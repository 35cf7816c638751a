// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer over the embedded database.

pub mod customers;
pub mod documents;
pub mod payments;
pub mod transactions;

pub use customers::{CustomerRepository, NewCustomer, StoredCard, StoredCustomer};
pub use documents::{
    DocumentRepository, DocumentStatus, SignatureCoordinates, SignedVersion, StoredDocument,
};
pub use payments::{
    CaptureOutcome, OrderStatus, PaymentRepository, PaymentStatus, StoredRechargeOrder,
    StoredRechargePayment,
};
pub use transactions::{
    Direction, HistoryPage, StoredTransaction, TransactionRepository, TransferReceipt,
    TransferStatus,
};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Peer-to-peer transfer records and the atomic transfer itself.

use chrono::{DateTime, Utc};
use redb::{ReadTransaction, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{new_uid, Money};
use crate::storage::database::{
    load, make_index_key, make_prefix, make_prefix_end, next_sequence, record_id_from_key, save,
    StoreError, StoreResult, WalletDb, CUSTOMERS, CUSTOMER_TX_INDEX, TRANSACTIONS,
};
use crate::storage::repository::customers::StoredCustomer;

const TX_INDEX_SEQUENCE: &str = "customer_tx_index";

/// Outcome recorded on a transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Captured,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Captured => "captured",
            TransferStatus::Failed => "failed",
        }
    }
}

/// Which side of a transfer a customer was on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "debit",
            Direction::Credit => "credit",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "debit" => Some(Direction::Debit),
            "credit" => Some(Direction::Credit),
            _ => None,
        }
    }
}

/// A completed transfer between two customers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredTransaction {
    pub id: String,
    pub source_id: String,
    pub destination_id: String,
    pub amount: Money,
    pub description: Option<String>,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

impl StoredTransaction {
    /// The other party of this transfer, seen from `customer_id`.
    pub fn counterparty_of(&self, customer_id: &str) -> &str {
        if self.source_id == customer_id {
            &self.destination_id
        } else {
            &self.source_id
        }
    }
}

/// Result of a committed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub transaction: StoredTransaction,
    pub source_balance: Money,
    pub destination_balance: Money,
}

/// One page of a customer's history, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub items: Vec<(StoredTransaction, Direction)>,
    pub total: usize,
}

/// Repository for transfers.
pub struct TransactionRepository<'a> {
    db: &'a WalletDb,
}

impl<'a> TransactionRepository<'a> {
    pub fn new(db: &'a WalletDb) -> Self {
        Self { db }
    }

    /// Move `amount` from `source_id` to `destination_id`.
    ///
    /// Both balances are re-read inside the write transaction. The debit, the
    /// credit, the transaction record and both index entries commit together,
    /// or nothing is written.
    pub fn transfer(
        &self,
        source_id: &str,
        destination_id: &str,
        amount: Money,
        description: Option<String>,
    ) -> StoreResult<TransferReceipt> {
        if source_id == destination_id {
            return Err(StoreError::Conflict(
                "source and destination are the same account".to_string(),
            ));
        }

        let now = Utc::now();
        let transaction = StoredTransaction {
            id: new_uid("txn"),
            source_id: source_id.to_string(),
            destination_id: destination_id.to_string(),
            amount,
            description,
            status: TransferStatus::Captured,
            created_at: now,
        };

        self.db.write(|txn| {
            let mut customers = txn.open_table(CUSTOMERS)?;

            let mut source: StoredCustomer = load(&customers, source_id)?
                .ok_or_else(|| StoreError::NotFound(format!("customer {source_id}")))?;
            let mut destination: StoredCustomer = load(&customers, destination_id)?
                .ok_or_else(|| StoreError::NotFound(format!("customer {destination_id}")))?;

            if source.balance < amount {
                return Err(StoreError::InsufficientFunds);
            }
            source.balance = source
                .balance
                .checked_sub(amount)
                .ok_or(StoreError::BalanceOverflow)?;
            destination.balance = destination
                .balance
                .checked_add(amount)
                .ok_or(StoreError::BalanceOverflow)?;
            source.updated_at = now;
            destination.updated_at = now;

            save(&mut customers, &source.id, &source)?;
            save(&mut customers, &destination.id, &destination)?;

            let mut transactions = txn.open_table(TRANSACTIONS)?;
            save(&mut transactions, &transaction.id, &transaction)?;

            let ordinal = next_sequence(txn, TX_INDEX_SEQUENCE)?;
            let mut index = txn.open_table(CUSTOMER_TX_INDEX)?;
            let debit_key = make_index_key(source_id, ordinal, &transaction.id);
            index.insert(debit_key.as_slice(), Direction::Debit.as_str())?;
            let credit_key = make_index_key(destination_id, ordinal, &transaction.id);
            index.insert(credit_key.as_slice(), Direction::Credit.as_str())?;

            Ok(TransferReceipt {
                transaction: transaction.clone(),
                source_balance: source.balance,
                destination_balance: destination.balance,
            })
        })
    }

    pub fn get(&self, transaction_id: &str) -> StoreResult<Option<StoredTransaction>> {
        self.db.read(|txn| {
            let table = txn.open_table(TRANSACTIONS)?;
            load(&table, transaction_id)
        })
    }

    /// A slice of a customer's history, newest first, plus the total count.
    pub fn list_for_customer(
        &self,
        customer_id: &str,
        offset: usize,
        limit: usize,
    ) -> StoreResult<HistoryPage> {
        self.db
            .read(|txn| scan_history(txn, customer_id, offset, Some(limit)))
    }

    /// The full history of a customer, newest first.
    pub fn all_for_customer(&self, customer_id: &str) -> StoreResult<Vec<(StoredTransaction, Direction)>> {
        let page = self.db.read(|txn| scan_history(txn, customer_id, 0, None))?;
        Ok(page.items)
    }
}

fn scan_history(
    txn: &ReadTransaction,
    customer_id: &str,
    offset: usize,
    limit: Option<usize>,
) -> StoreResult<HistoryPage> {
    let index = txn.open_table(CUSTOMER_TX_INDEX)?;
    let transactions = txn.open_table(TRANSACTIONS)?;

    let prefix = make_prefix(customer_id);
    let prefix_end = make_prefix_end(customer_id);

    let mut items = Vec::new();
    let mut total = 0usize;

    for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
        let (key, direction) = entry?;
        let position = total;
        total += 1;

        if position < offset || limit.is_some_and(|limit| items.len() >= limit) {
            continue;
        }

        let Some(direction) = Direction::parse(direction.value()) else {
            continue;
        };
        let Some(transaction_id) = record_id_from_key(key.value()) else {
            continue;
        };
        if let Some(transaction) = load::<StoredTransaction>(&transactions, &transaction_id)? {
            items.push((transaction, direction));
        }
    }

    Ok(HistoryPage { items, total })
}

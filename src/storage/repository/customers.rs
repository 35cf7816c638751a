// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Customer and card records.

use chrono::{DateTime, Utc};
use rand::Rng;
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use crate::models::{new_uid, Money};
use crate::storage::database::{
    load, save, StoreError, StoreResult, WalletDb, CARDS, CUSTOMERS, CUSTOMER_EMAILS,
};

/// Digits in a generated card number.
const CARD_NUMBER_LEN: usize = 16;

/// A customer account with its spendable balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCustomer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Lowercased; unique across customers.
    pub email: String,
    /// Argon2 PHC string. Never leaves the server.
    pub password_hash: String,
    pub balance: Money,
    pub card_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredCustomer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Virtual card issued with every account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCard {
    pub id: String,
    pub number: String,
    pub customer_id: String,
    pub created_at: DateTime<Utc>,
}

impl StoredCard {
    /// Card number with all but the last four digits hidden.
    pub fn masked_number(&self) -> String {
        let visible = self.number.len().saturating_sub(4);
        format!("{}{}", "*".repeat(visible), &self.number[visible..])
    }
}

/// Input for a new account; ids, card and timestamps are generated.
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

fn generate_card_number() -> String {
    let mut rng = rand::thread_rng();
    // Leading digit is never zero so the number keeps its full width.
    let mut number = String::with_capacity(CARD_NUMBER_LEN);
    number.push(char::from(b'1' + rng.gen_range(0..9u8)));
    for _ in 1..CARD_NUMBER_LEN {
        number.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    number
}

/// Repository for customer accounts.
pub struct CustomerRepository<'a> {
    db: &'a WalletDb,
}

impl<'a> CustomerRepository<'a> {
    pub fn new(db: &'a WalletDb) -> Self {
        Self { db }
    }

    /// Create a customer and its card in one write transaction.
    ///
    /// Fails with `Conflict` if the email is already registered.
    pub fn create(&self, input: NewCustomer) -> StoreResult<(StoredCustomer, StoredCard)> {
        let now = Utc::now();
        let customer_id = new_uid("cus");
        let card = StoredCard {
            id: new_uid("card"),
            number: generate_card_number(),
            customer_id: customer_id.clone(),
            created_at: now,
        };
        let customer = StoredCustomer {
            id: customer_id,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email.trim().to_lowercase(),
            password_hash: input.password_hash,
            balance: Money::ZERO,
            card_id: card.id.clone(),
            created_at: now,
            updated_at: now,
        };

        self.db.write(|txn| {
            let mut emails = txn.open_table(CUSTOMER_EMAILS)?;
            if emails.get(customer.email.as_str())?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "email {} is already registered",
                    customer.email
                )));
            }
            emails.insert(customer.email.as_str(), customer.id.as_str())?;

            let mut customers = txn.open_table(CUSTOMERS)?;
            save(&mut customers, &customer.id, &customer)?;

            let mut cards = txn.open_table(CARDS)?;
            save(&mut cards, &card.id, &card)?;
            Ok(())
        })?;

        Ok((customer, card))
    }

    pub fn get(&self, customer_id: &str) -> StoreResult<Option<StoredCustomer>> {
        self.db.read(|txn| {
            let table = txn.open_table(CUSTOMERS)?;
            load(&table, customer_id)
        })
    }

    pub fn get_by_email(&self, email: &str) -> StoreResult<Option<StoredCustomer>> {
        let email = email.trim().to_lowercase();
        self.db.read(|txn| {
            let emails = txn.open_table(CUSTOMER_EMAILS)?;
            let customer_id = match emails.get(email.as_str())? {
                Some(id) => id.value().to_string(),
                None => return Ok(None),
            };
            let customers = txn.open_table(CUSTOMERS)?;
            load(&customers, &customer_id)
        })
    }

    pub fn get_card(&self, card_id: &str) -> StoreResult<Option<StoredCard>> {
        self.db.read(|txn| {
            let table = txn.open_table(CARDS)?;
            load(&table, card_id)
        })
    }

    /// Customers whose name or email contains `keyword` (case-insensitive).
    pub fn search(
        &self,
        keyword: &str,
        exclude_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<StoredCustomer>> {
        let needle = keyword.trim().to_lowercase();
        self.db.read(|txn| {
            let table = txn.open_table(CUSTOMERS)?;
            let mut matches = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let customer: StoredCustomer = serde_json::from_slice(value.value())?;
                if customer.id == exclude_id {
                    continue;
                }
                let haystack = format!("{} {}", customer.full_name(), customer.email).to_lowercase();
                if haystack.contains(&needle) {
                    matches.push(customer);
                    if matches.len() >= limit {
                        break;
                    }
                }
            }
            Ok(matches)
        })
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recharge orders and captured gateway payments.

use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Money;
use crate::storage::database::{
    load, make_index_key, make_prefix, make_prefix_end, next_sequence, save, StoreError,
    StoreResult, WalletDb, CUSTOMERS, CUSTOMER_PAYMENT_INDEX, RECHARGE_ORDERS, RECHARGE_PAYMENTS,
};
use crate::storage::repository::customers::StoredCustomer;

const PAYMENT_INDEX_SEQUENCE: &str = "customer_payment_index";

/// Index a payment id the first time it is recorded.
///
/// Later writes for the same payment reuse that entry, so history lists each
/// payment once.
fn index_new_payment(
    txn: &WriteTransaction,
    customer_id: &str,
    payment_id: &str,
) -> StoreResult<()> {
    let ordinal = next_sequence(txn, PAYMENT_INDEX_SEQUENCE)?;
    let mut index = txn.open_table(CUSTOMER_PAYMENT_INDEX)?;
    let key = make_index_key(customer_id, ordinal, payment_id);
    index.insert(key.as_slice(), payment_id)?;
    Ok(())
}

/// A payment id already stored under another order cannot be reused.
fn ensure_same_order(existing: &StoredRechargePayment, order_id: &str) -> StoreResult<()> {
    if existing.order_id == order_id {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "payment {} belongs to another order",
            existing.id
        )))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Captured,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Captured,
    Failed,
}

/// A gateway order created for a recharge, keyed by the gateway's order id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRechargeOrder {
    pub id: String,
    pub customer_id: String,
    pub amount: Money,
    pub currency: String,
    pub receipt: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A payment reported back by the gateway, keyed by the gateway's payment id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRechargePayment {
    pub id: String,
    pub order_id: String,
    pub customer_id: String,
    pub amount: Money,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// What a capture call did.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// The balance was credited by this call.
    Captured {
        payment: StoredRechargePayment,
        balance: Money,
    },
    /// The payment had been captured before; nothing changed.
    AlreadyCaptured {
        payment: StoredRechargePayment,
        balance: Money,
    },
}

/// Repository for recharge orders and payments.
pub struct PaymentRepository<'a> {
    db: &'a WalletDb,
}

impl<'a> PaymentRepository<'a> {
    pub fn new(db: &'a WalletDb) -> Self {
        Self { db }
    }

    pub fn create_order(&self, order: &StoredRechargeOrder) -> StoreResult<()> {
        self.db.write(|txn| {
            let mut orders = txn.open_table(RECHARGE_ORDERS)?;
            if orders.get(order.id.as_str())?.is_some() {
                return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
            }
            save(&mut orders, &order.id, order)
        })
    }

    pub fn get_order(&self, order_id: &str) -> StoreResult<Option<StoredRechargeOrder>> {
        self.db.read(|txn| {
            let table = txn.open_table(RECHARGE_ORDERS)?;
            load(&table, order_id)
        })
    }

    pub fn get_payment(&self, payment_id: &str) -> StoreResult<Option<StoredRechargePayment>> {
        self.db.read(|txn| {
            let table = txn.open_table(RECHARGE_PAYMENTS)?;
            load(&table, payment_id)
        })
    }

    /// Record a payment whose signature did not verify.
    ///
    /// The order is marked failed unless it was already captured, and a
    /// captured payment record is never overwritten. A payment id already
    /// recorded for a different order is rejected with `Conflict`.
    pub fn record_failed(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> StoreResult<StoredRechargePayment> {
        let now = Utc::now();
        self.db.write(|txn| {
            let mut orders = txn.open_table(RECHARGE_ORDERS)?;
            let mut order: StoredRechargeOrder = load(&orders, order_id)?
                .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

            let mut payments = txn.open_table(RECHARGE_PAYMENTS)?;
            let existing = load::<StoredRechargePayment>(&payments, payment_id)?;
            if let Some(existing) = &existing {
                ensure_same_order(existing, order_id)?;
                if existing.status == PaymentStatus::Captured {
                    return Ok(existing.clone());
                }
            }

            let payment = StoredRechargePayment {
                id: payment_id.to_string(),
                order_id: order.id.clone(),
                customer_id: order.customer_id.clone(),
                amount: order.amount,
                method: None,
                status: PaymentStatus::Failed,
                created_at: now,
            };
            save(&mut payments, &payment.id, &payment)?;
            if existing.is_none() {
                index_new_payment(txn, &order.customer_id, &payment.id)?;
            }

            if order.status != OrderStatus::Captured {
                order.status = OrderStatus::Failed;
                order.updated_at = now;
                save(&mut orders, &order.id, &order)?;
            }
            Ok(payment)
        })
    }

    /// Capture a verified payment and credit the customer's balance.
    ///
    /// Idempotent per payment id: a second call returns `AlreadyCaptured`
    /// without crediting again. Callers have verified the gateway signature
    /// for this order/payment pair, so a failed record left under another
    /// order is taken over; a payment captured for another order conflicts.
    pub fn capture(
        &self,
        order_id: &str,
        payment_id: &str,
        method: Option<String>,
    ) -> StoreResult<CaptureOutcome> {
        let now = Utc::now();
        self.db.write(|txn| {
            let mut orders = txn.open_table(RECHARGE_ORDERS)?;
            let mut order: StoredRechargeOrder = load(&orders, order_id)?
                .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

            let mut customers = txn.open_table(CUSTOMERS)?;
            let mut customer: StoredCustomer = load(&customers, &order.customer_id)?
                .ok_or_else(|| StoreError::NotFound(format!("customer {}", order.customer_id)))?;

            let mut payments = txn.open_table(RECHARGE_PAYMENTS)?;
            let existing = load::<StoredRechargePayment>(&payments, payment_id)?;
            if let Some(existing) = existing.as_ref() {
                if existing.status == PaymentStatus::Captured {
                    ensure_same_order(existing, order_id)?;
                    return Ok(CaptureOutcome::AlreadyCaptured {
                        payment: existing.clone(),
                        balance: customer.balance,
                    });
                }
            }
            if order.status == OrderStatus::Captured {
                return Err(StoreError::Conflict(format!(
                    "order {order_id} was captured by another payment"
                )));
            }

            customer.balance = customer
                .balance
                .checked_add(order.amount)
                .ok_or(StoreError::BalanceOverflow)?;
            customer.updated_at = now;
            save(&mut customers, &customer.id, &customer)?;

            order.status = OrderStatus::Captured;
            order.updated_at = now;
            save(&mut orders, &order.id, &order)?;

            let payment = StoredRechargePayment {
                id: payment_id.to_string(),
                order_id: order.id.clone(),
                customer_id: customer.id.clone(),
                amount: order.amount,
                method,
                status: PaymentStatus::Captured,
                created_at: now,
            };
            save(&mut payments, &payment.id, &payment)?;
            // Stale entries under another customer are filtered out on listing.
            if existing.is_none_or(|previous| previous.customer_id != customer.id) {
                index_new_payment(txn, &customer.id, &payment.id)?;
            }

            Ok(CaptureOutcome::Captured {
                payment,
                balance: customer.balance,
            })
        })
    }

    /// A slice of a customer's payments, newest first, plus the total count.
    pub fn list_for_customer(
        &self,
        customer_id: &str,
        offset: usize,
        limit: usize,
    ) -> StoreResult<(Vec<StoredRechargePayment>, usize)> {
        self.db.read(|txn| {
            let index = txn.open_table(CUSTOMER_PAYMENT_INDEX)?;
            let payments = txn.open_table(RECHARGE_PAYMENTS)?;

            let prefix = make_prefix(customer_id);
            let prefix_end = make_prefix_end(customer_id);

            let mut items = Vec::new();
            let mut total = 0usize;
            for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
                let (_, payment_id) = entry?;
                let Some(payment) = load::<StoredRechargePayment>(&payments, payment_id.value())?
                else {
                    continue;
                };
                if payment.customer_id != customer_id {
                    continue;
                }
                let position = total;
                total += 1;
                if position >= offset && items.len() < limit {
                    items.push(payment);
                }
            }
            Ok((items, total))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_db;
    use crate::storage::repository::customers::{CustomerRepository, NewCustomer};

    fn setup_order(db: &WalletDb, order_id: &str, amount: Money) -> String {
        let (customer, _) = CustomerRepository::new(db)
            .create(NewCustomer {
                first_name: "Pay".to_string(),
                last_name: "Er".to_string(),
                email: format!("{order_id}@example.com"),
                password_hash: "hash".to_string(),
            })
            .unwrap();
        let now = Utc::now();
        PaymentRepository::new(db)
            .create_order(&StoredRechargeOrder {
                id: order_id.to_string(),
                customer_id: customer.id.clone(),
                amount,
                currency: "INR".to_string(),
                receipt: "rcpt_1".to_string(),
                status: OrderStatus::Created,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        customer.id
    }

    #[test]
    fn capture_credits_once() {
        let (db, _dir) = temp_db();
        let customer_id = setup_order(&db, "order_1", Money::from_major(250));
        let repo = PaymentRepository::new(&db);

        let first = repo
            .capture("order_1", "pay_1", Some("upi".to_string()))
            .unwrap();
        let CaptureOutcome::Captured { payment, balance } = first else {
            panic!("first capture should credit");
        };
        assert_eq!(balance, Money::from_major(250));
        assert_eq!(payment.method.as_deref(), Some("upi"));

        let second = repo.capture("order_1", "pay_1", None).unwrap();
        let CaptureOutcome::AlreadyCaptured { balance, .. } = second else {
            panic!("second capture must not credit");
        };
        assert_eq!(balance, Money::from_major(250));

        let customer = CustomerRepository::new(&db).get(&customer_id).unwrap().unwrap();
        assert_eq!(customer.balance, Money::from_major(250));
        assert_eq!(
            repo.get_order("order_1").unwrap().unwrap().status,
            OrderStatus::Captured
        );
    }

    #[test]
    fn second_payment_for_captured_order_conflicts() {
        let (db, _dir) = temp_db();
        setup_order(&db, "order_2", Money::from_major(10));
        let repo = PaymentRepository::new(&db);

        repo.capture("order_2", "pay_a", None).unwrap();
        let result = repo.capture("order_2", "pay_b", None);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn failed_payment_is_recorded_without_credit() {
        let (db, _dir) = temp_db();
        let customer_id = setup_order(&db, "order_3", Money::from_major(10));
        let repo = PaymentRepository::new(&db);

        let payment = repo.record_failed("order_3", "pay_bad").unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(
            repo.get_order("order_3").unwrap().unwrap().status,
            OrderStatus::Failed
        );

        let customer = CustomerRepository::new(&db).get(&customer_id).unwrap().unwrap();
        assert_eq!(customer.balance, Money::ZERO);

        let (items, total) = repo.list_for_customer(&customer_id, 0, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, "pay_bad");
    }

    #[test]
    fn failed_attempt_then_capture_lists_payment_once() {
        let (db, _dir) = temp_db();
        let customer_id = setup_order(&db, "order_p", Money::from_major(20));
        let repo = PaymentRepository::new(&db);

        repo.record_failed("order_p", "pay_x").unwrap();
        repo.record_failed("order_p", "pay_x").unwrap();
        repo.capture("order_p", "pay_x", None).unwrap();

        let (items, total) = repo.list_for_customer(&customer_id, 0, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "pay_x");
        assert_eq!(items[0].status, PaymentStatus::Captured);
    }

    #[test]
    fn payment_id_cannot_cross_orders() {
        let (db, _dir) = temp_db();
        let attacker = setup_order(&db, "order_a", Money::from_major(1));
        let victim = setup_order(&db, "order_v", Money::from_major(999));
        let repo = PaymentRepository::new(&db);

        // An unverified attempt claims the victim's payment id first.
        repo.record_failed("order_a", "pay_v").unwrap();
        let outcome = repo.capture("order_v", "pay_v", None).unwrap();
        assert!(matches!(outcome, CaptureOutcome::Captured { .. }));

        let (attacker_items, attacker_total) = repo.list_for_customer(&attacker, 0, 10).unwrap();
        assert_eq!(attacker_total, 0);
        assert!(attacker_items.is_empty());

        let (victim_items, victim_total) = repo.list_for_customer(&victim, 0, 10).unwrap();
        assert_eq!(victim_total, 1);
        assert_eq!(victim_items[0].id, "pay_v");
        assert_eq!(victim_items[0].customer_id, victim);
        assert_eq!(victim_items[0].status, PaymentStatus::Captured);

        // Once captured, the id cannot be recorded against another order.
        assert!(matches!(
            repo.record_failed("order_a", "pay_v"),
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            repo.capture("order_a", "pay_v", None),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn capture_of_unknown_order_is_not_found() {
        let (db, _dir) = temp_db();
        let repo = PaymentRepository::new(&db);
        let result = repo.capture("order_missing", "pay_1", None);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}

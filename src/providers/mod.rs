// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External payment gateway integrations.
//!
//! Handlers talk to a gateway through the [`PaymentGateway`] trait so the
//! HTTP client can be swapped for an in-memory fake in tests.

use async_trait::async_trait;

use crate::models::Money;

pub mod razorpay;

/// An order created on the gateway for a recharge.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: Money,
    pub currency: String,
    pub status: String,
}

/// A payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub id: String,
    pub order_id: Option<String>,
    pub amount: Money,
    pub method: Option<String>,
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway configuration missing: {0}")]
    MissingConfig(String),

    #[error("gateway request failed: {0}")]
    Request(String),

    #[error("gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway response was invalid: {0}")]
    InvalidResponse(String),
}

/// Operations the recharge flow needs from a payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> &str;

    /// Check a checkout callback signature for an order/payment pair.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;

    async fn create_order(&self, amount: Money, receipt: &str) -> Result<GatewayOrder, GatewayError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}

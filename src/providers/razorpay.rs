// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Razorpay integration for wallet recharges.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::info;

use super::{GatewayError, GatewayOrder, GatewayPayment, PaymentGateway};
use crate::models::Money;

pub const DEFAULT_API_BASE_URL: &str = "https://api.razorpay.com";
const DEFAULT_CURRENCY: &str = "INR";

type HmacSha256 = Hmac<Sha256>;

/// Credentials and endpoint for the Razorpay API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct RazorpayClient {
    config: RazorpayConfig,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    #[serde(default)]
    order_id: Option<String>,
    amount: i64,
    #[serde(default)]
    method: Option<String>,
    status: String,
}

/// Hex HMAC-SHA256 of `"{order_id}|{payment_id}"` keyed with the API secret.
pub fn sign_payment(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(key_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a checkout signature.
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    mac.verify_slice(&expected).is_ok()
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self, GatewayError> {
        if config.key_id.trim().is_empty() {
            return Err(GatewayError::MissingConfig("key id".to_string()));
        }
        if config.key_secret.trim().is_empty() {
            return Err(GatewayError::MissingConfig("key secret".to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GatewayError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn read_json(response: reqwest::Response, what: &str) -> Result<Value, GatewayError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status, body });
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("{what} invalid JSON: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.config.key_id
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.config.key_secret, order_id, payment_id, signature)
    }

    async fn create_order(&self, amount: Money, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        let payload = json!({
            "amount": amount.minor(),
            "currency": DEFAULT_CURRENCY,
            "receipt": receipt,
        });

        let response = self
            .http
            .post(self.url("/v1/orders"))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("POST /v1/orders failed: {e}")))?;

        let body = Self::read_json(response, "POST /v1/orders").await?;
        let order = parse_order(body)?;

        info!(
            order_id = %order.id,
            amount = %order.amount,
            receipt = %receipt,
            "Razorpay order created"
        );
        Ok(order)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let path = format!("/v1/payments/{payment_id}");
        let response = self
            .http
            .get(self.url(&path))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("GET {path} failed: {e}")))?;

        let body = Self::read_json(response, &format!("GET {path}")).await?;
        parse_payment(body)
    }
}

fn parse_order(body: Value) -> Result<GatewayOrder, GatewayError> {
    let order: OrderResponse = serde_json::from_value(body)
        .map_err(|e| GatewayError::InvalidResponse(format!("unexpected order shape: {e}")))?;
    Ok(GatewayOrder {
        id: order.id,
        amount: Money::from_minor(order.amount),
        currency: order.currency,
        status: order.status,
    })
}

fn parse_payment(body: Value) -> Result<GatewayPayment, GatewayError> {
    let payment: PaymentResponse = serde_json::from_value(body)
        .map_err(|e| GatewayError::InvalidResponse(format!("unexpected payment shape: {e}")))?;
    Ok(GatewayPayment {
        id: payment.id,
        order_id: payment.order_id,
        amount: Money::from_minor(payment.amount),
        method: payment.method,
        status: payment.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RazorpayConfig {
        RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: "test_secret".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    #[test]
    fn signature_round_trip_verifies() {
        let signature = sign_payment("test_secret", "order_1", "pay_1");
        assert_eq!(signature.len(), 64);
        assert!(verify_payment_signature(
            "test_secret",
            "order_1",
            "pay_1",
            &signature
        ));
    }

    #[test]
    fn signature_is_bound_to_secret_and_ids() {
        let signature = sign_payment("test_secret", "order_1", "pay_1");
        assert!(!verify_payment_signature("other_secret", "order_1", "pay_1", &signature));
        assert!(!verify_payment_signature("test_secret", "order_2", "pay_1", &signature));
        assert!(!verify_payment_signature("test_secret", "order_1", "pay_2", &signature));
        assert!(!verify_payment_signature("test_secret", "order_1", "pay_1", "not-hex"));
    }

    #[test]
    fn client_requires_credentials() {
        let mut missing = config();
        missing.key_secret = " ".to_string();
        assert!(matches!(
            RazorpayClient::new(missing),
            Err(GatewayError::MissingConfig(_))
        ));

        let client = RazorpayClient::new(config()).unwrap();
        assert_eq!(client.key_id(), "rzp_test_key");
        assert_eq!(client.url("/v1/orders"), "https://api.razorpay.com/v1/orders");
    }

    #[test]
    fn parse_order_reads_minor_units() {
        let order = parse_order(json!({
            "id": "order_9A33XWu170gUtm",
            "entity": "order",
            "amount": 50000,
            "currency": "INR",
            "receipt": "rcpt_1",
            "status": "created"
        }))
        .unwrap();
        assert_eq!(order.amount, Money::from_major(500));
        assert_eq!(order.status, "created");
    }

    #[test]
    fn parse_payment_tolerates_missing_method() {
        let payment = parse_payment(json!({
            "id": "pay_29QQoUBi66xm2f",
            "amount": 1000,
            "status": "captured"
        }))
        .unwrap();
        assert!(payment.method.is_none());
        assert!(payment.order_id.is_none());

        assert!(matches!(
            parse_payment(json!({ "id": 7 })),
            Err(GatewayError::InvalidResponse(_))
        ));
    }
}

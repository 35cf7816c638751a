// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet recharge through the payment gateway.
//!
//! The client creates an order here, completes checkout with the gateway,
//! then posts the checkout result to `verify`. Only a verified signature
//! credits the balance, and a payment id is credited at most once.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::Auth,
    error::ApiError,
    models::{new_uid, page_offset, total_pages, AmountInput, Money, PageQuery, PAGE_SIZE},
    providers::PaymentGateway,
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, CaptureOutcome, OrderStatus,
        PaymentRepository, PaymentStatus, StoreError, StoredRechargeOrder,
    },
};

/// Largest amount a single recharge may add.
pub const RECHARGE_CAP: Money = Money::from_major(10_000);

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Rupees, as a number or a decimal string.
    #[schema(value_type = f64)]
    pub amount: AmountInput,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Rupees.
    pub amount: f64,
    /// Paise, as the checkout widget expects.
    pub amount_paise: i64,
    pub currency: String,
    /// Public key id for the checkout widget.
    pub key_id: String,
}

/// Checkout result posted back by the client.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    #[serde(alias = "razorpayOrderId")]
    pub razorpay_order_id: String,
    #[serde(alias = "razorpayPaymentId")]
    pub razorpay_payment_id: String,
    #[serde(alias = "razorpaySignature")]
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub payment_id: String,
    pub order_id: String,
    pub amount: f64,
    /// Balance after the recharge.
    pub balance: f64,
    pub status: PaymentStatus,
    /// False when this payment had already been credited.
    pub credited: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RechargeItem {
    pub payment_id: String,
    pub order_id: String,
    pub amount: f64,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RechargeHistoryResponse {
    pub data: Vec<RechargeItem>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn gateway(state: &AppState) -> Result<Arc<dyn PaymentGateway>, ApiError> {
    state
        .gateway
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Payment gateway is not configured"))
}

fn parse_recharge_amount(input: &AmountInput) -> Result<Money, ApiError> {
    let amount = input
        .parse()
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;
    if amount > RECHARGE_CAP {
        return Err(ApiError::unprocessable(format!(
            "Amount must not exceed {RECHARGE_CAP}"
        )));
    }
    Ok(amount)
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a gateway order for a recharge.
#[utoipa::path(
    post,
    path = "/v1/payments/create-order",
    tag = "Payments",
    request_body = CreateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order created", body = CreateOrderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Invalid amount"),
        (status = 424, description = "Gateway request failed"),
        (status = 503, description = "Gateway not configured")
    )
)]
pub async fn create_order(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let gateway = gateway(&state)?;
    let amount = parse_recharge_amount(&request.amount)?;

    let receipt = new_uid("rcpt");
    let order = gateway.create_order(amount, &receipt).await.map_err(|e| {
        warn!(error = %e, customer_id = %caller.id, "Gateway order creation failed");
        ApiError::failed_dependency("Payment gateway request failed")
    })?;

    let now = Utc::now();
    let stored = StoredRechargeOrder {
        id: order.id.clone(),
        customer_id: caller.id.clone(),
        amount,
        currency: order.currency.clone(),
        receipt,
        status: OrderStatus::Created,
        created_at: now,
        updated_at: now,
    };
    PaymentRepository::new(&state.db).create_order(&stored)?;

    audit_log!(
        &state.files,
        AuditEventType::RechargeOrderCreated,
        caller,
        "recharge_order",
        stored.id.clone()
    );

    Ok(Json(CreateOrderResponse {
        order_id: stored.id,
        amount: amount.to_major(),
        amount_paise: amount.minor(),
        currency: stored.currency,
        key_id: gateway.key_id().to_string(),
    }))
}

/// Verify a checkout result and credit the wallet.
#[utoipa::path(
    post,
    path = "/v1/payments/verify",
    tag = "Payments",
    request_body = VerifyPaymentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payment captured", body = VerifyPaymentResponse),
        (status = 400, description = "Signature mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Order belongs to another customer"),
        (status = 404, description = "Order not found"),
        (status = 503, description = "Gateway not configured")
    )
)]
pub async fn verify(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let gateway = gateway(&state)?;
    let payments = PaymentRepository::new(&state.db);

    let order = payments
        .get_order(&request.razorpay_order_id)?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    if order.customer_id != caller.id {
        return Err(ApiError::forbidden("Order belongs to another customer"));
    }

    let signature_ok = gateway.verify_signature(
        &request.razorpay_order_id,
        &request.razorpay_payment_id,
        &request.razorpay_signature,
    );
    if !signature_ok {
        match payments.record_failed(&order.id, &request.razorpay_payment_id) {
            Ok(_) => {}
            Err(StoreError::Conflict(reason)) => {
                warn!(order_id = %order.id, %reason, "Failed payment not recorded");
            }
            Err(e) => return Err(e.into()),
        }
        AuditRepository::new(&state.files).record(
            AuditEvent::new(AuditEventType::RechargeVerificationFailed)
                .with_customer(caller.id.clone())
                .with_resource("recharge_order", order.id.clone())
                .failed("signature mismatch"),
        );
        return Err(ApiError::bad_request("Payment signature verification failed"));
    }

    // The method is informational; a lookup failure does not block the credit.
    let method = match gateway.fetch_payment(&request.razorpay_payment_id).await {
        Ok(payment) => {
            if payment.order_id.as_deref().is_some_and(|id| id != order.id) {
                return Err(ApiError::bad_request("Payment does not belong to this order"));
            }
            payment.method
        }
        Err(e) => {
            warn!(error = %e, payment_id = %request.razorpay_payment_id, "Payment lookup failed");
            None
        }
    };

    let (payment, balance, credited) =
        match payments.capture(&order.id, &request.razorpay_payment_id, method)? {
            CaptureOutcome::Captured { payment, balance } => (payment, balance, true),
            CaptureOutcome::AlreadyCaptured { payment, balance } => (payment, balance, false),
        };

    if credited {
        AuditRepository::new(&state.files).record(
            AuditEvent::new(AuditEventType::RechargeCaptured)
                .with_customer(caller.id.clone())
                .with_resource("recharge_payment", payment.id.clone())
                .with_details(json!({
                    "order_id": order.id,
                    "amount": payment.amount.to_string(),
                })),
        );
        info!(
            payment_id = %payment.id,
            order_id = %order.id,
            amount = %payment.amount,
            "Recharge captured"
        );
    }

    Ok(Json(VerifyPaymentResponse {
        payment_id: payment.id,
        order_id: payment.order_id,
        amount: payment.amount.to_major(),
        balance: balance.to_major(),
        status: payment.status,
        credited,
    }))
}

/// Paginated recharge history, newest first.
#[utoipa::path(
    get,
    path = "/v1/payments/history",
    tag = "Payments",
    params(PageQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recharge history", body = RechargeHistoryResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn history(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<RechargeHistoryResponse>, ApiError> {
    let page = query.page();
    let (items, total) =
        PaymentRepository::new(&state.db).list_for_customer(&caller.id, page_offset(page), PAGE_SIZE)?;

    let data = items
        .into_iter()
        .map(|payment| RechargeItem {
            payment_id: payment.id,
            order_id: payment.order_id,
            amount: payment.amount.to_major(),
            method: payment.method,
            status: payment.status,
            date: payment.created_at,
        })
        .collect();

    Ok(Json(RechargeHistoryResponse {
        data,
        total,
        page,
        total_pages: total_pages(total),
    }))
}

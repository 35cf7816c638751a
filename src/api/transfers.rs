// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Peer-to-peer transfers and transfer history.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{verify_password, Auth, AuthenticatedCustomer},
    error::ApiError,
    models::{page_offset, total_pages, AmountInput, Money, PageQuery, PAGE_SIZE},
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, CustomerRepository, Direction, HistoryPage,
        StoredTransaction, TransactionRepository, TransferStatus,
    },
};

/// Largest amount a single transfer may move.
pub const MAX_TRANSFER: Money = Money::from_major(500);

const DEFAULT_RECENT_LIMIT: usize = 5;
const MAX_RECENT_LIMIT: usize = 50;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendTransferRequest {
    #[serde(alias = "email")]
    pub destination_email: String,
    /// Rupees, as a number or a decimal string.
    #[schema(value_type = f64)]
    pub amount: AmountInput,
    #[serde(default)]
    pub description: Option<String>,
    /// The sender's password, re-entered to confirm the transfer.
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferResponse {
    pub transaction_id: String,
    pub amount: f64,
    pub recipient: String,
    pub recipient_email: String,
    /// Sender balance after the transfer.
    pub balance: f64,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

/// One row of a customer's transfer history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryItem {
    pub id: String,
    pub action: Direction,
    pub amount: f64,
    /// Counterparty name.
    pub customer: String,
    /// Counterparty email.
    pub email: String,
    pub note: Option<String>,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub data: Vec<HistoryItem>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentQuery {
    /// Defaults to 5, capped at 50.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecentResponse {
    pub data: Vec<HistoryItem>,
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Resolve counterparties and shape stored transfers for display.
fn history_items(
    state: &AppState,
    customer_id: &str,
    items: Vec<(StoredTransaction, Direction)>,
) -> Result<Vec<HistoryItem>, ApiError> {
    let customers = CustomerRepository::new(&state.db);
    let mut counterparties: HashMap<String, (String, String)> = HashMap::new();

    let mut rows = Vec::with_capacity(items.len());
    for (transaction, direction) in items {
        let counterparty_id = transaction.counterparty_of(customer_id).to_string();
        if !counterparties.contains_key(&counterparty_id) {
            let party = customers
                .get(&counterparty_id)?
                .map(|c| (c.full_name(), c.email))
                .unwrap_or_else(|| ("Unknown".to_string(), String::new()));
            counterparties.insert(counterparty_id.clone(), party);
        }
        let (name, email) = counterparties
            .get(&counterparty_id)
            .cloned()
            .unwrap_or_default();

        rows.push(HistoryItem {
            id: transaction.id,
            action: direction,
            amount: transaction.amount.to_major(),
            customer: name,
            email,
            note: transaction.description,
            status: transaction.status,
            created_at: transaction.created_at,
        });
    }
    Ok(rows)
}

fn history_page(state: &AppState, customer_id: &str, page: usize) -> Result<HistoryPage, ApiError> {
    let generation = state.history_cache.generation(customer_id);
    if page == 1 {
        if let Some(cached) = state.history_cache.get_first_page(customer_id) {
            return Ok(cached);
        }
    }

    let result = TransactionRepository::new(&state.db).list_for_customer(
        customer_id,
        page_offset(page),
        PAGE_SIZE,
    )?;

    if page == 1 {
        state
            .history_cache
            .put_first_page(customer_id, generation, result.clone());
    }
    Ok(result)
}

fn reject_transfer(state: &AppState, sender: &AuthenticatedCustomer, reason: &str) {
    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::TransferRejected)
            .with_customer(sender.id.clone())
            .failed(reason),
    );
}

// =============================================================================
// Handlers
// =============================================================================

/// Send money to another customer.
///
/// Checks run in order: recipient exists, not a self-transfer, amount within
/// bounds, password confirmed. Balances move inside one write transaction.
#[utoipa::path(
    post,
    path = "/v1/transfers/send",
    tag = "Transfers",
    request_body = SendTransferRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transfer completed", body = TransferResponse),
        (status = 400, description = "Self-transfer"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Password confirmation failed"),
        (status = 404, description = "Recipient not found"),
        (status = 422, description = "Invalid amount or insufficient balance")
    )
)]
pub async fn send(
    Auth(sender): Auth,
    State(state): State<AppState>,
    Json(request): Json<SendTransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let customers = CustomerRepository::new(&state.db);

    let recipient = customers
        .get_by_email(&request.destination_email)?
        .ok_or_else(|| ApiError::not_found("Recipient not found"))?;

    if recipient.id == sender.id {
        return Err(ApiError::bad_request("Cannot transfer to yourself"));
    }

    let amount = request
        .amount
        .parse()
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;
    if amount > MAX_TRANSFER {
        return Err(ApiError::unprocessable(format!(
            "Amount must not exceed {MAX_TRANSFER}"
        )));
    }

    let stored_sender = customers
        .get(&sender.id)?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;
    let confirmed = verify_password(request.password, stored_sender.password_hash)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !confirmed {
        reject_transfer(&state, &sender, "password confirmation failed");
        return Err(ApiError::forbidden("Password confirmation failed"));
    }

    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let receipt = TransactionRepository::new(&state.db)
        .transfer(&sender.id, &recipient.id, amount, description)
        .inspect_err(|e| reject_transfer(&state, &sender, &e.to_string()))?;

    state.history_cache.invalidate(&sender.id);
    state.history_cache.invalidate(&recipient.id);

    AuditRepository::new(&state.files).record(
        AuditEvent::new(AuditEventType::TransferCompleted)
            .with_customer(sender.id.clone())
            .with_resource("transaction", receipt.transaction.id.clone())
            .with_details(json!({
                "destination_id": recipient.id,
                "amount": amount.to_string(),
            })),
    );

    info!(
        transaction_id = %receipt.transaction.id,
        source_id = %sender.id,
        destination_id = %recipient.id,
        amount = %amount,
        "Transfer completed"
    );

    Ok(Json(TransferResponse {
        transaction_id: receipt.transaction.id,
        amount: amount.to_major(),
        recipient: recipient.full_name(),
        recipient_email: recipient.email,
        balance: receipt.source_balance.to_major(),
        status: receipt.transaction.status,
        created_at: receipt.transaction.created_at,
    }))
}

/// Paginated transfer history, newest first.
#[utoipa::path(
    get,
    path = "/v1/transfers/history",
    tag = "Transfers",
    params(PageQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transfer history", body = HistoryResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn history(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let page = query.page();
    let result = history_page(&state, &caller.id, page)?;

    Ok(Json(HistoryResponse {
        data: history_items(&state, &caller.id, result.items)?,
        total: result.total,
        page,
        total_pages: total_pages(result.total),
    }))
}

/// The caller's latest transfers.
#[utoipa::path(
    get,
    path = "/v1/transfers/recent",
    tag = "Transfers",
    params(RecentQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recent transfers", body = RecentResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn recent(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>, ApiError> {
    let limit = query
        .limit
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(MAX_RECENT_LIMIT);

    let result = TransactionRepository::new(&state.db).list_for_customer(&caller.id, 0, limit)?;
    Ok(Json(RecentResponse {
        data: history_items(&state, &caller.id, result.items)?,
    }))
}

/// Prefix cells that spreadsheet apps would evaluate as formulas.
fn spreadsheet_safe(value: &str) -> String {
    match value.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{value}"),
        _ => value.to_string(),
    }
}

/// Full transfer history as a CSV attachment.
#[utoipa::path(
    get,
    path = "/v1/transfers/export",
    tag = "Transfers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn export(
    Auth(caller): Auth,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let all = TransactionRepository::new(&state.db).all_for_customer(&caller.id)?;
    let rows = history_items(&state, &caller.id, all)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    let write_error = |e: csv::Error| ApiError::internal(format!("CSV export failed: {e}"));
    writer
        .write_record(["id", "date", "type", "counterparty", "email", "amount", "note", "status"])
        .map_err(write_error)?;
    for row in &rows {
        writer
            .write_record([
                row.id.clone(),
                row.created_at.to_rfc3339(),
                row.action.as_str().to_string(),
                spreadsheet_safe(&row.customer),
                spreadsheet_safe(&row.email),
                format!("{:.2}", row.amount),
                spreadsheet_safe(row.note.as_deref().unwrap_or_default()),
                row.status.as_str().to_string(),
            ])
            .map_err(write_error)?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| ApiError::internal(format!("CSV export failed: {e}")))?;

    let file_name = format!("transactions_{}.csv", Utc::now().format("%Y%m%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{
        body_json, body_text, fund, get, post_json, register_customer, test_app, STRONG_PASSWORD,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    fn send_body(email: &str, amount: serde_json::Value) -> serde_json::Value {
        json!({
            "destination_email": email,
            "amount": amount,
            "description": "rent",
            "password": STRONG_PASSWORD,
        })
    }

    #[tokio::test]
    async fn transfer_moves_balance_between_customers() {
        let (app, state, _dir) = test_app();
        let asha = register_customer(&app, "Asha", "asha@example.com").await;
        let ravi = register_customer(&app, "Ravi", "ravi@example.com").await;
        fund(&state, &asha.id, Money::from_major(1000));

        let response = post_json(
            &app,
            "/v1/transfers/send",
            Some(&asha.token),
            send_body("ravi@example.com", json!(125.5)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["balance"], 874.5);
        assert_eq!(body["status"], "captured");

        let ravi_balance = body_json(get(&app, "/v1/customers/balance", Some(&ravi.token)).await).await;
        assert_eq!(ravi_balance["balance"], 125.5);
    }

    #[tokio::test]
    async fn checks_run_in_order() {
        let (app, state, _dir) = test_app();
        let asha = register_customer(&app, "Asha", "asha@example.com").await;
        register_customer(&app, "Ravi", "ravi@example.com").await;
        fund(&state, &asha.id, Money::from_major(100));

        let missing = post_json(
            &app,
            "/v1/transfers/send",
            Some(&asha.token),
            send_body("nobody@example.com", json!(600)),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let own = post_json(
            &app,
            "/v1/transfers/send",
            Some(&asha.token),
            send_body("asha@example.com", json!(600)),
        )
        .await;
        assert_eq!(own.status(), StatusCode::BAD_REQUEST);

        let too_much = post_json(
            &app,
            "/v1/transfers/send",
            Some(&asha.token),
            send_body("ravi@example.com", json!(500.01)),
        )
        .await;
        assert_eq!(too_much.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let zero = post_json(
            &app,
            "/v1/transfers/send",
            Some(&asha.token),
            send_body("ravi@example.com", json!("0")),
        )
        .await;
        assert_eq!(zero.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let wrong_password = post_json(
            &app,
            "/v1/transfers/send",
            Some(&asha.token),
            json!({
                "email": "ravi@example.com",
                "amount": 10,
                "password": "Wrong@1234",
            }),
        )
        .await;
        assert_eq!(wrong_password.status(), StatusCode::FORBIDDEN);

        let broke = post_json(
            &app,
            "/v1/transfers/send",
            Some(&asha.token),
            send_body("ravi@example.com", json!(200)),
        )
        .await;
        assert_eq!(broke.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let balance = body_json(get(&app, "/v1/customers/balance", Some(&asha.token)).await).await;
        assert_eq!(balance["balance"], 100.0);
    }

    #[tokio::test]
    async fn history_shows_both_sides_and_refreshes_after_transfer() {
        let (app, state, _dir) = test_app();
        let asha = register_customer(&app, "Asha", "asha@example.com").await;
        let ravi = register_customer(&app, "Ravi", "ravi@example.com").await;
        fund(&state, &asha.id, Money::from_major(100));

        // Prime the first-page cache for the recipient.
        let empty = body_json(get(&app, "/v1/transfers/history", Some(&ravi.token)).await).await;
        assert_eq!(empty["total"], 0);

        post_json(
            &app,
            "/v1/transfers/send",
            Some(&asha.token),
            send_body("ravi@example.com", json!(40)),
        )
        .await;

        let sent = body_json(get(&app, "/v1/transfers/history", Some(&asha.token)).await).await;
        assert_eq!(sent["total"], 1);
        assert_eq!(sent["total_pages"], 1);
        assert_eq!(sent["data"][0]["action"], "debit");
        assert_eq!(sent["data"][0]["customer"], "Ravi Tester");
        assert_eq!(sent["data"][0]["note"], "rent");

        let received = body_json(get(&app, "/v1/transfers/history", Some(&ravi.token)).await).await;
        assert_eq!(received["total"], 1);
        assert_eq!(received["data"][0]["action"], "credit");
        assert_eq!(received["data"][0]["email"], "asha@example.com");
    }

    #[tokio::test]
    async fn recent_and_export_cover_history() {
        let (app, state, _dir) = test_app();
        let asha = register_customer(&app, "Asha", "asha@example.com").await;
        register_customer(&app, "Ravi", "ravi@example.com").await;
        fund(&state, &asha.id, Money::from_major(100));

        for amount in [1, 2, 3] {
            post_json(
                &app,
                "/v1/transfers/send",
                Some(&asha.token),
                send_body("ravi@example.com", json!(amount)),
            )
            .await;
        }

        let recent = body_json(get(&app, "/v1/transfers/recent?limit=2", Some(&asha.token)).await).await;
        assert_eq!(recent["data"].as_array().unwrap().len(), 2);

        let export = get(&app, "/v1/transfers/export", Some(&asha.token)).await;
        assert_eq!(export.status(), StatusCode::OK);
        let disposition = export.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment;"));

        let csv = body_text(export).await;
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("id,date,type"));
        assert!(lines[1].contains(",debit,Ravi Tester,ravi@example.com,3.00,rent,captured"));
    }

    #[test]
    fn formula_cells_are_prefixed() {
        assert_eq!(spreadsheet_safe("=1+1"), "'=1+1");
        assert_eq!(spreadsheet_safe("+91 call"), "'+91 call");
        assert_eq!(spreadsheet_safe("-2"), "'-2");
        assert_eq!(spreadsheet_safe("@SUM(A1)"), "'@SUM(A1)");
        assert_eq!(spreadsheet_safe("rent"), "rent");
        assert_eq!(spreadsheet_safe(""), "");
    }

    #[tokio::test]
    async fn export_neutralizes_formula_notes() {
        let (app, state, _dir) = test_app();
        let asha = register_customer(&app, "Asha", "asha@example.com").await;
        register_customer(&app, "Ravi", "ravi@example.com").await;
        fund(&state, &asha.id, Money::from_major(100));

        let mut body = send_body("ravi@example.com", json!(5));
        body["description"] = json!("=1+1");
        let response = post_json(&app, "/v1/transfers/send", Some(&asha.token), body).await;
        assert_eq!(response.status(), StatusCode::OK);

        let csv = body_text(get(&app, "/v1/transfers/export", Some(&asha.token)).await).await;
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains(",5.00,'=1+1,captured"), "{row}");
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Customer account endpoints: registration, login, profile and search.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use super::MessageResponse;
use crate::{
    audit_log,
    auth::{
        hash_password, password_policy_violation, verify_password, verify_without_account, Auth,
    },
    error::ApiError,
    models::Money,
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, CustomerRepository, Direction, NewCustomer,
        StoreError, StoredCustomer, TransactionRepository,
    },
};

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{3,15}$").expect("valid name pattern"));
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern")
});

/// Results returned by customer search.
const SEARCH_LIMIT: usize = 10;
const MIN_SEARCH_KEYWORD_LEN: usize = 2;
/// Window counted as recent activity on the dashboard.
const RECENT_ACTIVITY_DAYS: i64 = 7;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(alias = "firstName")]
    pub first_name: String,
    #[serde(alias = "lastName")]
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A customer as shown to its owner. Never carries the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CustomerView {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Balance in rupees.
    pub balance: f64,
    /// Card number with all but the last four digits masked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    pub customer: CustomerView,
    pub token: String,
    /// Token expiry (Unix seconds).
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_sent: f64,
    pub total_received: f64,
    pub total_transactions: usize,
    /// Transfers in the last seven days.
    pub recent_activity: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Matched against name and email, case-insensitive. At least 2 characters.
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CustomerSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResponse {
    pub data: Vec<CustomerSummary>,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn customer_view(state: &AppState, customer: &StoredCustomer) -> Result<CustomerView, ApiError> {
    let card = CustomerRepository::new(&state.db).get_card(&customer.card_id)?;
    Ok(CustomerView {
        id: customer.id.clone(),
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email: customer.email.clone(),
        balance: customer.balance.to_major(),
        card_number: card.map(|card| card.masked_number()),
        created_at: customer.created_at,
    })
}

fn load_customer(state: &AppState, customer_id: &str) -> Result<StoredCustomer, ApiError> {
    CustomerRepository::new(&state.db)
        .get(customer_id)?
        .ok_or_else(|| ApiError::not_found("Customer not found"))
}

/// Field-level problems with a registration request.
fn validate_registration(request: &RegisterRequest) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    if !NAME_PATTERN.is_match(request.first_name.trim()) {
        errors.insert(
            "first_name".to_string(),
            "First name must be 3-15 letters".to_string(),
        );
    }
    if !NAME_PATTERN.is_match(request.last_name.trim()) {
        errors.insert(
            "last_name".to_string(),
            "Last name must be 3-15 letters".to_string(),
        );
    }
    if !is_valid_email(&request.email) {
        errors.insert("email".to_string(), "Email is invalid".to_string());
    }
    if let Some(problem) = password_policy_violation(&request.password) {
        errors.insert("password".to_string(), problem.to_string());
    }
    errors
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new customer.
///
/// Creates the account and its virtual card together and returns a session token.
#[utoipa::path(
    post,
    path = "/v1/customers/register",
    tag = "Customers",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Customer registered", body = AuthResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let problems = validate_registration(&request);
    if !problems.is_empty() {
        return Err(ApiError::validation(problems));
    }

    let password_hash = hash_password(request.password)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let (customer, _card) = CustomerRepository::new(&state.db)
        .create(NewCustomer {
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email,
            password_hash,
        })
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::conflict("Email is already registered"),
            other => other.into(),
        })?;

    let issued = state
        .auth
        .issue(&customer)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    audit_log!(&state.files, AuditEventType::CustomerRegistered, customer);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            customer: customer_view(&state, &customer)?,
            token: issued.token,
            expires_at: issued.claims.exp,
        }),
    ))
}

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/v1/customers/login",
    tag = "Customers",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let Some(customer) = CustomerRepository::new(&state.db).get_by_email(&request.email)? else {
        verify_without_account(request.password)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
        AuditRepository::new(&state.files).record(
            AuditEvent::new(AuditEventType::LoginFailed)
                .with_details(json!({ "reason": "unknown_email" }))
                .failed("unknown email"),
        );
        return Err(invalid());
    };

    let matches = verify_password(request.password, customer.password_hash.clone())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !matches {
        AuditRepository::new(&state.files).record(
            AuditEvent::new(AuditEventType::LoginFailed)
                .with_customer(customer.id.clone())
                .failed("wrong password"),
        );
        return Err(invalid());
    }

    let issued = state
        .auth
        .issue(&customer)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    audit_log!(&state.files, AuditEventType::LoginSucceeded, customer);

    Ok(Json(AuthResponse {
        customer: customer_view(&state, &customer)?,
        token: issued.token,
        expires_at: issued.claims.exp,
    }))
}

/// Get the caller's profile.
#[utoipa::path(
    get,
    path = "/v1/customers/profile",
    tag = "Customers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Customer profile", body = CustomerView),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn profile(
    Auth(caller): Auth,
    State(state): State<AppState>,
) -> Result<Json<CustomerView>, ApiError> {
    let customer = load_customer(&state, &caller.id)?;
    Ok(Json(customer_view(&state, &customer)?))
}

/// Get the caller's balance.
#[utoipa::path(
    get,
    path = "/v1/customers/balance",
    tag = "Customers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn balance(
    Auth(caller): Auth,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let customer = load_customer(&state, &caller.id)?;
    Ok(Json(BalanceResponse {
        balance: customer.balance.to_major(),
    }))
}

/// Transfer totals for the dashboard.
#[utoipa::path(
    get,
    path = "/v1/customers/dashboard-stats",
    tag = "Customers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn dashboard_stats(
    Auth(caller): Auth,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ApiError> {
    let history = TransactionRepository::new(&state.db).all_for_customer(&caller.id)?;
    let since = Utc::now() - Duration::days(RECENT_ACTIVITY_DAYS);

    let mut sent = Money::ZERO;
    let mut received = Money::ZERO;
    let mut recent_activity = 0;
    for (transaction, direction) in &history {
        let total = match direction {
            Direction::Debit => &mut sent,
            Direction::Credit => &mut received,
        };
        *total = total.checked_add(transaction.amount).unwrap_or(*total);
        if transaction.created_at >= since {
            recent_activity += 1;
        }
    }

    Ok(Json(DashboardStats {
        total_sent: sent.to_major(),
        total_received: received.to_major(),
        total_transactions: history.len(),
        recent_activity,
    }))
}

/// Find other customers by name or email.
#[utoipa::path(
    get,
    path = "/v1/customers/search",
    tag = "Customers",
    params(SearchQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Matching customers", body = SearchResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn search(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let keyword = query.keyword.unwrap_or_default();
    if keyword.trim().chars().count() < MIN_SEARCH_KEYWORD_LEN {
        return Ok(Json(SearchResponse { data: Vec::new() }));
    }

    let data = CustomerRepository::new(&state.db)
        .search(&keyword, &caller.id, SEARCH_LIMIT)?
        .into_iter()
        .map(|customer| CustomerSummary {
            name: customer.full_name(),
            id: customer.id,
            email: customer.email,
        })
        .collect();

    Ok(Json(SearchResponse { data }))
}

/// Revoke the presented token.
#[utoipa::path(
    post,
    path = "/v1/customers/logout",
    tag = "Customers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout(
    Auth(caller): Auth,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.db.revoke_token(&caller.token_id, caller.expires_at)?;
    audit_log!(&state.files, AuditEventType::LoggedOut, caller);
    Ok(Json(MessageResponse::new("Logged out")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{
        body_json, get, post_json, register_customer, test_app, STRONG_PASSWORD,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn registration_validation_reports_each_field() {
        let problems = validate_registration(&RegisterRequest {
            first_name: "Al".to_string(),
            last_name: "Smith3".to_string(),
            email: "not-an-email".to_string(),
            password: "weak".to_string(),
        });
        let fields: Vec<_> = problems.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["email", "first_name", "last_name", "password"]);
    }

    #[tokio::test]
    async fn register_returns_token_and_masked_card() {
        let (app, _state, _dir) = test_app();
        let response = post_json(
            &app,
            "/v1/customers/register",
            None,
            json!({
                "first_name": "Asha",
                "last_name": "Rao",
                "email": "Asha@Example.com",
                "password": STRONG_PASSWORD,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["customer"]["email"], "asha@example.com");
        assert_eq!(body["customer"]["balance"], 0.0);
        let card = body["customer"]["card_number"].as_str().unwrap();
        assert_eq!(card.len(), 16);
        assert!(card.starts_with("************"));
        assert!(body["token"].as_str().is_some());
        assert!(body["customer"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (app, _state, _dir) = test_app();
        register_customer(&app, "Asha", "asha@example.com").await;
        let response = post_json(
            &app,
            "/v1/customers/register",
            None,
            json!({
                "first_name": "Other",
                "last_name": "Person",
                "email": "ASHA@example.com",
                "password": STRONG_PASSWORD,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn invalid_registration_returns_field_map() {
        let (app, _state, _dir) = test_app();
        let response = post_json(
            &app,
            "/v1/customers/register",
            None,
            json!({
                "first_name": "A",
                "last_name": "Rao",
                "email": "asha@example.com",
                "password": STRONG_PASSWORD,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["fields"]["first_name"].is_string());
    }

    #[tokio::test]
    async fn login_uses_one_message_for_all_failures() {
        let (app, _state, _dir) = test_app();
        register_customer(&app, "Asha", "asha@example.com").await;

        let wrong_password = post_json(
            &app,
            "/v1/customers/login",
            None,
            json!({ "email": "asha@example.com", "password": "Wrong@123" }),
        )
        .await;
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        let wrong_password = body_json(wrong_password).await;

        let unknown = post_json(
            &app,
            "/v1/customers/login",
            None,
            json!({ "email": "nobody@example.com", "password": STRONG_PASSWORD }),
        )
        .await;
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(unknown).await, wrong_password);

        let ok = post_json(
            &app,
            "/v1/customers/login",
            None,
            json!({ "email": "ASHA@example.com", "password": STRONG_PASSWORD }),
        )
        .await;
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn profile_requires_token() {
        let (app, _state, _dir) = test_app();
        let response = get(&app, "/v1/customers/profile", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_revokes_token() {
        let (app, _state, _dir) = test_app();
        let token = register_customer(&app, "Asha", "asha@example.com").await.token;

        let balance = get(&app, "/v1/customers/balance", Some(&token)).await;
        assert_eq!(balance.status(), StatusCode::OK);

        let logout = post_json(&app, "/v1/customers/logout", Some(&token), json!({})).await;
        assert_eq!(logout.status(), StatusCode::OK);

        let after = get(&app, "/v1/customers/balance", Some(&token)).await;
        assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn search_excludes_caller_and_short_keywords() {
        let (app, _state, _dir) = test_app();
        let asha = register_customer(&app, "Asha", "asha@example.com").await;
        register_customer(&app, "Ashok", "ashok@example.com").await;
        register_customer(&app, "Ravi", "ravi@example.com").await;

        let response = get(&app, "/v1/customers/search?keyword=ash", Some(&asha.token)).await;
        let body = body_json(response).await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["email"], "ashok@example.com");

        let short = get(&app, "/v1/customers/search?keyword=a", Some(&asha.token)).await;
        assert_eq!(body_json(short).await["data"], json!([]));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::AmountInput,
    pdf::{PdfMetadata, SignatureBox},
    state::AppState,
    storage::{
        Direction, DocumentStatus, PaymentStatus, SignatureCoordinates, SignedVersion,
        StoredDocument, TransferStatus,
    },
};

pub mod customers;
pub mod esign;
pub mod health;
pub mod payments;
pub mod transfers;

/// Request body cap. Slightly above the upload limit so oversized PDFs get a
/// descriptive 413 from the upload handler.
const BODY_LIMIT_BYTES: usize = 12 * 1024 * 1024;

/// Plain confirmation body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/customers/register", post(customers::register))
        .route("/customers/login", post(customers::login))
        .route("/customers/logout", post(customers::logout))
        .route("/customers/profile", get(customers::profile))
        .route("/customers/balance", get(customers::balance))
        .route("/customers/dashboard-stats", get(customers::dashboard_stats))
        .route("/customers/search", get(customers::search))
        .route("/transfers/send", post(transfers::send))
        .route("/transfers/history", get(transfers::history))
        .route("/transfers/recent", get(transfers::recent))
        .route("/transfers/export", get(transfers::export))
        .route("/payments/create-order", post(payments::create_order))
        .route("/payments/verify", post(payments::verify))
        .route("/payments/history", get(payments::history))
        .route("/esign/documents", get(esign::list_documents))
        .route("/esign/upload", post(esign::upload))
        .route("/esign/send", post(esign::send))
        .route("/esign/sign/{document_id}", post(esign::sign))
        .route("/esign/download/{document_id}", get(esign::download))
        .route(
            "/esign/document/{document_id}",
            get(esign::get_document).delete(esign::delete_document),
        )
        .route("/esign/stats", get(esign::stats))
        .route("/esign/signature-positions", get(esign::signature_positions))
        .route("/esign/preview-signature", post(esign::preview_signature))
        .route("/esign/visual-signature", post(esign::visual_signature))
        .route("/esign/check-signed/{document_id}", get(esign::check_signed))
        .route("/esign/pdf-metadata/{document_id}", get(esign::pdf_metadata));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        customers::register,
        customers::login,
        customers::logout,
        customers::profile,
        customers::balance,
        customers::dashboard_stats,
        customers::search,
        transfers::send,
        transfers::history,
        transfers::recent,
        transfers::export,
        payments::create_order,
        payments::verify,
        payments::history,
        esign::list_documents,
        esign::upload,
        esign::send,
        esign::sign,
        esign::download,
        esign::get_document,
        esign::delete_document,
        esign::stats,
        esign::signature_positions,
        esign::preview_signature,
        esign::visual_signature,
        esign::check_signed,
        esign::pdf_metadata
    ),
    components(
        schemas(
            MessageResponse,
            AmountInput,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            customers::RegisterRequest,
            customers::LoginRequest,
            customers::CustomerView,
            customers::AuthResponse,
            customers::BalanceResponse,
            customers::DashboardStats,
            customers::CustomerSummary,
            customers::SearchResponse,
            transfers::SendTransferRequest,
            transfers::TransferResponse,
            transfers::HistoryItem,
            transfers::HistoryResponse,
            transfers::RecentResponse,
            payments::CreateOrderRequest,
            payments::CreateOrderResponse,
            payments::VerifyPaymentRequest,
            payments::VerifyPaymentResponse,
            payments::RechargeItem,
            payments::RechargeHistoryResponse,
            esign::DocumentListResponse,
            esign::SendDocumentRequest,
            esign::SignDocumentRequest,
            esign::PreviewSignatureRequest,
            esign::PreviewSignatureResponse,
            esign::VisualSignatureRequest,
            esign::VisualSignatureResponse,
            esign::DocumentStats,
            esign::CheckSignedResponse,
            esign::PdfMetadataResponse,
            StoredDocument,
            DocumentStatus,
            SignedVersion,
            SignatureCoordinates,
            SignatureBox,
            PdfMetadata,
            Direction,
            TransferStatus,
            PaymentStatus
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Customers", description = "Registration, login and profile"),
        (name = "Transfers", description = "Peer-to-peer transfers and history"),
        (name = "Payments", description = "Wallet recharge through Razorpay"),
        (name = "e-Sign", description = "PDF upload, signing and inspection")
    )
)]
struct ApiDoc;


#[cfg(test)]
mod tests {
    use super::test_helpers::{body_json, get, test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn openapi_lists_every_route() {
        let (app, _state, _dir) = test_app();
        let response = get(&app, "/api-doc/openapi.json", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert!(doc["paths"]["/v1/transfers/send"].is_object());
        assert!(doc["paths"]["/v1/esign/sign/{document_id}"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (app, _state, _dir) = test_app();
        let response = get(&app, "/health/live", None).await;
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let (app, _state, _dir) = test_app();
        let response = get(&app, "/v1/nope", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

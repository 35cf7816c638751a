// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! e-Sign endpoints: upload, send, sign and inspect PDF documents.
//!
//! Uploaded originals are never rewritten. Each signing writes a new
//! versioned file next to the original, built on top of the latest one.

use std::path::Path;

use axum::{
    extract::{Multipart, Path as UrlPath, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::{customers::is_valid_email, MessageResponse};
use crate::{
    audit_log,
    auth::{Auth, AuthenticatedCustomer},
    error::ApiError,
    models::new_uid,
    pdf::{
        decode_signature_image, embed_signature, extract_metadata, is_signed, validate_pdf,
        visual_signature_html, PdfMetadata, SignatureBox, SignaturePlacement, SignerInfo,
    },
    state::AppState,
    storage::{
        AuditEventType, DocumentRepository, DocumentStatus, SignatureCoordinates, SignedVersion,
        StoreError, StoredDocument,
    },
};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// How long a sent document stays signable.
const SIGNING_WINDOW_DAYS: i64 = 30;
const DEFAULT_POSITION: &str = "bottomRight";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub data: Vec<StoredDocument>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendDocumentRequest {
    #[serde(alias = "documentId")]
    pub document_id: String,
    #[serde(alias = "recipientEmail")]
    pub recipient_email: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignDocumentRequest {
    /// PNG/JPEG signature as base64 or a `data:image/...;base64,` URL.
    pub signature: String,
    /// Client-side drawing data, kept for reference only.
    #[serde(default, alias = "signatureData")]
    pub signature_data: Option<serde_json::Value>,
    /// `bottomRight`, `bottomLeft`, `center` or `custom`.
    #[serde(default)]
    pub position: Option<String>,
    /// Required when `position` is `custom`.
    #[serde(default, alias = "customPosition")]
    pub custom_position: Option<SignatureBox>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PreviewSignatureRequest {
    #[serde(alias = "documentId")]
    pub document_id: String,
    pub signature: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default, alias = "customPosition")]
    pub custom_position: Option<SignatureBox>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreviewSignatureResponse {
    /// `data:application/pdf;base64,...`
    pub preview_pdf: String,
    pub position: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VisualSignatureRequest {
    pub signature: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default, alias = "customPosition")]
    pub custom_position: Option<SignatureBox>,
    /// Defaults to the caller's name.
    #[serde(default, alias = "signerName")]
    pub signer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VisualSignatureResponse {
    pub html: String,
    pub position: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentStats {
    pub total_documents: usize,
    pub pending_documents: usize,
    pub signed_documents: usize,
    pub expired_documents: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckSignedResponse {
    pub is_signed: bool,
    pub pdf_metadata: Option<PdfMetadata>,
    pub document: StoredDocument,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PdfMetadataResponse {
    pub is_valid: bool,
    pub metadata: Option<PdfMetadata>,
    pub document: StoredDocument,
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Load a document the caller may see.
fn load_for_participant(
    state: &AppState,
    document_id: &str,
    caller: &AuthenticatedCustomer,
) -> Result<StoredDocument, ApiError> {
    let document = DocumentRepository::new(&state.db)
        .get(document_id)?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    if !document.is_participant(&caller.id, &caller.email) {
        return Err(ApiError::forbidden("You do not have access to this document"));
    }
    Ok(document)
}

/// Load a document only its sender may act on.
fn load_for_sender(
    state: &AppState,
    document_id: &str,
    caller: &AuthenticatedCustomer,
) -> Result<StoredDocument, ApiError> {
    let document = DocumentRepository::new(&state.db)
        .get(document_id)?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    if document.sender_id != caller.id {
        return Err(ApiError::forbidden("Only the sender can do this"));
    }
    Ok(document)
}

/// Bytes of the newest artifact: the latest signed version, else the original.
fn current_pdf(state: &AppState, document: &StoredDocument) -> Result<Vec<u8>, ApiError> {
    let paths = state.files.paths();
    let path = match document.latest_version() {
        Some(version) => paths.document_version(&document.id, &version.file_name),
        None => paths.document_original(&document.id),
    };
    Ok(state.files.read_raw(path)?)
}

/// Keep a file name safe for paths and headers.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("document")
        .to_string()
}

/// Name of the file written for signed version `version`.
fn signed_file_name(document: &StoredDocument, version: u32, at: DateTime<Utc>) -> String {
    format!(
        "{}_signed_v{version}_{}.pdf",
        file_stem(&document.file_name),
        at.timestamp_millis()
    )
}

fn resolve_placement(
    position: Option<&str>,
    custom: Option<SignatureBox>,
) -> Result<SignaturePlacement, ApiError> {
    Ok(SignaturePlacement::resolve(
        position.unwrap_or(DEFAULT_POSITION),
        custom,
    )?)
}

/// Decode the signature and draw it onto `pdf` off the async runtime.
async fn render_signed_pdf(
    pdf: Vec<u8>,
    signature: String,
    placement: SignatureBox,
    signer: SignerInfo,
) -> Result<Vec<u8>, ApiError> {
    tokio::task::spawn_blocking(move || {
        let image = decode_signature_image(&signature)?;
        embed_signature(&pdf, Some(&image), placement, &signer)
    })
    .await
    .map_err(|e| ApiError::internal(format!("signing task failed: {e}")))?
    .map_err(ApiError::from)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}

// =============================================================================
// Handlers
// =============================================================================

/// Documents the caller sent or received, newest first.
#[utoipa::path(
    get,
    path = "/v1/esign/documents",
    tag = "e-Sign",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Documents", body = DocumentListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_documents(
    Auth(caller): Auth,
    State(state): State<AppState>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let data = DocumentRepository::new(&state.db).list_for_participant(&caller.id, &caller.email)?;
    Ok(Json(DocumentListResponse { data }))
}

/// Upload a PDF.
///
/// Multipart form with a `document` file part and an optional `name` part.
#[utoipa::path(
    post,
    path = "/v1/esign/upload",
    tag = "e-Sign",
    request_body(content_type = "multipart/form-data", description = "`document` PDF file, optional `name`"),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Document uploaded", body = StoredDocument),
        (status = 400, description = "Missing file or not a PDF"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File larger than 10 MB")
    )
)]
pub async fn upload(
    Auth(caller): Auth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(axum::http::StatusCode, Json<StoredDocument>), ApiError> {
    let mut display_name: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let part = field.name().map(str::to_owned);
        match part.as_deref() {
            Some("document") => {
                let is_pdf = field.content_type() == Some("application/pdf");
                if !is_pdf {
                    return Err(ApiError::bad_request("Only PDF files are allowed"));
                }
                let file_name = sanitize_file_name(field.file_name().unwrap_or("document.pdf"));
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::payload_too_large("File exceeds the 10 MB limit"));
                }
                file = Some((file_name, bytes.to_vec()));
            }
            Some("name") => {
                let text = field.text().await.map_err(multipart_error)?;
                display_name = Some(text.trim().to_string()).filter(|n| !n.is_empty());
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let validation = {
        let bytes = bytes.clone();
        tokio::task::spawn_blocking(move || validate_pdf(&bytes))
            .await
            .map_err(|e| ApiError::internal(format!("validation task failed: {e}")))?
    };
    if !validation.is_valid {
        return Err(ApiError::bad_request(format!(
            "Invalid PDF: {}",
            validation.error.unwrap_or_default()
        )));
    }

    let document = StoredDocument {
        id: new_uid("doc"),
        name: display_name.unwrap_or_else(|| file_name.clone()),
        file_name,
        sender_id: caller.id.clone(),
        sender_name: caller.name.clone(),
        sender_email: caller.email.clone(),
        recipient_email: None,
        message: None,
        status: DocumentStatus::Pending,
        file_size: validation.size,
        page_count: validation.page_count.unwrap_or_default(),
        uploaded_at: Utc::now(),
        sent_at: None,
        expires_at: None,
        signed_by: None,
        signer_name: None,
        signed_at: None,
        signature_position: None,
        signature_coordinates: None,
        signed_versions: Vec::new(),
    };

    state
        .files
        .write_new(state.files.paths().document_original(&document.id), &bytes)?;
    DocumentRepository::new(&state.db).create(&document)?;

    audit_log!(
        &state.files,
        AuditEventType::DocumentUploaded,
        caller,
        "document",
        document.id.clone()
    );
    info!(document_id = %document.id, size = document.file_size, "Document uploaded");

    Ok((axum::http::StatusCode::CREATED, Json(document)))
}

/// Send a document to a recipient for signature.
#[utoipa::path(
    post,
    path = "/v1/esign/send",
    tag = "e-Sign",
    request_body = SendDocumentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Document sent", body = StoredDocument),
        (status = 400, description = "Invalid email or document already signed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the sender"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn send(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Json(request): Json<SendDocumentRequest>,
) -> Result<Json<StoredDocument>, ApiError> {
    if !is_valid_email(&request.recipient_email) {
        return Err(ApiError::bad_request("Recipient email is invalid"));
    }

    let document = load_for_sender(&state, &request.document_id, &caller)?;

    let now = Utc::now();
    let recipient = request.recipient_email.trim().to_lowercase();
    let message = request
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let document = DocumentRepository::new(&state.db).modify(&document.id, |doc| {
        if doc.status == DocumentStatus::Signed {
            return Err(StoreError::InvalidState(
                "Document is already signed".to_string(),
            ));
        }
        doc.recipient_email = Some(recipient);
        doc.message = message;
        doc.status = DocumentStatus::Sent;
        doc.sent_at = Some(now);
        doc.expires_at = Some(now + Duration::days(SIGNING_WINDOW_DAYS));
        Ok(())
    })?;

    audit_log!(
        &state.files,
        AuditEventType::DocumentSent,
        caller,
        "document",
        document.id.clone()
    );

    Ok(Json(document))
}

/// Sign a document.
///
/// Writes a new signed version built on the latest one and records it.
#[utoipa::path(
    post,
    path = "/v1/esign/sign/{document_id}",
    tag = "e-Sign",
    params(("document_id" = String, Path, description = "Document id")),
    request_body = SignDocumentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Document signed", body = StoredDocument),
        (status = 400, description = "Not signable, bad image or bad placement"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No access"),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Document changed while signing")
    )
)]
pub async fn sign(
    Auth(caller): Auth,
    State(state): State<AppState>,
    UrlPath(document_id): UrlPath<String>,
    Json(request): Json<SignDocumentRequest>,
) -> Result<Json<StoredDocument>, ApiError> {
    // Held until the new version is recorded, so the next signer renders on it.
    let _signing = state.document_locks.acquire(&document_id).await;
    let document = load_for_participant(&state, &document_id, &caller)?;

    let now = Utc::now();
    if document.is_expired_at(now) {
        return Err(ApiError::bad_request("Document has expired"));
    }
    if !matches!(document.status, DocumentStatus::Sent | DocumentStatus::Signed) {
        return Err(ApiError::bad_request("Document is not available for signing"));
    }
    if request.signature.trim().is_empty() {
        return Err(ApiError::bad_request("Signature is required"));
    }

    let placement = resolve_placement(request.position.as_deref(), request.custom_position)?;
    let source = current_pdf(&state, &document)?;
    let signer = SignerInfo {
        name: caller.name.clone(),
        signed_on: now.date_naive(),
    };
    let signed =
        render_signed_pdf(source, request.signature, placement.signature_box(), signer).await?;

    let base_version = document.latest_version().map(|v| v.version);
    let version = document.next_version_number();
    let file_name = signed_file_name(&document, version, now);
    let version_path = state.files.paths().document_version(&document.id, &file_name);
    state.files.write_new(&version_path, &signed)?;

    let coordinates = match placement {
        SignaturePlacement::Custom(custom) => Some(SignatureCoordinates {
            x: custom.x,
            y: custom.y,
            width: custom.width,
            height: custom.height,
        }),
        _ => None,
    };
    let record = SignedVersion {
        version,
        file_name,
        signed_by: caller.id.clone(),
        signer_name: caller.name.clone(),
        signed_at: now,
    };
    let committed = DocumentRepository::new(&state.db).modify(&document.id, |doc| {
        if doc.latest_version().map(|v| v.version) != base_version {
            return Err(StoreError::Conflict(
                "Document was signed by someone else, please retry".to_string(),
            ));
        }
        if doc.is_expired_at(now) {
            return Err(StoreError::InvalidState("Document has expired".to_string()));
        }
        if !matches!(doc.status, DocumentStatus::Sent | DocumentStatus::Signed) {
            return Err(StoreError::InvalidState(
                "Document is not available for signing".to_string(),
            ));
        }
        doc.status = DocumentStatus::Signed;
        doc.signed_by = Some(record.signed_by.clone());
        doc.signer_name = Some(record.signer_name.clone());
        doc.signed_at = Some(now);
        doc.signature_position = Some(placement.name().to_string());
        doc.signature_coordinates = coordinates;
        doc.signed_versions.push(record);
        Ok(())
    });
    let document = match committed {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.files.delete(&version_path) {
                warn!(document_id = %document_id, error = %cleanup, "Failed to remove unrecorded signed version");
            }
            return Err(e.into());
        }
    };

    audit_log!(
        &state.files,
        AuditEventType::DocumentSigned,
        caller,
        "document",
        document.id.clone()
    );
    info!(document_id = %document.id, version, "Document signed");

    Ok(Json(document))
}

/// Download the latest signed version, or the original if unsigned.
#[utoipa::path(
    get,
    path = "/v1/esign/download/{document_id}",
    tag = "e-Sign",
    params(("document_id" = String, Path, description = "Document id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "PDF file", content_type = "application/pdf"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No access"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn download(
    Auth(caller): Auth,
    State(state): State<AppState>,
    UrlPath(document_id): UrlPath<String>,
) -> Result<Response, ApiError> {
    let document = load_for_participant(&state, &document_id, &caller)?;
    let bytes = current_pdf(&state, &document)?;

    let stem = file_stem(&sanitize_file_name(&document.name));
    let file_name = if document.latest_version().is_some() {
        format!("{stem}_signed.pdf")
    } else {
        format!("{stem}.pdf")
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Get one document.
#[utoipa::path(
    get,
    path = "/v1/esign/document/{document_id}",
    tag = "e-Sign",
    params(("document_id" = String, Path, description = "Document id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Document", body = StoredDocument),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No access"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn get_document(
    Auth(caller): Auth,
    State(state): State<AppState>,
    UrlPath(document_id): UrlPath<String>,
) -> Result<Json<StoredDocument>, ApiError> {
    Ok(Json(load_for_participant(&state, &document_id, &caller)?))
}

/// Delete a document and every file stored for it.
#[utoipa::path(
    delete,
    path = "/v1/esign/document/{document_id}",
    tag = "e-Sign",
    params(("document_id" = String, Path, description = "Document id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Document deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not the sender"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn delete_document(
    Auth(caller): Auth,
    State(state): State<AppState>,
    UrlPath(document_id): UrlPath<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let _signing = state.document_locks.acquire(&document_id).await;
    let document = load_for_sender(&state, &document_id, &caller)?;
    DocumentRepository::new(&state.db).delete(&document.id)?;

    if let Err(e) = state
        .files
        .delete_dir(state.files.paths().document_dir(&document.id))
    {
        warn!(document_id = %document.id, error = %e, "Failed to remove document files");
    }

    audit_log!(
        &state.files,
        AuditEventType::DocumentDeleted,
        caller,
        "document",
        document.id.clone()
    );

    Ok(Json(MessageResponse::new("Document deleted")))
}

/// Document counts by status.
#[utoipa::path(
    get,
    path = "/v1/esign/stats",
    tag = "e-Sign",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Document statistics", body = DocumentStats),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn stats(
    Auth(caller): Auth,
    State(state): State<AppState>,
) -> Result<Json<DocumentStats>, ApiError> {
    let documents =
        DocumentRepository::new(&state.db).list_for_participant(&caller.id, &caller.email)?;
    let count = |status: DocumentStatus| documents.iter().filter(|d| d.status == status).count();

    Ok(Json(DocumentStats {
        total_documents: documents.len(),
        pending_documents: count(DocumentStatus::Pending),
        signed_documents: count(DocumentStatus::Signed),
        expired_documents: count(DocumentStatus::Expired),
    }))
}

/// Preset signature position names.
#[utoipa::path(
    get,
    path = "/v1/esign/signature-positions",
    tag = "e-Sign",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Preset positions", body = Vec<String>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn signature_positions(Auth(_caller): Auth) -> Json<Vec<&'static str>> {
    Json(SignaturePlacement::PRESET_NAMES.to_vec())
}

/// Render a signed copy in memory without storing it.
#[utoipa::path(
    post,
    path = "/v1/esign/preview-signature",
    tag = "e-Sign",
    request_body = PreviewSignatureRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Preview PDF as a data URL", body = PreviewSignatureResponse),
        (status = 400, description = "Bad image or bad placement"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No access"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn preview_signature(
    Auth(caller): Auth,
    State(state): State<AppState>,
    Json(request): Json<PreviewSignatureRequest>,
) -> Result<Json<PreviewSignatureResponse>, ApiError> {
    let document = load_for_participant(&state, &request.document_id, &caller)?;
    let placement = resolve_placement(request.position.as_deref(), request.custom_position)?;
    let source = current_pdf(&state, &document)?;
    let signer = SignerInfo {
        name: caller.name.clone(),
        signed_on: Utc::now().date_naive(),
    };
    let preview =
        render_signed_pdf(source, request.signature, placement.signature_box(), signer).await?;

    Ok(Json(PreviewSignatureResponse {
        preview_pdf: format!("data:application/pdf;base64,{}", STANDARD.encode(preview)),
        position: placement.name().to_string(),
    }))
}

/// HTML snippet that overlays the signature on a page preview.
#[utoipa::path(
    post,
    path = "/v1/esign/visual-signature",
    tag = "e-Sign",
    request_body = VisualSignatureRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "HTML overlay", body = VisualSignatureResponse),
        (status = 400, description = "Bad placement"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn visual_signature(
    Auth(caller): Auth,
    Json(request): Json<VisualSignatureRequest>,
) -> Result<Json<VisualSignatureResponse>, ApiError> {
    let placement = resolve_placement(request.position.as_deref(), request.custom_position)?;
    let signer_name = request
        .signer_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(caller.name);

    let html = visual_signature_html(
        &request.signature,
        placement.signature_box(),
        &signer_name,
        Utc::now().date_naive(),
    );
    Ok(Json(VisualSignatureResponse {
        html,
        position: placement.name().to_string(),
    }))
}

/// Whether the latest signed version carries an embedded signature.
#[utoipa::path(
    get,
    path = "/v1/esign/check-signed/{document_id}",
    tag = "e-Sign",
    params(("document_id" = String, Path, description = "Document id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Signature check", body = CheckSignedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No access"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn check_signed(
    Auth(caller): Auth,
    State(state): State<AppState>,
    UrlPath(document_id): UrlPath<String>,
) -> Result<Json<CheckSignedResponse>, ApiError> {
    let document = load_for_participant(&state, &document_id, &caller)?;

    let latest = document.latest_version().map(|v| v.file_name.clone());
    let Some(file_name) = latest else {
        return Ok(Json(CheckSignedResponse {
            is_signed: false,
            pdf_metadata: None,
            document,
        }));
    };

    let bytes = state
        .files
        .read_raw(state.files.paths().document_version(&document.id, &file_name))?;
    let (signed, metadata) = tokio::task::spawn_blocking(move || {
        let signed = is_signed(&bytes)?;
        let metadata = if signed {
            Some(extract_metadata(&bytes)?)
        } else {
            None
        };
        Ok::<_, crate::pdf::PdfError>((signed, metadata))
    })
    .await
    .map_err(|e| ApiError::internal(format!("inspection task failed: {e}")))??;

    Ok(Json(CheckSignedResponse {
        is_signed: signed,
        pdf_metadata: metadata,
        document,
    }))
}

/// Validity and metadata of the original upload.
#[utoipa::path(
    get,
    path = "/v1/esign/pdf-metadata/{document_id}",
    tag = "e-Sign",
    params(("document_id" = String, Path, description = "Document id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "PDF metadata", body = PdfMetadataResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No access"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn pdf_metadata(
    Auth(caller): Auth,
    State(state): State<AppState>,
    UrlPath(document_id): UrlPath<String>,
) -> Result<Json<PdfMetadataResponse>, ApiError> {
    let document = load_for_participant(&state, &document_id, &caller)?;
    let bytes = state
        .files
        .read_raw(state.files.paths().document_original(&document.id))?;

    let (is_valid, metadata) = tokio::task::spawn_blocking(move || {
        if !validate_pdf(&bytes).is_valid {
            return (false, None);
        }
        (true, extract_metadata(&bytes).ok())
    })
    .await
    .map_err(|e| ApiError::internal(format!("inspection task failed: {e}")))?;

    Ok(Json(PdfMetadataResponse {
        is_valid,
        metadata,
        document,
    }))
}

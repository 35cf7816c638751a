// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only inspection of PDF files.

use lopdf::{Document, Object};
use serde::Serialize;
use utoipa::ToSchema;

use super::embedder::{inherited_attribute, load_pdf, owned_dictionary, resolve};
use super::{PdfError, SIGNATURE_RESOURCE_PREFIX};

/// Document information dictionary plus size figures.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PdfMetadata {
    pub size: u64,
    pub page_count: u32,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: Vec<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PdfValidation {
    pub is_valid: bool,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Whether the bytes parse as an unencrypted PDF with pages.
pub fn validate_pdf(bytes: &[u8]) -> PdfValidation {
    let size = bytes.len() as u64;
    match load_pdf(bytes) {
        Ok(document) => PdfValidation {
            is_valid: true,
            size,
            page_count: Some(page_count(&document)),
            error: None,
        },
        Err(e) => PdfValidation {
            is_valid: false,
            size,
            page_count: None,
            error: Some(e.to_string()),
        },
    }
}

fn page_count(document: &Document) -> u32 {
    u32::try_from(document.get_pages().len()).unwrap_or(u32::MAX)
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise Latin-1.
fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn info_string(document: &Document, info: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    match resolve(document, info.get(key).ok()?)? {
        Object::String(bytes, _) => {
            let text = decode_text(bytes).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

pub fn extract_metadata(bytes: &[u8]) -> Result<PdfMetadata, PdfError> {
    let document = load_pdf(bytes)?;
    let info = owned_dictionary(&document, document.trailer.get(b"Info").ok());
    let keywords = info_string(&document, &info, b"Keywords")
        .map(|raw| {
            raw.split([',', ';'])
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(PdfMetadata {
        size: bytes.len() as u64,
        page_count: page_count(&document),
        title: info_string(&document, &info, b"Title").unwrap_or_else(|| "Untitled".to_string()),
        author: info_string(&document, &info, b"Author").unwrap_or_else(|| "Unknown".to_string()),
        subject: info_string(&document, &info, b"Subject").unwrap_or_default(),
        keywords,
        creator: info_string(&document, &info, b"Creator"),
        producer: info_string(&document, &info, b"Producer"),
    })
}

/// Whether any page carries a signature image or caption font added by the embedder.
pub fn is_signed(bytes: &[u8]) -> Result<bool, PdfError> {
    let document = load_pdf(bytes)?;
    let prefix = SIGNATURE_RESOURCE_PREFIX.as_bytes();
    for page_id in document.get_pages().into_values() {
        let resources =
            owned_dictionary(&document, inherited_attribute(&document, page_id, b"Resources"));
        for category in [b"XObject".as_slice(), b"Font".as_slice()] {
            let entries = owned_dictionary(&document, resources.get(category).ok());
            if entries.iter().any(|(name, _)| name.starts_with(prefix)) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::sample_pdf;

    #[test]
    fn metadata_reads_info_dictionary() {
        let pdf = sample_pdf();
        let metadata = extract_metadata(&pdf).unwrap();
        assert_eq!(metadata.page_count, 1);
        assert_eq!(metadata.size, pdf.len() as u64);
        assert_eq!(metadata.title, "Lease");
        assert_eq!(metadata.author, "Asha Rao");
        assert_eq!(metadata.subject, "");
        assert_eq!(metadata.keywords, vec!["lease", "rent"]);
        assert!(metadata.producer.is_none());
    }

    #[test]
    fn validation_reports_errors() {
        let valid = validate_pdf(&sample_pdf());
        assert!(valid.is_valid);
        assert_eq!(valid.page_count, Some(1));

        let invalid = validate_pdf(b"%PDF-1.4 truncated");
        assert!(!invalid.is_valid);
        assert!(invalid.error.is_some());
    }

    #[test]
    fn unsigned_pdf_is_not_signed() {
        assert!(!is_signed(&sample_pdf()).unwrap());
    }

    #[test]
    fn utf16_strings_decode() {
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
        assert_eq!(decode_text(b"caf\xe9"), "café");
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decoding and sizing of hand-drawn signature images.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{imageops::FilterType, GenericImageView};

use super::PdfError;

pub const MAX_SIGNATURE_WIDTH: u32 = 300;
pub const MAX_SIGNATURE_HEIGHT: u32 = 150;

/// Raw 8-bit samples ready for a PDF image XObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureImage {
    pub width: u32,
    pub height: u32,
    /// Interleaved RGB, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
    /// One alpha byte per pixel.
    pub alpha: Vec<u8>,
}

/// The base64 payload of a raw string or a `data:image/...;base64,` URL.
fn base64_payload(input: &str) -> Result<String, PdfError> {
    let trimmed = input.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| PdfError::InvalidImage("data URL has no payload".to_string()))?;
            if !header.starts_with("image/") || !header.ends_with(";base64") {
                return Err(PdfError::InvalidImage(
                    "expected a base64 image data URL".to_string(),
                ));
            }
            payload
        }
        None => trimmed,
    };
    Ok(payload.chars().filter(|c| !c.is_ascii_whitespace()).collect())
}

/// Decode a signature and shrink it to fit 300x150, keeping its aspect ratio.
pub fn decode_signature_image(input: &str) -> Result<SignatureImage, PdfError> {
    let payload = base64_payload(input)?;
    if payload.is_empty() {
        return Err(PdfError::InvalidImage("signature is empty".to_string()));
    }
    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| PdfError::InvalidImage(format!("bad base64: {e}")))?;
    let decoded =
        image::load_from_memory(&bytes).map_err(|e| PdfError::InvalidImage(e.to_string()))?;

    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(PdfError::InvalidImage("image has no pixels".to_string()));
    }
    let fitted = if width > MAX_SIGNATURE_WIDTH || height > MAX_SIGNATURE_HEIGHT {
        decoded.resize(MAX_SIGNATURE_WIDTH, MAX_SIGNATURE_HEIGHT, FilterType::Triangle)
    } else {
        decoded
    };

    let rgba = fitted.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Ok(SignatureImage {
        width,
        height,
        rgb,
        alpha,
    })
}

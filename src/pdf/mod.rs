// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # PDF e-Signature
//!
//! Visual signatures are composited onto the first page of a document:
//!
//! 1. The signature image (base64 or `data:image/...;base64,` URL) is decoded
//!    and shrunk to fit 300x150 without enlargement.
//! 2. It is embedded as an RGB image XObject with an alpha soft mask and
//!    drawn inside the placement box.
//! 3. "Signed by" and "Date" lines are drawn under the box in 8pt Helvetica.
//!
//! Existing page content is wrapped in `q ... Q` before the overlay is
//! appended, and shared resource dictionaries are copied rather than edited.
//! The input bytes are never modified; every call returns a new PDF.

pub mod embedder;
pub mod inspect;
pub mod overlay;
pub mod signature_image;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use embedder::{embed_signature, load_pdf, SignerInfo};
pub use inspect::{extract_metadata, is_signed, validate_pdf, PdfMetadata, PdfValidation};
pub use overlay::visual_signature_html;
pub use signature_image::{decode_signature_image, SignatureImage};

/// Prefix of every resource name the embedder adds to a page.
pub const SIGNATURE_RESOURCE_PREFIX: &str = "WSig";

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("not a readable PDF: {0}")]
    Parse(String),

    #[error("encrypted PDFs are not supported")]
    Encrypted,

    #[error("PDF has no pages")]
    NoPages,

    #[error("invalid signature image: {0}")]
    InvalidImage(String),

    #[error("invalid signature placement: {0}")]
    InvalidPlacement(String),

    #[error("failed to write PDF: {0}")]
    Write(String),
}

/// A box in page-relative fractions, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SignatureBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SignatureBox {
    pub const BOTTOM_RIGHT: SignatureBox = SignatureBox::new(0.7, 0.1, 0.25, 0.15);
    pub const BOTTOM_LEFT: SignatureBox = SignatureBox::new(0.05, 0.1, 0.25, 0.15);
    pub const CENTER: SignatureBox = SignatureBox::new(0.35, 0.4, 0.3, 0.2);

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check the box is non-empty and lies inside the page.
    pub fn validate(&self) -> Result<(), PdfError> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PdfError::InvalidPlacement(
                "coordinates must be finite numbers".to_string(),
            ));
        }
        if self.x < 0.0 || self.y < 0.0 {
            return Err(PdfError::InvalidPlacement(
                "x and y must not be negative".to_string(),
            ));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(PdfError::InvalidPlacement(
                "width and height must be positive".to_string(),
            ));
        }
        // Small tolerance for fractions computed client-side.
        if self.x + self.width > 1.0 + 1e-4 || self.y + self.height > 1.0 + 1e-4 {
            return Err(PdfError::InvalidPlacement(
                "box must lie within the page".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a signature goes on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignaturePlacement {
    BottomRight,
    BottomLeft,
    Center,
    Custom(SignatureBox),
}

impl SignaturePlacement {
    /// Names accepted for preset positions.
    pub const PRESET_NAMES: [&'static str; 3] = ["bottomRight", "bottomLeft", "center"];

    /// Resolve a position name, using `custom` when the name is `"custom"`.
    pub fn resolve(position: &str, custom: Option<SignatureBox>) -> Result<Self, PdfError> {
        match position {
            "bottomRight" => Ok(Self::BottomRight),
            "bottomLeft" => Ok(Self::BottomLeft),
            "center" => Ok(Self::Center),
            "custom" => {
                let custom = custom.ok_or_else(|| {
                    PdfError::InvalidPlacement("custom position requires coordinates".to_string())
                })?;
                custom.validate()?;
                Ok(Self::Custom(custom))
            }
            other => Err(PdfError::InvalidPlacement(format!(
                "unknown position {other:?}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BottomRight => "bottomRight",
            Self::BottomLeft => "bottomLeft",
            Self::Center => "center",
            Self::Custom(_) => "custom",
        }
    }

    pub fn signature_box(&self) -> SignatureBox {
        match self {
            Self::BottomRight => SignatureBox::BOTTOM_RIGHT,
            Self::BottomLeft => SignatureBox::BOTTOM_LEFT,
            Self::Center => SignatureBox::CENTER,
            Self::Custom(custom) => *custom,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_resolve_by_name() {
        assert_eq!(
            SignaturePlacement::resolve("bottomRight", None).unwrap(),
            SignaturePlacement::BottomRight
        );
        assert_eq!(
            SignaturePlacement::resolve("center", None)
                .unwrap()
                .signature_box(),
            SignatureBox::CENTER
        );
        for name in SignaturePlacement::PRESET_NAMES {
            assert_eq!(SignaturePlacement::resolve(name, None).unwrap().name(), name);
        }
    }

    #[test]
    fn custom_placement_needs_valid_box() {
        assert!(SignaturePlacement::resolve("custom", None).is_err());

        let inside = SignatureBox::new(0.1, 0.1, 0.5, 0.2);
        assert_eq!(
            SignaturePlacement::resolve("custom", Some(inside)).unwrap(),
            SignaturePlacement::Custom(inside)
        );

        let overflowing = SignatureBox::new(0.8, 0.1, 0.5, 0.2);
        assert!(SignaturePlacement::resolve("custom", Some(overflowing)).is_err());

        let empty = SignatureBox::new(0.1, 0.1, 0.0, 0.2);
        assert!(SignaturePlacement::resolve("custom", Some(empty)).is_err());
    }

    #[test]
    fn unknown_position_is_rejected() {
        assert!(matches!(
            SignaturePlacement::resolve("topLeft", None),
            Err(PdfError::InvalidPlacement(_))
        ));
    }
}

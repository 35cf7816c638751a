// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Composites a visual signature onto the first page of a PDF.

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use super::{PdfError, SignatureBox, SignatureImage, SIGNATURE_RESOURCE_PREFIX};

/// US Letter, used when no MediaBox is found.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
const MAX_PAGE_TREE_DEPTH: usize = 32;
const CAPTION_FONT_SIZE: f32 = 8.0;
const CAPTION_GRAY: f32 = 0.5;

/// Who signed and when, for the caption under the signature.
#[derive(Debug, Clone)]
pub struct SignerInfo {
    pub name: String,
    pub signed_on: NaiveDate,
}

/// Parse a PDF, rejecting encrypted and page-less documents.
pub fn load_pdf(bytes: &[u8]) -> Result<Document, PdfError> {
    let document = Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;
    if document.is_encrypted() {
        return Err(PdfError::Encrypted);
    }
    if document.get_pages().is_empty() {
        return Err(PdfError::NoPages);
    }
    Ok(document)
}

/// Resolve one level of indirection.
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, following the `Parent` chain for inherited ones.
pub(crate) fn inherited_attribute<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(document, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

/// Owned copy of a (possibly indirect) dictionary entry, empty if absent.
pub(crate) fn owned_dictionary(document: &Document, object: Option<&Object>) -> Dictionary {
    object
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new)
}

fn media_box(document: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(values) = inherited_attribute(document, page_id, b"MediaBox")
        .and_then(|object| object.as_array().ok())
    else {
        return DEFAULT_MEDIA_BOX;
    };
    let numbers: Vec<f32> = values
        .iter()
        .filter_map(|value| resolve(document, value))
        .filter_map(|value| value.as_float().ok())
        .collect();
    match numbers.as_slice() {
        [x0, y0, x1, y1] if x1 > x0 && y1 > y0 => [*x0, *y0, *x1, *y1],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// First `{prefix}{n}` not already used as a key.
fn unused_name(dictionary: &Dictionary, prefix: &str) -> Vec<u8> {
    let mut n = 1u32;
    loop {
        let name = format!("{SIGNATURE_RESOURCE_PREFIX}{prefix}{n}");
        if !dictionary.has(name.as_bytes()) {
            return name.into_bytes();
        }
        n += 1;
    }
}

/// WinAnsi-safe caption text.
fn caption_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Flate-compress a stream; on failure it is stored raw, which is still valid.
fn compress_or_keep(stream: &mut Stream, what: &str) {
    if let Err(e) = stream.compress() {
        debug!(stream = what, error = %e, "Leaving PDF stream uncompressed");
    }
}

fn image_streams(image: &SignatureImage) -> (Stream, Stream) {
    let width = Object::Integer(i64::from(image.width));
    let height = Object::Integer(i64::from(image.height));

    let mut mask = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width.clone(),
            "Height" => height.clone(),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => Object::Integer(8),
        },
        image.alpha.clone(),
    );
    compress_or_keep(&mut mask, "signature mask");

    let mut rgb = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
        },
        image.rgb.clone(),
    );
    compress_or_keep(&mut rgb, "signature image");
    (rgb, mask)
}

fn caption_operations(font: &[u8], x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font.to_vec()), real(CAPTION_FONT_SIZE)],
        ),
        Operation::new("g", vec![real(CAPTION_GRAY)]),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new("Tj", vec![Object::string_literal(caption_text(text))]),
        Operation::new("ET", vec![]),
    ]
}

/// Draw the signature on the first page and return the new PDF bytes.
///
/// Without an image only the caption is drawn.
pub fn embed_signature(
    pdf: &[u8],
    image: Option<&SignatureImage>,
    placement: SignatureBox,
    signer: &SignerInfo,
) -> Result<Vec<u8>, PdfError> {
    placement.validate()?;
    let mut document = load_pdf(pdf)?;
    let page_id = *document
        .get_pages()
        .values()
        .next()
        .ok_or(PdfError::NoPages)?;

    let [x0, y0, x1, y1] = media_box(&document, page_id);
    let (page_width, page_height) = (x1 - x0, y1 - y0);
    let box_x = x0 + placement.x * page_width;
    let box_y = y0 + placement.y * page_height;
    let box_width = placement.width * page_width;
    let box_height = placement.height * page_height;

    let mut resources =
        owned_dictionary(&document, inherited_attribute(&document, page_id, b"Resources"));
    let mut xobjects = owned_dictionary(&document, resources.get(b"XObject").ok());
    let mut fonts = owned_dictionary(&document, resources.get(b"Font").ok());

    let current_contents = document
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Contents").ok())
        .cloned();
    let existing_contents: Vec<Object> = match current_contents {
        Some(Object::Array(items)) => items,
        Some(Object::Reference(id)) => vec![Object::Reference(id)],
        Some(Object::Stream(stream)) => vec![Object::Reference(document.add_object(stream))],
        _ => Vec::new(),
    };

    let mut operations = vec![Operation::new("Q", vec![])];

    if let Some(image) = image {
        let (rgb, mask) = image_streams(image);
        let mask_id = document.add_object(mask);
        let mut rgb = rgb;
        rgb.dict.set("SMask", Object::Reference(mask_id));
        let image_id = document.add_object(rgb);
        let image_name = unused_name(&xobjects, "Img");
        xobjects.set(image_name.clone(), Object::Reference(image_id));

        // Fit inside the box, keeping aspect ratio, centred.
        let scale = (box_width / image.width as f32).min(box_height / image.height as f32);
        let draw_width = image.width as f32 * scale;
        let draw_height = image.height as f32 * scale;
        let draw_x = box_x + (box_width - draw_width) / 2.0;
        let draw_y = box_y + (box_height - draw_height) / 2.0;

        operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(draw_width),
                    real(0.0),
                    real(0.0),
                    real(draw_height),
                    real(draw_x),
                    real(draw_y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(image_name)]),
            Operation::new("Q", vec![]),
        ]);
    }

    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let font_name = unused_name(&fonts, "F");
    fonts.set(font_name.clone(), Object::Reference(font_id));

    let caption_x = box_x + 2.0;
    let first_line_y = (box_y - 10.0).max(y0 + 2.0);
    let second_line_y = (box_y - 20.0).max(y0 + 2.0);
    operations.extend(caption_operations(
        &font_name,
        caption_x,
        first_line_y,
        &format!("Signed by: {}", signer.name),
    ));
    operations.extend(caption_operations(
        &font_name,
        caption_x,
        second_line_y,
        &format!("Date: {}", signer.signed_on.format("%Y-%m-%d")),
    ));

    let overlay = Content { operations }
        .encode()
        .map_err(|e| PdfError::Write(e.to_string()))?;
    let save_state_id = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut overlay_stream = Stream::new(Dictionary::new(), overlay);
    compress_or_keep(&mut overlay_stream, "signature overlay");
    let overlay_id = document.add_object(overlay_stream);

    let mut contents = Vec::with_capacity(existing_contents.len() + 2);
    contents.push(Object::Reference(save_state_id));
    contents.extend(existing_contents);
    contents.push(Object::Reference(overlay_id));

    resources.set("XObject", Object::Dictionary(xobjects));
    resources.set("Font", Object::Dictionary(fonts));

    let page = document
        .get_dictionary_mut(page_id)
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));

    let mut output = Vec::with_capacity(pdf.len() + 4096);
    document
        .save_to(&mut output)
        .map_err(|e| PdfError::Write(e.to_string()))?;
    Ok(output)
}

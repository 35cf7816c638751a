// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTML overlay used by clients to preview a signature over a rendered page.

use chrono::NaiveDate;

use super::SignatureBox;

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn percent(fraction: f32) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Standalone HTML page positioning the signature over the page area.
///
/// `signature` may be raw base64 PNG data or a full data URL.
pub fn visual_signature_html(
    signature: &str,
    placement: SignatureBox,
    signer_name: &str,
    date: NaiveDate,
) -> String {
    let signature = signature.trim();
    let source = if signature.starts_with("data:image/") {
        signature.to_string()
    } else {
        format!("data:image/png;base64,{signature}")
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<style>
  .signature-overlay {{
    position: absolute;
    left: {left};
    bottom: {bottom};
    width: {width};
    height: {height};
    z-index: 1000;
  }}
  .signature-image {{
    width: 100%;
    height: 100%;
    object-fit: contain;
  }}
  .signature-info {{
    position: absolute;
    bottom: -20px;
    left: 0;
    font-size: 10px;
    color: #666;
  }}
</style>
</head>
<body>
  <div class="signature-overlay">
    <img src="{source}" class="signature-image" />
    <div class="signature-info">Signed by: {signer} | Date: {date}</div>
  </div>
</body>
</html>
"#,
        left = percent(placement.x),
        bottom = percent(placement.y),
        width = percent(placement.width),
        height = percent(placement.height),
        source = escape_html(&source),
        signer = escape_html(signer_name),
        date = date.format("%Y-%m-%d"),
    )
}

//! Certificate and key material scanning.
//!
//! PEM inputs are split into their armored blocks, each block's base64
//! payload decoded to DER and routed through the byte/string engines with
//! the X.509 context flag set. Non-PEM inputs are scanned as a single DER
//! blob. Multi-block files name each record `<file>::block#<i>`.

use super::binary::scan_blob;
use crate::patterns::PatternCatalog;
use crate::types::Detection;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

const PEM_BEGIN: &str = "-----BEGIN ";
const PEM_END: &str = "-----END ";

/// PEM requires both sentinel lines somewhere in the buffer.
pub fn looks_like_pem(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(head);
    text.contains(PEM_BEGIN) && text.contains(PEM_END)
}

/// Scan certificate or key material (PEM or raw DER).
pub fn scan_certkey(display_path: &str, data: &[u8], catalog: &PatternCatalog) -> Vec<Detection> {
    if looks_like_pem(data) {
        let blocks = decode_pem_blocks(data);
        let multi = blocks.len() > 1;
        let mut out = Vec::new();
        for (i, der) in blocks.iter().enumerate() {
            let path = if multi {
                format!("{display_path}::block#{}", i + 1)
            } else {
                display_path.to_string()
            };
            out.extend(scan_blob(&path, der, catalog, true));
        }
        out
    } else {
        scan_blob(display_path, data, catalog, true)
    }
}

/// Decode every armored block's base64 payload. A block that fails to
/// decode is dropped; the others proceed.
pub fn decode_pem_blocks(data: &[u8]) -> Vec<Vec<u8>> {
    let text = String::from_utf8_lossy(data);
    let mut blocks = Vec::new();
    let mut payload: Option<String> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(PEM_BEGIN) {
            payload = Some(String::new());
            continue;
        }
        if trimmed.starts_with(PEM_END) {
            if let Some(body) = payload.take() {
                match STANDARD.decode(body.as_bytes()) {
                    Ok(der) if !der.is_empty() => blocks.push(der),
                    Ok(_) => {}
                    Err(e) => debug!("dropping undecodable PEM block: {e}"),
                }
            }
            continue;
        }
        if let Some(body) = payload.as_mut() {
            body.extend(trimmed.chars().filter(|c| !c.is_ascii_whitespace()));
        }
    }

    blocks
}

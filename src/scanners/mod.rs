//! Per-kind scanners and the content-type router.
//!
//! Routing is extension-first with a PEM content sniff on the first 4 KiB;
//! anything unrecognized falls back to the generic binary scan.

pub mod archive;
pub mod binary;
pub mod certkey;
pub mod class_file;
pub mod cpp;
pub mod java;
pub mod python;
pub mod source;

use std::path::Path;

/// Bytes sniffed from the head of a file for content-based routing.
pub const SNIFF_LEN: usize = 4096;

/// What a file routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Archive,
    ClassFile,
    JavaSource,
    PythonSource,
    /// `header` selects the tighter size gate for .h/.hpp/.hh
    CSource { header: bool },
    CertKey,
    Binary,
}

const CERT_EXTS: &[&str] = &[
    "pem", "crt", "cer", "der", "key", "csr", "p7b", "p7c", "p8", "pk8", "pfx", "p12", "spc",
];

/// Select the scanner for a file from its extension and sniffed head.
pub fn detect_content_kind(path: &Path, head: &[u8]) -> ContentKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "jar" | "zip" => return ContentKind::Archive,
        "class" => return ContentKind::ClassFile,
        "java" => return ContentKind::JavaSource,
        "py" => return ContentKind::PythonSource,
        "c" | "cc" | "cxx" | "cpp" | "ld" => return ContentKind::CSource { header: false },
        "h" | "hpp" | "hh" => return ContentKind::CSource { header: true },
        _ => {}
    }
    if CERT_EXTS.contains(&ext.as_str()) || certkey::looks_like_pem(head) {
        return ContentKind::CertKey;
    }
    ContentKind::Binary
}

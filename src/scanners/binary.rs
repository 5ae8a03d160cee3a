//! Generic binary scanning: printable-string extraction feeding the regex
//! set, plus the literal byte-needle search, over one raw buffer.

use crate::classify::{classify_byte, classify_text};
use crate::patterns::PatternCatalog;
use crate::search::{scan_bytes, scan_runs};
use crate::strings::{extract_ascii_runs, MIN_RUN_LEN};
use crate::types::Detection;

/// Scan one raw buffer. `in_x509` marks decoded certificate material and
/// feeds the weak-digest elevation in the classifier.
///
/// Text hits surface before byte hits (engine invocation order), each
/// group in ascending offset order.
pub fn scan_blob(
    display_path: &str,
    data: &[u8],
    catalog: &PatternCatalog,
    in_x509: bool,
) -> Vec<Detection> {
    let runs = extract_ascii_runs(data, MIN_RUN_LEN);

    let mut text_hits = scan_runs(&runs, &catalog.regexes);
    text_hits.sort_by_key(|h| h.offset);
    let mut byte_hits = scan_bytes(data, &catalog.bytes);
    byte_hits.sort_by_key(|h| h.offset);

    let mut out = Vec::with_capacity(text_hits.len() + byte_hits.len());
    for hit in text_hits {
        let (evidence, severity) = classify_text(&hit.pattern, in_x509);
        out.push(Detection {
            file: display_path.to_string(),
            offset_or_line: hit.offset as u64,
            pattern: hit.pattern,
            matched: hit.matched,
            evidence,
            severity,
        });
    }
    for hit in byte_hits {
        let (evidence, severity) = classify_byte(hit.kind);
        out.push(Detection {
            file: display_path.to_string(),
            offset_or_line: hit.offset as u64,
            pattern: hit.pattern,
            matched: hit.hex,
            evidence,
            severity,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::loader::load_from_str;
    use crate::types::{EvidenceType, Severity};

    fn catalog() -> PatternCatalog {
        load_from_str(
            r#"{
                "regex": [{"name": "RSA keyword", "pattern": "\\bRSA[-_ ]?\\d{3,4}\\b"}],
                "oids": [{"name": "rsaEncryption", "dotted": "1.2.840.113549.1.1.1",
                          "emit": ["DER"]}]
            }"#,
        )
    }

    #[test]
    fn text_hit_at_exact_offset() {
        let data = b"\x01\x02prefix RSA-2048 suffix";
        let hits = scan_blob("f.bin", data, &catalog(), false);
        let text = hits.iter().find(|d| d.evidence == EvidenceType::Text).unwrap();
        assert_eq!(text.offset_or_line, 9);
        assert_eq!(text.matched, "RSA-2048");
        assert_eq!(text.severity, Severity::Low);
    }

    #[test]
    fn der_needle_is_high_oid_evidence() {
        let mut data = vec![0u8; 5];
        data.extend([0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01]);
        let hits = scan_blob("f.bin", &data, &catalog(), false);
        let oid = hits.iter().find(|d| d.evidence == EvidenceType::Oid).unwrap();
        assert_eq!(oid.offset_or_line, 5);
        assert_eq!(oid.severity, Severity::High);
        assert_eq!(oid.matched, "06092A864886F70D010101");
    }

    #[test]
    fn text_precedes_bytes_in_output() {
        let mut data = b"RSA-4096 tail".to_vec();
        data.extend([0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01]);
        let hits = scan_blob("f.bin", &data, &catalog(), false);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].evidence, EvidenceType::Text);
        assert_eq!(hits[1].evidence, EvidenceType::Oid);
    }

    #[test]
    fn empty_catalog_empty_result() {
        let empty = crate::patterns::PatternCatalog::default();
        assert!(scan_blob("f.bin", b"RSA-2048", &empty, false).is_empty());
    }
}

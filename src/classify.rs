//! Severity and evidence-type classification, applied to every emission
//! between match and surfacing. This table is the single authority; the
//! scanners never hard-code severities beyond a rule's declared one.

use crate::patterns::ByteKind;
use crate::types::{EvidenceType, Severity};

const API_FAMILIES: &[&str] = &["OpenSSL", "CNG", "CAPI", "libgcrypt"];

/// Classify a regex hit from its algorithm label. `in_x509` is true when
/// the match came from decoded certificate or key material, which elevates
/// weak-digest hits.
pub fn classify_text(label: &str, in_x509: bool) -> (EvidenceType, Severity) {
    if label.contains("OID dotted") {
        return (EvidenceType::Oid, Severity::High);
    }
    if label.contains("PEM Header") {
        return (EvidenceType::Text, Severity::Med);
    }
    if API_FAMILIES.iter().any(|family| label.contains(family)) {
        return (EvidenceType::Text, Severity::Med);
    }
    if names_weak_digest(label) {
        let severity = if in_x509 { Severity::High } else { Severity::Med };
        return (EvidenceType::Text, severity);
    }
    (EvidenceType::Text, Severity::Low)
}

/// Classify a byte-needle hit from the needle's declared kind.
pub fn classify_byte(kind: ByteKind) -> (EvidenceType, Severity) {
    match kind {
        ByteKind::Oid | ByteKind::Asn1Oid => (EvidenceType::Oid, Severity::High),
        ByteKind::CurveParam => (EvidenceType::Curve, Severity::High),
        ByteKind::Prime => (EvidenceType::Prime, Severity::High),
        ByteKind::Const => (EvidenceType::Const, Severity::High),
        ByteKind::SigMd5 | ByteKind::SigSha1 => (EvidenceType::X509, Severity::High),
        ByteKind::Ascii => (EvidenceType::Bytes, Severity::Low),
        ByteKind::Bytes => (EvidenceType::Bytes, Severity::Med),
    }
}

fn names_weak_digest(label: &str) -> bool {
    let upper = label.to_ascii_uppercase();
    upper.contains("MD5") || upper.contains("SHA-1") || upper.contains("SHA1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_oid_text_is_high() {
        let (evidence, severity) = classify_text("RSA OID dotted", false);
        assert_eq!(evidence, EvidenceType::Oid);
        assert_eq!(severity, Severity::High);
    }

    #[test]
    fn pem_header_is_med_text() {
        assert_eq!(classify_text("PEM Header: RSA PRIVATE KEY", false),
                   (EvidenceType::Text, Severity::Med));
    }

    #[test]
    fn api_family_is_med_text() {
        assert_eq!(classify_text("OpenSSL RSA API", false).1, Severity::Med);
        assert_eq!(classify_text("libgcrypt cipher", false).1, Severity::Med);
    }

    #[test]
    fn weak_digest_elevated_in_x509_context() {
        assert_eq!(classify_text("MD5 digest", false).1, Severity::Med);
        assert_eq!(classify_text("MD5 digest", true).1, Severity::High);
        assert_eq!(classify_text("SHA-1 name", true).1, Severity::High);
    }

    #[test]
    fn plain_text_label_is_low() {
        assert_eq!(classify_text("RSA keyword", false), (EvidenceType::Text, Severity::Low));
    }

    #[test]
    fn byte_kinds_map_to_expected_buckets() {
        assert_eq!(classify_byte(ByteKind::Oid), (EvidenceType::Oid, Severity::High));
        assert_eq!(classify_byte(ByteKind::Asn1Oid), (EvidenceType::Oid, Severity::High));
        assert_eq!(classify_byte(ByteKind::CurveParam), (EvidenceType::Curve, Severity::High));
        assert_eq!(classify_byte(ByteKind::Prime), (EvidenceType::Prime, Severity::High));
        assert_eq!(classify_byte(ByteKind::Const), (EvidenceType::Const, Severity::High));
        assert_eq!(classify_byte(ByteKind::SigMd5), (EvidenceType::X509, Severity::High));
        assert_eq!(classify_byte(ByteKind::Ascii), (EvidenceType::Bytes, Severity::Low));
        assert_eq!(classify_byte(ByteKind::Bytes), (EvidenceType::Bytes, Severity::Med));
    }
}

//! Detection records and the cross-scanner de-duplication set.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Severity of a detection, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Med,
    High,
}

impl Severity {
    /// Parse the lowercase form used by the pattern catalog. Unknown or
    /// empty strings fall back to `Med`, matching the rule default.
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "info" => Self::Info,
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Med,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Med => "med",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a detection's evidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceType {
    /// Regex hit inside a printable-ASCII run
    Text,
    /// ASN.1 object identifier byte match
    Oid,
    /// Other raw byte-needle match
    Bytes,
    /// Call-site match in stripped source
    Ast,
    /// Constant-pool or instruction-level match in a compiled class
    Bytecode,
    /// Match inside decoded certificate/key material
    X509,
    /// Elliptic-curve parameter bytes
    Curve,
    /// Known prime (e.g. a published DH modulus)
    Prime,
    /// Algorithm constant table
    Const,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Oid => "oid",
            Self::Bytes => "bytes",
            Self::Ast => "ast",
            Self::Bytecode => "bytecode",
            Self::X509 => "x509",
            Self::Curve => "curve",
            Self::Prime => "prime",
            Self::Const => "const",
        }
    }

    /// True when `offset_or_line` carries a 1-based line number rather than
    /// a byte offset.
    pub fn position_is_line(&self) -> bool {
        matches!(self, Self::Ast | Self::Bytecode)
    }
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding: the only output of the pipeline.
///
/// `file` uses the canonical `<archive-path>::<entry-name>` form for archive
/// entries and `<file>::block#<i>` for multi-block PEM files.
/// `offset_or_line` is a byte offset, except for `ast`/`bytecode` evidence
/// where it is a 1-based line number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub file: String,
    pub offset_or_line: u64,
    /// Algorithm label from the pattern catalog
    pub pattern: String,
    /// Matched evidence: uppercase hex for byte needles, literal otherwise
    #[serde(rename = "match")]
    pub matched: String,
    pub evidence: EvidenceType,
    pub severity: Severity,
}

impl Detection {
    /// Stable key for cross-scanner de-duplication.
    ///
    /// Field equality is what matters; the `|` join mirrors the CSV column
    /// order so the key is also human-readable in logs.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.file, self.offset_or_line, self.pattern, self.matched, self.evidence
        )
    }
}

/// Options controlling a path scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Walk directories recursively (depth unbounded when true)
    pub recurse: bool,
    /// Open archives and scan entries individually
    pub deep_jar: bool,
}

/// Insertion-ordered duplicate suppressor used where the archive path fans
/// out multiple sub-scanners over the same bytes.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a record with this key is seen.
    pub fn admit(&mut self, detection: &Detection) -> bool {
        self.seen.insert(detection.dedup_key())
    }

    /// Filter a batch in place, keeping first occurrences in order.
    pub fn retain_new(&mut self, detections: &mut Vec<Detection>) {
        detections.retain(|d| self.seen.insert(d.dedup_key()));
    }
}

//! Pattern catalog loading.
//!
//! The catalog is a JSON document with `regex`, `bytes`, `oids` and `ast`
//! sections, resolved from the `CRYPTO_SCANNER_PATTERNS` environment
//! override, then `./patterns.json`, then `./config/patterns.json`. A
//! malformed entry is dropped with a warning; the load result remains
//! usable as a partial catalog. A missing catalog yields an empty catalog
//! with a non-empty error string.

use super::{oid, AstRule, ByteKind, BytePattern, PatternCatalog, RegexPattern, RuleKind, RuleLang};
use crate::types::Severity;
use regex::RegexBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the catalog location.
pub const PATTERNS_ENV: &str = "CRYPTO_SCANNER_PATTERNS";

const DEFAULT_CANDIDATES: &[&str] = &["patterns.json", "config/patterns.json"];

#[derive(Debug, Deserialize, Default)]
struct CatalogFile {
    #[serde(default)]
    regex: Vec<serde_json::Value>,
    #[serde(default)]
    bytes: Vec<serde_json::Value>,
    #[serde(default)]
    oids: Vec<serde_json::Value>,
    #[serde(default)]
    ast: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RegexEntry {
    name: String,
    pattern: String,
    #[serde(default = "default_true")]
    icase: bool,
}

#[derive(Debug, Deserialize)]
struct ByteEntry {
    name: String,
    hex: String,
    #[serde(rename = "type", default)]
    kind: ByteKind,
}

#[derive(Debug, Deserialize)]
struct OidEntry {
    name: String,
    dotted: String,
    #[serde(default)]
    emit: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AstRuleEntry {
    #[serde(default)]
    id: String,
    lang: RuleLang,
    kind: RuleKind,
    #[serde(default)]
    callee: String,
    #[serde(default)]
    callees: Vec<String>,
    #[serde(default)]
    arg_regex: Option<String>,
    #[serde(default)]
    arg_index: usize,
    #[serde(default)]
    kw: Option<String>,
    #[serde(default)]
    kw_value_regex: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    severity: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Load the catalog from the default resolution chain.
pub fn load_default() -> PatternCatalog {
    for candidate in candidate_paths() {
        if candidate.is_file() {
            return load_from_file(&candidate);
        }
    }
    PatternCatalog::unavailable(format!(
        "pattern JSON not found; tried ${PATTERNS_ENV}, ./patterns.json, ./config/patterns.json"
    ))
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(env_path) = std::env::var(PATTERNS_ENV) {
        if !env_path.is_empty() {
            candidates.push(PathBuf::from(env_path));
        }
    }
    candidates.extend(DEFAULT_CANDIDATES.iter().map(PathBuf::from));
    candidates
}

/// Load and compile a catalog from a specific file. Open or parse failures
/// produce an empty catalog carrying the error; bad entries are skipped.
pub fn load_from_file(path: &Path) -> PatternCatalog {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            return PatternCatalog::unavailable(format!("failed to open {}: {e}", path.display()))
        }
    };
    let file: CatalogFile = match serde_json::from_str(&text) {
        Ok(f) => f,
        Err(e) => {
            return PatternCatalog::unavailable(format!("invalid JSON in {}: {e}", path.display()))
        }
    };

    let mut catalog = compile(file);
    catalog.source_path = Some(path.to_path_buf());
    debug!(
        path = %path.display(),
        regexes = catalog.regexes.len(),
        bytes = catalog.bytes.len(),
        ast = catalog.ast_rules.len(),
        "pattern catalog loaded"
    );
    catalog
}

/// Compile a catalog from a JSON string (used by tests and embedders).
pub fn load_from_str(text: &str) -> PatternCatalog {
    match serde_json::from_str::<CatalogFile>(text) {
        Ok(file) => compile(file),
        Err(e) => PatternCatalog::unavailable(format!("invalid catalog JSON: {e}")),
    }
}

fn compile(file: CatalogFile) -> PatternCatalog {
    let mut catalog = PatternCatalog::default();

    for value in file.regex {
        let entry: RegexEntry = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping malformed regex entry: {e}");
                continue;
            }
        };
        match RegexBuilder::new(&entry.pattern)
            .case_insensitive(entry.icase)
            .build()
        {
            Ok(regex) => catalog.regexes.push(RegexPattern { name: entry.name, regex }),
            Err(e) => warn!("skipping bad regex '{}': {e}", entry.name),
        }
    }

    for value in file.bytes {
        let entry: ByteEntry = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping malformed bytes entry: {e}");
                continue;
            }
        };
        match parse_hex(&entry.hex) {
            Some(bytes) if !bytes.is_empty() => catalog.bytes.push(BytePattern {
                name: entry.name,
                bytes,
                kind: entry.kind,
            }),
            _ => warn!("skipping bad hex for '{}'", entry.name),
        }
    }

    for value in file.oids {
        let entry: OidEntry = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping malformed oid entry: {e}");
                continue;
            }
        };
        let emit = if entry.emit.is_empty() {
            vec!["DER".to_string(), "VAL".to_string()]
        } else {
            entry.emit
        };
        for form in emit {
            let compiled = if form.eq_ignore_ascii_case("DER") {
                oid::der_bytes(&entry.dotted).map(|b| (b, ByteKind::Oid, "DER"))
            } else if form.eq_ignore_ascii_case("VAL") {
                oid::value_bytes(&entry.dotted).map(|b| (b, ByteKind::Asn1Oid, "VAL"))
            } else {
                warn!("oid '{}': unknown emit form '{form}'", entry.name);
                continue;
            };
            match compiled {
                Ok((bytes, kind, tag)) => catalog.bytes.push(BytePattern {
                    name: format!("OID: {} ({}) [{tag}]", entry.name, entry.dotted),
                    bytes,
                    kind,
                }),
                Err(e) => {
                    warn!("oid '{}' parse error: {e}", entry.name);
                    break;
                }
            }
        }
    }

    for value in file.ast {
        let entry: AstRuleEntry = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping malformed ast rule: {e}");
                continue;
            }
        };
        match compile_rule(entry) {
            Ok(rule) => catalog.ast_rules.push(rule),
            Err(e) => warn!("{e}"),
        }
    }

    catalog
}

fn compile_rule(entry: AstRuleEntry) -> Result<AstRule, String> {
    let build_icase = |src: &str| {
        RegexBuilder::new(src)
            .case_insensitive(true)
            .build()
            .map_err(|e| format!("dropping rule '{}': bad regex: {e}", entry.id))
    };
    let arg_regex = entry.arg_regex.as_deref().map(build_icase).transpose()?;
    let kw_value_regex = entry.kw_value_regex.as_deref().map(build_icase).transpose()?;

    Ok(AstRule {
        id: entry.id,
        lang: entry.lang,
        kind: entry.kind,
        callee: entry.callee,
        callees: entry.callees,
        arg_regex,
        arg_index: entry.arg_index,
        kw: entry.kw,
        kw_value_regex,
        message: entry.message,
        severity: entry
            .severity
            .as_deref()
            .map(Severity::parse_or_default)
            .unwrap_or_default(),
    })
}

/// Parse a hex string into bytes. Tolerates `:`/`-`/space/`,` separators
/// and `0x` prefixes; odd-length input is rejected.
pub fn parse_hex(s: &str) -> Option<Vec<u8>> {
    let mut cleaned = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' | ':' | '-' | ',' | '\t' => {}
            '0' if matches!(chars.peek(), Some('x') | Some('X')) => {
                chars.next();
            }
            _ => cleaned.push(c),
        }
    }
    if cleaned.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(cleaned.len() / 2);
    let raw = cleaned.as_bytes();
    for pair in raw.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push((hi * 16 + lo) as u8);
    }
    Some(out)
}

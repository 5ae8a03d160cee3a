//! The typed pattern catalog: regexes over printable strings, literal byte
//! needles, OID entries compiled to DER/VAL byte forms, and syntactic rules
//! for the source and bytecode scanners.
//!
//! Patterns are loaded once at scanner construction and are immutable for
//! the scanner's lifetime.

pub mod loader;
pub mod oid;

use crate::types::Severity;
use regex::Regex;
use serde::Deserialize;

/// A named, case-insensitive regex applied to printable-ASCII runs.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    pub name: String,
    pub regex: Regex,
}

/// Classification of a byte needle, used by the severity classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum ByteKind {
    #[serde(rename = "oid")]
    Oid,
    #[serde(rename = "asn1-oid")]
    Asn1Oid,
    #[serde(rename = "curve_param")]
    CurveParam,
    #[serde(rename = "prime")]
    Prime,
    #[serde(rename = "const")]
    Const,
    #[serde(rename = "ascii")]
    Ascii,
    #[default]
    #[serde(rename = "bytes")]
    Bytes,
    #[serde(rename = "sig_md5")]
    SigMd5,
    #[serde(rename = "sig_sha1")]
    SigSha1,
}

/// A literal byte needle searched over raw buffers.
#[derive(Debug, Clone)]
pub struct BytePattern {
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: ByteKind,
}

/// Language a syntactic rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RuleLang {
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "cpp")]
    Cpp,
}

/// Shape of a syntactic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RuleKind {
    /// Any callee from `callees` matched as a call site
    #[serde(rename = "call")]
    Call,
    /// Single dotted callee matched as a call site
    #[serde(rename = "call_fullname")]
    CallFullname,
    /// Callee plus first-argument regex check
    #[serde(rename = "call_fullname+arg")]
    CallFullnameArg,
    /// Callee plus integer literal at `arg_index` (Python)
    #[serde(rename = "call_fullname+intarg")]
    CallFullnameIntArg,
    /// Callee plus keyword-argument value check (Python)
    #[serde(rename = "call_fullname+kwcheck")]
    CallFullnameKwCheck,
    /// Java constructor call, optional argument check
    #[serde(rename = "ctor_call")]
    CtorCall,
    /// Method reference in compiled classes (bytecode scanner)
    #[serde(rename = "method_call")]
    MethodCall,
    /// C/C++ keysize heuristic: first integer >= 100 near the call
    #[serde(rename = "call_bits")]
    CallBits,
}

/// A compiled syntactic rule.
#[derive(Debug, Clone)]
pub struct AstRule {
    pub id: String,
    pub lang: RuleLang,
    pub kind: RuleKind,
    /// Dotted callee for single-callee kinds
    pub callee: String,
    /// Callee list for `Call`
    pub callees: Vec<String>,
    /// First-argument check, case-insensitive
    pub arg_regex: Option<Regex>,
    /// Positional argument index for `CallFullnameIntArg`
    pub arg_index: usize,
    /// Keyword name for `CallFullnameKwCheck`
    pub kw: Option<String>,
    pub kw_value_regex: Option<Regex>,
    /// Algorithm label carried into detections; falls back to `id`
    pub message: String,
    pub severity: Severity,
}

impl AstRule {
    /// The algorithm label emitted for this rule.
    pub fn label(&self) -> &str {
        if self.message.is_empty() {
            &self.id
        } else {
            &self.message
        }
    }
}

/// The immutable pattern catalog shared by every scanner.
#[derive(Debug, Default)]
pub struct PatternCatalog {
    pub regexes: Vec<RegexPattern>,
    pub bytes: Vec<BytePattern>,
    pub ast_rules: Vec<AstRule>,
    /// Where the catalog was loaded from, when a file resolved
    pub source_path: Option<std::path::PathBuf>,
    /// Non-empty when the catalog could not be (fully) loaded
    pub error: Option<String>,
}

impl PatternCatalog {
    /// An empty catalog with an error note: the scanner stays operable but
    /// yields no matches.
    pub fn unavailable<S: Into<String>>(error: S) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regexes.is_empty() && self.bytes.is_empty() && self.ast_rules.is_empty()
    }

    /// Rules for one language, in catalog order.
    pub fn rules_for(&self, lang: RuleLang) -> impl Iterator<Item = &AstRule> {
        self.ast_rules.iter().filter(move |r| r.lang == lang)
    }
}

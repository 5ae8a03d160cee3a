//! C/C++ source scanning. Plain-identifier call sites plus the keysize
//! heuristic used for keygen APIs that take the modulus size inline.

use super::source::{c_call_regex, clean_source, extract_first_arg, line_at, FirstArg, SourceLang};
use crate::patterns::{AstRule, PatternCatalog, RuleKind, RuleLang};
use crate::types::{Detection, EvidenceType};
use regex::Regex;

/// Window after a call site searched for a keysize integer.
const BITS_WINDOW: usize = 96;

/// Scan C/C++ source text.
pub fn scan_source(display_path: &str, code: &str, catalog: &PatternCatalog) -> Vec<Detection> {
    let cleaned = clean_source(code, SourceLang::C);
    let int_rx = Regex::new(r"\b(\d{3,5})\b").expect("static keysize regex");
    let mut out = Vec::new();

    for rule in catalog.rules_for(RuleLang::Cpp) {
        match rule.kind {
            RuleKind::Call => {
                for callee in &rule.callees {
                    let Some(rx) = c_call_regex(callee) else { continue };
                    for m in rx.find_iter(&cleaned) {
                        push(&mut out, display_path, &cleaned, m.start(), rule, callee.clone());
                    }
                }
            }
            RuleKind::CallFullname => {
                let Some(rx) = c_call_regex(&rule.callee) else { continue };
                for m in rx.find_iter(&cleaned) {
                    push(&mut out, display_path, &cleaned, m.start(), rule, rule.callee.clone());
                }
            }
            RuleKind::CallFullnameArg => {
                let Some(rx) = c_call_regex(&rule.callee) else { continue };
                for m in rx.find_iter(&cleaned) {
                    check_arg(&mut out, display_path, code, &cleaned, m.start(), rule);
                }
            }
            RuleKind::CallBits => {
                let Some(rx) = c_call_regex(&rule.callee) else { continue };
                for m in rx.find_iter(&cleaned) {
                    check_bits(&mut out, display_path, &cleaned, m.start(), rule, &int_rx);
                }
            }
            _ => {}
        }
    }

    out
}

fn check_arg(
    out: &mut Vec<Detection>,
    display_path: &str,
    original: &str,
    cleaned: &str,
    call_pos: usize,
    rule: &AstRule,
) {
    let Some(arg_rx) = rule.arg_regex.as_ref() else { return };
    let Some(arg) = extract_first_arg(original, call_pos) else { return };
    let value = match arg {
        FirstArg::Str(s) | FirstArg::Int(s) => s,
        FirstArg::Ident(_) => return,
    };
    if arg_rx.is_match(&value) {
        push(out, display_path, cleaned, call_pos, rule, value);
    }
}

/// Keysize heuristic: first decimal literal >= 100 within a small window
/// after the call site becomes the evidence.
fn check_bits(
    out: &mut Vec<Detection>,
    display_path: &str,
    cleaned: &str,
    call_pos: usize,
    rule: &AstRule,
    int_rx: &Regex,
) {
    let end = (call_pos + BITS_WINDOW).min(cleaned.len());
    let window = &cleaned[call_pos..end];
    for caps in int_rx.captures_iter(window) {
        let digits = &caps[1];
        if digits.parse::<u32>().map(|v| v >= 100).unwrap_or(false) {
            push(out, display_path, cleaned, call_pos, rule, digits.to_string());
            return;
        }
    }
}

fn push(
    out: &mut Vec<Detection>,
    display_path: &str,
    cleaned: &str,
    pos: usize,
    rule: &AstRule,
    matched: String,
) {
    out.push(Detection {
        file: display_path.to_string(),
        offset_or_line: line_at(cleaned, pos),
        pattern: rule.label().to_string(),
        matched,
        evidence: EvidenceType::Ast,
        severity: rule.severity,
    });
}

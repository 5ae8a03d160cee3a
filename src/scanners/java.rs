//! Java source scanning: call-site rules over comment-stripped text, with
//! string-constant folding for bare-identifier arguments.

use super::source::{
    callee_regex, clean_source, extract_first_arg, java_string_constants, line_at, FirstArg,
    SourceLang,
};
use crate::patterns::{AstRule, PatternCatalog, RuleKind, RuleLang};
use crate::types::{Detection, EvidenceType};
use std::collections::HashMap;

/// Scan Java source text. `display_path` is carried into detections and
/// may already be an `archive::entry` form.
pub fn scan_source(display_path: &str, code: &str, catalog: &PatternCatalog) -> Vec<Detection> {
    let cleaned = clean_source(code, SourceLang::Java);
    let constants = java_string_constants(&cleaned, code);
    let mut out = Vec::new();

    for rule in catalog.rules_for(RuleLang::Java) {
        match rule.kind {
            RuleKind::Call => {
                for callee in &rule.callees {
                    let Some(rx) = callee_regex(callee, false) else { continue };
                    for m in rx.find_iter(&cleaned) {
                        push(&mut out, display_path, &cleaned, m.start(), rule, callee.clone());
                    }
                }
            }
            RuleKind::CallFullname => {
                let Some(rx) = callee_regex(&rule.callee, false) else { continue };
                for m in rx.find_iter(&cleaned) {
                    push(&mut out, display_path, &cleaned, m.start(), rule, rule.callee.clone());
                }
            }
            RuleKind::CallFullnameArg => {
                let Some(rx) = callee_regex(&rule.callee, false) else { continue };
                for m in rx.find_iter(&cleaned) {
                    check_arg(&mut out, display_path, code, &cleaned, m.start(), rule, &constants);
                }
            }
            RuleKind::CtorCall => {
                let Some(rx) = callee_regex(&rule.callee, true) else { continue };
                for m in rx.find_iter(&cleaned) {
                    if rule.arg_regex.is_some() {
                        check_arg(&mut out, display_path, code, &cleaned, m.start(), rule, &constants);
                    } else {
                        push(&mut out, display_path, &cleaned, m.start(), rule, rule.callee.clone());
                    }
                }
            }
            _ => {}
        }
    }

    out
}

/// Resolve the first argument (folding identifiers through collected
/// string constants) and emit when it satisfies the rule's `arg_regex`.
fn check_arg(
    out: &mut Vec<Detection>,
    display_path: &str,
    original: &str,
    cleaned: &str,
    call_pos: usize,
    rule: &AstRule,
    constants: &HashMap<String, String>,
) {
    let Some(arg_rx) = rule.arg_regex.as_ref() else { return };
    let Some(arg) = extract_first_arg(original, call_pos) else { return };
    let value = match arg {
        FirstArg::Str(s) | FirstArg::Int(s) => s,
        FirstArg::Ident(name) => match constants.get(&name) {
            Some(folded) => folded.clone(),
            None => return,
        },
    };
    if arg_rx.is_match(&value) {
        push(out, display_path, cleaned, call_pos, rule, value);
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

//! Python source scanning. Adds the integer-argument and keyword-argument
//! rule kinds on top of the shared call-site machinery.

use super::source::{
    call_args, callee_regex, clean_source, extract_first_arg, line_at, FirstArg, SourceLang,
};
use crate::patterns::{AstRule, PatternCatalog, RuleKind, RuleLang};
use crate::types::{Detection, EvidenceType};
use regex::Regex;

/// Scan Python source text.
pub fn scan_source(display_path: &str, code: &str, catalog: &PatternCatalog) -> Vec<Detection> {
    let cleaned = clean_source(code, SourceLang::Python);
    let mut out = Vec::new();

    for rule in catalog.rules_for(RuleLang::Python) {
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
                    check_first_arg(&mut out, display_path, code, &cleaned, m.start(), rule);
                }
            }
            RuleKind::CallFullnameIntArg => {
                let Some(rx) = callee_regex(&rule.callee, false) else { continue };
                for m in rx.find_iter(&cleaned) {
                    check_int_arg(&mut out, display_path, code, &cleaned, m.start(), rule);
                }
            }
            RuleKind::CallFullnameKwCheck => {
                let Some(rx) = callee_regex(&rule.callee, false) else { continue };
                for m in rx.find_iter(&cleaned) {
                    check_keyword(&mut out, display_path, code, &cleaned, m.start(), rule);
                }
            }
            _ => {}
        }
    }

    out
}

fn check_first_arg(
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

/// Emit when the argument at the rule's index is a bare integer literal.
fn check_int_arg(
    out: &mut Vec<Detection>,
    display_path: &str,
    original: &str,
    cleaned: &str,
    call_pos: usize,
    rule: &AstRule,
) {
    let Some(args) = call_args(original, call_pos) else { return };
    let Some(arg) = args.get(rule.arg_index) else { return };
    if !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit()) {
        push(out, display_path, cleaned, call_pos, rule, arg.clone());
    }
}

/// Resolve the named keyword argument to a Name/Attribute chain and test
/// it against `kw_value_regex`. When the keyword is absent, bare
/// Name/Attribute positional arguments are tested instead, so idioms like
/// `AES.new(key, AES.MODE_ECB)` are still caught.
fn check_keyword(
    out: &mut Vec<Detection>,
    display_path: &str,
    original: &str,
    cleaned: &str,
    call_pos: usize,
    rule: &AstRule,
) {
    let Some(value_rx) = rule.kw_value_regex.as_ref() else { return };
    let kw = rule.kw.as_deref().unwrap_or("mode");
    let Some(args) = call_args(original, call_pos) else { return };

    let chain = name_chain_regex();
    for arg in &args {
        if let Some(rest) = keyword_value(arg, kw) {
            if chain.is_match(rest) && value_rx.is_match(rest) {
                push(out, display_path, cleaned, call_pos, rule, rest.to_string());
            }
            return;
        }
    }
    for arg in &args {
        if chain.is_match(arg) && value_rx.is_match(arg) {
            push(out, display_path, cleaned, call_pos, rule, arg.clone());
            return;
        }
    }
}

/// `kw = value` with a single `=` (not `==`). Returns the trimmed value.
fn keyword_value<'a>(arg: &'a str, kw: &str) -> Option<&'a str> {
    let rest = arg.strip_prefix(kw)?.trim_start();
    let rest = rest.strip_prefix('=')?;
    if rest.starts_with('=') {
        return None;
    }
    Some(rest.trim())
}

fn name_chain_regex() -> Regex {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("static name-chain regex")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::loader::load_from_str;

    fn catalog() -> PatternCatalog {
        load_from_str(
            r#"{"ast": [
                {"id": "py-md5", "lang": "python", "kind": "call_fullname",
                 "callee": "hashlib.md5", "message": "MD5 via hashlib"},
                {"id": "py-weak-new", "lang": "python", "kind": "call_fullname+arg",
                 "callee": "hashlib.new", "arg_regex": "^(md5|sha1)$",
                 "message": "Weak digest via hashlib.new"},
                {"id": "py-ecb", "lang": "python", "kind": "call_fullname+kwcheck",
                 "callee": "Crypto.Cipher.AES.new", "kw": "mode",
                 "kw_value_regex": "MODE_ECB", "message": "AES in ECB mode"},
                {"id": "py-rsa-bits", "lang": "python", "kind": "call_fullname+intarg",
                 "callee": "rsa.newkeys", "arg_index": 0, "message": "RSA keygen bits"}
            ]}"#,
        )
    }

    #[test]
    fn fullname_call_detected_with_line() {
        let code = "import hashlib\n\nh = hashlib.md5()\n";
        let hits = scan_source("a.py", code, &catalog());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].offset_or_line, 3);
        assert_eq!(hits[0].pattern, "MD5 via hashlib");
    }

    #[test]
    fn call_inside_comment_or_string_ignored() {
        let code = "# hashlib.md5()\ns = 'hashlib.md5()'\nd = \"\"\"hashlib.md5()\"\"\"\n";
        assert!(scan_source("a.py", code, &catalog()).is_empty());
    }

    #[test]
    fn arg_rule_matches_literal() {
        let code = "hashlib.new('sha1')\nhashlib.new('blake2b')\n";
        let hits = scan_source("a.py", code, &catalog());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched, "sha1");
    }

    #[test]
    fn kwcheck_matches_keyword_form() {
        let code = "c = Crypto.Cipher.AES.new(key, mode=AES.MODE_ECB)\n";
        let hits = scan_source("a.py", code, &catalog());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched, "AES.MODE_ECB");
    }

    #[test]
    fn kwcheck_falls_back_to_positional_attribute() {
        let code = "c = Crypto.Cipher.AES.new(key, AES.MODE_ECB)\n";
        let hits = scan_source("a.py", code, &catalog());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched, "AES.MODE_ECB");
    }

    #[test]
    fn kwcheck_ignores_safe_mode() {
        let code = "c = Crypto.Cipher.AES.new(key, AES.MODE_GCM)\n";
        assert!(scan_source("a.py", code, &catalog()).is_empty());
    }

    #[test]
    fn intarg_requires_integer_literal() {
        let hits = scan_source("a.py", "rsa.newkeys(1024)\n", &catalog());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched, "1024");
        assert!(scan_source("a.py", "rsa.newkeys(bits)\n", &catalog()).is_empty());
    }
}

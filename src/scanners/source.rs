//! Shared machinery for the per-language source scanners.
//!
//! Each language gets a cleaning pre-pass that blanks comments and string
//! literal contents with spaces. Newlines and byte positions are preserved,
//! so line numbers computed on the cleaned buffer match the original and
//! call-site offsets can index back into the original text (which is where
//! literal arguments are read from).

use regex::Regex;
use std::collections::HashMap;

/// Language selector for the cleaning pre-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLang {
    C,
    Java,
    Python,
}

/// Blank comments and string-literal contents, preserving newlines and
/// byte positions. Quote characters survive so the argument extractor can
/// still find literal boundaries in the original buffer.
pub fn clean_source(code: &str, lang: SourceLang) -> String {
    match lang {
        SourceLang::C | SourceLang::Java => clean_c_like(code, lang == SourceLang::C),
        SourceLang::Python => clean_python(code),
    }
}

fn blank(out: &mut Vec<u8>, byte: u8) {
    out.push(if byte == b'\n' { b'\n' } else { b' ' });
}

fn clean_c_like(code: &str, strip_preprocessor: bool) -> String {
    let bytes = code.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied().unwrap_or(0);
        if c == b'/' && next == b'/' {
            while i < bytes.len() && bytes[i] != b'\n' {
                out.push(b' ');
                i += 1;
            }
        } else if c == b'/' && next == b'*' {
            out.push(b' ');
            out.push(b' ');
            i += 2;
            while i < bytes.len() {
                if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    out.push(b' ');
                    out.push(b' ');
                    i += 2;
                    break;
                }
                blank(&mut out, bytes[i]);
                i += 1;
            }
        } else if strip_preprocessor && c == b'#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                out.push(b' ');
                i += 1;
            }
        } else if c == b'"' || c == b'\'' {
            let quote = c;
            out.push(quote);
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'\\' {
                    blank(&mut out, bytes[i]);
                    if i + 1 < bytes.len() {
                        blank(&mut out, bytes[i + 1]);
                    }
                    i += 2;
                    continue;
                }
                if bytes[i] == quote {
                    out.push(quote);
                    i += 1;
                    break;
                }
                blank(&mut out, bytes[i]);
                i += 1;
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    // Cleaning only writes ASCII or original single-byte chars; multi-byte
    // UTF-8 sequences pass through untouched outside literals.
    String::from_utf8_lossy(&out).into_owned()
}

fn clean_python(code: &str) -> String {
    let bytes = code.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                out.push(b' ');
                i += 1;
            }
        } else if c == b'"' || c == b'\'' {
            let quote = c;
            let triple = bytes[i..].starts_with(&[quote, quote, quote]);
            if triple {
                out.extend_from_slice(&[quote, quote, quote]);
                i += 3;
                while i < bytes.len() {
                    if bytes[i..].starts_with(&[quote, quote, quote]) {
                        out.extend_from_slice(&[quote, quote, quote]);
                        i += 3;
                        break;
                    }
                    blank(&mut out, bytes[i]);
                    i += 1;
                }
            } else {
                out.push(quote);
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' {
                        blank(&mut out, bytes[i]);
                        if i + 1 < bytes.len() {
                            blank(&mut out, bytes[i + 1]);
                        }
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote || bytes[i] == b'\n' {
                        out.push(bytes[i]);
                        i += 1;
                        break;
                    }
                    blank(&mut out, bytes[i]);
                    i += 1;
                }
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Build the call-site matcher for a dotted callee: word-boundaried name
/// parts joined by `\s*\.\s*`, followed by `\s*\(`. `ctor` prepends Java's
/// `new` keyword.
pub fn callee_regex(callee: &str, ctor: bool) -> Option<Regex> {
    let mut rx = String::from(if ctor { r"\bnew\s+" } else { r"\b" });
    for ch in callee.chars() {
        if ch == '.' {
            rx.push_str(r"\s*\.\s*");
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            rx.push(ch);
        } else {
            // $ (inner classes) and anything else taken literally
            rx.push('\\');
            rx.push(ch);
        }
    }
    rx.push_str(r"\s*\(");
    Regex::new(&rx).ok()
}

/// Build the C-style call matcher: `\b<name>\s*\(`.
pub fn c_call_regex(name: &str) -> Option<Regex> {
    let escaped: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch.to_string()
            } else {
                format!("\\{ch}")
            }
        })
        .collect();
    Regex::new(&format!(r"\b{escaped}\s*\(")).ok()
}

/// First argument of a call site, read from the original buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstArg {
    /// String literal, unescaped
    Str(String),
    /// Bare integer literal digits
    Int(String),
    /// Bare identifier (dotted chains included), candidate for constant
    /// folding
    Ident(String),
}

impl FirstArg {
    pub fn as_text(&self) -> &str {
        match self {
            Self::Str(s) | Self::Int(s) | Self::Ident(s) => s,
        }
    }
}

/// Extract the first argument after the opening paren of the call matched
/// at `call_pos`. Returns `None` when the argument is not a literal or
/// identifier.
pub fn extract_first_arg(original: &str, call_pos: usize) -> Option<FirstArg> {
    let bytes = original.as_bytes();
    let mut p = original[call_pos..].find('(')? + call_pos + 1;
    while p < bytes.len() && bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    if p >= bytes.len() {
        return None;
    }
    match bytes[p] {
        b'"' | b'\'' => read_string_literal(original, p).map(FirstArg::Str),
        b'0'..=b'9' => {
            let start = p;
            while p < bytes.len() && bytes[p].is_ascii_digit() {
                p += 1;
            }
            Some(FirstArg::Int(original[start..p].to_string()))
        }
        b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'$' => {
            let start = p;
            while p < bytes.len()
                && (bytes[p].is_ascii_alphanumeric()
                    || bytes[p] == b'_'
                    || bytes[p] == b'$'
                    || bytes[p] == b'.')
            {
                p += 1;
            }
            Some(FirstArg::Ident(original[start..p].to_string()))
        }
        _ => None,
    }
}

/// Read a quoted literal starting at `quote_pos`, honoring `\` escapes.
/// Returns the unescaped content.
pub fn read_string_literal(original: &str, quote_pos: usize) -> Option<String> {
    let bytes = original.as_bytes();
    let quote = *bytes.get(quote_pos)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let mut value = String::new();
    let mut p = quote_pos + 1;
    while p < bytes.len() {
        let c = bytes[p];
        if c == b'\\' && p + 1 < bytes.len() {
            value.push(bytes[p + 1] as char);
            p += 2;
            continue;
        }
        if c == quote {
            return Some(value);
        }
        value.push(c as char);
        p += 1;
    }
    None
}

/// Split the argument list of the call matched at `call_pos` into trimmed
/// top-level segments, respecting nesting and quotes. Returns `None` when
/// the parens never balance.
pub fn call_args(original: &str, call_pos: usize) -> Option<Vec<String>> {
    let bytes = original.as_bytes();
    let open = original[call_pos..].find('(')? + call_pos;
    let mut depth = 0usize;
    let mut args = Vec::new();
    let mut current = String::new();
    let mut p = open;
    while p < bytes.len() {
        let c = bytes[p];
        match c {
            b'(' | b'[' | b'{' => {
                depth += 1;
                if depth > 1 {
                    current.push(c as char);
                }
            }
            b')' | b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() || !args.is_empty() {
                        args.push(trimmed.to_string());
                    }
                    return Some(args);
                }
                current.push(c as char);
            }
            b'"' | b'\'' => {
                current.push(c as char);
                let mut q = p + 1;
                while q < bytes.len() {
                    current.push(bytes[q] as char);
                    if bytes[q] == b'\\' && q + 1 < bytes.len() {
                        current.push(bytes[q + 1] as char);
                        q += 2;
                        continue;
                    }
                    if bytes[q] == c {
                        break;
                    }
                    q += 1;
                }
                p = q;
            }
            b',' if depth == 1 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => {
                if depth >= 1 {
                    current.push(c as char);
                }
            }
        }
        p += 1;
    }
    None
}

/// 1-based line number at a byte position; cleaned and original buffers
/// agree because cleaning preserves newlines.
pub fn line_at(text: &str, pos: usize) -> u64 {
    1 + text.as_bytes()[..pos.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count() as u64
}

/// Collect Java `final? String NAME = "value"` declarations for constant
/// folding. Declarations are located on the cleaned buffer (so commented
/// ones are invisible) and values are read from the original.
pub fn java_string_constants(cleaned: &str, original: &str) -> HashMap<String, String> {
    let mut constants = HashMap::new();
    let decl = Regex::new(r#"(?:final\s+)?String\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*""#)
        .expect("static declaration regex");
    for caps in decl.captures_iter(cleaned) {
        let whole = caps.get(0).expect("whole match");
        let quote_pos = whole.end() - 1;
        if let Some(value) = read_string_literal(original, quote_pos) {
            constants.insert(caps[1].to_string(), value);
        }
    }
    constants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_preserves_length_and_newlines() {
        let code = "int x; // comment\n/* multi\nline */ f(\"lit\");\n";
        let cleaned = clean_source(code, SourceLang::C);
        assert_eq!(cleaned.len(), code.len());
        assert_eq!(
            cleaned.matches('\n').count(),
            code.matches('\n').count()
        );
    }

    #[test]
    fn c_preprocessor_lines_blanked() {
        let cleaned = clean_source("#include <md5.h>\nMD5_Init(c);\n", SourceLang::C);
        assert!(!cleaned.contains("include"));
        assert!(cleaned.contains("MD5_Init"));
    }

    #[test]
    fn string_contents_blanked_but_quotes_survive() {
        let cleaned = clean_source("f(\"MD5_Init(\");", SourceLang::C);
        assert!(!cleaned.contains("MD5_Init"));
        assert!(cleaned.contains('"'));
    }

    #[test]
    fn java_comment_call_blanked() {
        let code = "// MessageDigest.getInstance(\"MD5\")\nMessageDigest.getInstance(\"MD5\");";
        let cleaned = clean_source(code, SourceLang::Java);
        assert_eq!(cleaned.matches("getInstance").count(), 1);
    }

    #[test]
    fn python_triple_quotes_terminate_exactly() {
        let code = "s = '''hashlib.md5(\nstill string'''\nhashlib.md5()\n";
        let cleaned = clean_source(code, SourceLang::Python);
        assert_eq!(cleaned.matches("hashlib").count(), 1);
        assert_eq!(cleaned.matches('\n').count(), code.matches('\n').count());
    }

    #[test]
    fn python_escaped_quote_stays_inside_string() {
        let cleaned = clean_source(r#"x = "a\"b"; md5()"#, SourceLang::Python);
        assert!(cleaned.contains("md5"));
        assert!(!cleaned.contains("a\\\"b"));
    }

    #[test]
    fn dotted_callee_regex_allows_spacing() {
        let rx = callee_regex("MessageDigest.getInstance", false).unwrap();
        assert!(rx.is_match("MessageDigest.getInstance("));
        assert!(rx.is_match("MessageDigest . getInstance ("));
        assert!(!rx.is_match("MyMessageDigest.getInstance("));
    }

    #[test]
    fn ctor_regex_requires_new() {
        let rx = callee_regex("DESKeySpec", true).unwrap();
        assert!(rx.is_match("new DESKeySpec("));
        assert!(!rx.is_match("DESKeySpec("));
    }

    #[test]
    fn first_arg_string_unescaped() {
        let arg = extract_first_arg("getInstance(\"M\\\"D5\")", 0).unwrap();
        assert_eq!(arg, FirstArg::Str("M\"D5".into()));
    }

    #[test]
    fn first_arg_int_and_ident() {
        assert_eq!(extract_first_arg("init( 2048 )", 0), Some(FirstArg::Int("2048".into())));
        assert_eq!(
            extract_first_arg("getInstance(ALGO)", 0),
            Some(FirstArg::Ident("ALGO".into()))
        );
        assert_eq!(extract_first_arg("f(*p)", 0), None);
    }

    #[test]
    fn call_args_split_top_level_only() {
        let args = call_args("new(key, AES.MODE_ECB, iv=g(1, 2))", 0).unwrap();
        assert_eq!(args, vec!["key", "AES.MODE_ECB", "iv=g(1, 2)"]);
    }

    #[test]
    fn call_args_unbalanced_returns_none() {
        assert!(call_args("f(a, b", 0).is_none());
    }

    #[test]
    fn line_numbers_are_one_based() {
        let text = "a\nb\nc";
        assert_eq!(line_at(text, 0), 1);
        assert_eq!(line_at(text, 2), 2);
        assert_eq!(line_at(text, 4), 3);
    }

    #[test]
    fn constants_fold_from_original_values() {
        let original = "final String ALGO = \"MD5\"; // String FAKE = \"X\"\n";
        let cleaned = clean_source(original, SourceLang::Java);
        let constants = java_string_constants(&cleaned, original);
        assert_eq!(constants.get("ALGO").map(String::as_str), Some("MD5"));
        assert!(!constants.contains_key("FAKE"));
    }
}

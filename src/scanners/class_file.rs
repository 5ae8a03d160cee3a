//! Compiled-class scanning without external tooling.
//!
//! The parser reads the constant pool (keeping the file offset of every
//! UTF-8 constant so string hits carry real byte positions), resolves
//! method references, and walks each method's code attribute. Rule matches
//! correlate invoke instructions with nearby `ldc` string or integer
//! constants; `LineNumberTable` attributes supply line numbers when the
//! compiler kept them.

use crate::classify::classify_text;
use crate::patterns::{PatternCatalog, RuleKind, RuleLang};
use crate::search::scan_runs;
use crate::strings::AsciiRun;
use crate::types::{Detection, EvidenceType, Severity};
use anyhow::{bail, Result};
use tracing::debug;

/// Instruction window consulted for string evidence near a matched invoke.
const STRING_WINDOW: usize = 8;
/// Instruction window for the keysize correlation.
const BITS_WINDOW: usize = 6;

const MAGIC: u32 = 0xCAFE_BABE;

/// True when the buffer starts with the class-file magic.
pub fn is_class_file(data: &[u8]) -> bool {
    data.len() >= 4 && u32::from_be_bytes([data[0], data[1], data[2], data[3]]) == MAGIC
}

/// Scan one compiled class. Parse failures are logged and yield an empty
/// result; a class file never aborts the surrounding walk.
pub fn scan_class(display_path: &str, data: &[u8], catalog: &PatternCatalog) -> Vec<Detection> {
    let parsed = match parse_class(data) {
        Ok(p) => p,
        Err(e) => {
            debug!("{display_path}: not a scannable class file: {e}");
            return Vec::new();
        }
    };
    let mut out = Vec::new();

    // Constant-pool UTF-8 entries double as ASCII runs for the regex set;
    // offsets are absolute in the class file.
    let runs: Vec<AsciiRun> = parsed
        .pool
        .iter()
        .filter_map(|entry| match entry {
            Const::Utf8 { text, offset } if text.len() >= crate::strings::MIN_RUN_LEN => {
                text.is_ascii().then(|| AsciiRun { offset: *offset, text: text.clone() })
            }
            _ => None,
        })
        .collect();
    for hit in scan_runs(&runs, &catalog.regexes) {
        let (evidence, severity) = classify_text(&hit.pattern, false);
        out.push(Detection {
            file: display_path.to_string(),
            offset_or_line: hit.offset as u64,
            pattern: hit.pattern,
            matched: hit.matched,
            evidence,
            severity,
        });
    }

    scan_method_rules(display_path, &parsed, catalog, &mut out);
    scan_keygen_bits(display_path, &parsed, &mut out);

    out
}

/// Match `method_call` rules against invoke instructions, pulling string
/// evidence from the preceding instruction window.
fn scan_method_rules(
    display_path: &str,
    class: &ClassFile,
    catalog: &PatternCatalog,
    out: &mut Vec<Detection>,
) {
    for rule in catalog.rules_for(RuleLang::Java) {
        if rule.kind != RuleKind::MethodCall {
            continue;
        }
        let Some((target_class, target_method)) = split_callee(&rule.callee) else { continue };
        let targets = class.method_refs_matching(&target_class, &target_method, None);
        if targets.is_empty() {
            continue;
        }

        for method in &class.methods {
            for (i, insn) in method.insns.iter().enumerate() {
                if !insn.is_invoke() || !targets.contains(&insn.operand_index()) {
                    continue;
                }
                let nearby = nearby_string(class, method, i, STRING_WINDOW);
                let emit = match (&rule.arg_regex, &nearby) {
                    (Some(rx), Some(s)) => rx.is_match(s),
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                if emit {
                    out.push(Detection {
                        file: display_path.to_string(),
                        offset_or_line: method.line_for_pc(insn.pc),
                        pattern: rule.label().to_string(),
                        matched: nearby.unwrap_or_else(|| rule.callee.clone()),
                        evidence: EvidenceType::Bytecode,
                        severity: rule.severity,
                    });
                }
            }
        }
    }
}

/// Correlate `KeyPairGenerator.initialize(I)V` invokes with the integer
/// constant that feeds them.
fn scan_keygen_bits(display_path: &str, class: &ClassFile, out: &mut Vec<Detection>) {
    let targets =
        class.method_refs_matching("java/security/KeyPairGenerator", "initialize", Some("(I)V"));
    if targets.is_empty() {
        return;
    }
    for method in &class.methods {
        for (i, insn) in method.insns.iter().enumerate() {
            if !insn.is_invoke() || !targets.contains(&insn.operand_index()) {
                continue;
            }
            let window_start = i.saturating_sub(BITS_WINDOW);
            let bits = method.insns[window_start..i]
                .iter()
                .rev()
                .find_map(|prev| prev.int_constant(class));
            if let Some(bits) = bits {
                out.push(Detection {
                    file: display_path.to_string(),
                    offset_or_line: method.line_for_pc(insn.pc),
                    pattern: "KeyPairGenerator.bits".to_string(),
                    matched: bits.to_string(),
                    evidence: EvidenceType::Bytecode,
                    severity: Severity::Med,
                });
            }
        }
    }
}

/// Nearest string constant loaded in the window before instruction `i`.
fn nearby_string(
    class: &ClassFile,
    method: &MethodCode,
    i: usize,
    window: usize,
) -> Option<String> {
    let start = i.saturating_sub(window);
    method.insns[start..i]
        .iter()
        .rev()
        .find_map(|insn| insn.string_constant(class))
}

/// `pkg.Class.method` → (`pkg/Class`, `method`).
fn split_callee(callee: &str) -> Option<(String, String)> {
    let split = callee.rfind('.')?;
    let class = callee[..split].replace('.', "/");
    let method = callee[split + 1..].to_string();
    (!class.is_empty() && !method.is_empty()).then_some((class, method))
}

// ---------------------------------------------------------------------------
// Class file model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Const {
    Empty,
    Utf8 { text: String, offset: usize },
    Int(i32),
    Class(u16),
    Str(u16),
    MethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, desc: u16 },
    Other,
}

#[derive(Debug)]
struct ClassFile {
    pool: Vec<Const>,
    methods: Vec<MethodCode>,
}

impl ClassFile {
    fn utf8(&self, index: u16) -> Option<&str> {
        match self.pool.get(index as usize) {
            Some(Const::Utf8 { text, .. }) => Some(text),
            _ => None,
        }
    }

    /// Pool indices of method refs with the given internal class name,
    /// method name, and (optionally) descriptor.
    fn method_refs_matching(&self, class: &str, method: &str, desc: Option<&str>) -> Vec<u16> {
        let mut matches = Vec::new();
        for (index, entry) in self.pool.iter().enumerate() {
            let Const::MethodRef { class: class_idx, name_and_type } = entry else { continue };
            let Some(Const::Class(name_idx)) = self.pool.get(*class_idx as usize) else { continue };
            let Some(Const::NameAndType { name, desc: desc_idx }) =
                self.pool.get(*name_and_type as usize)
            else {
                continue;
            };
            if self.utf8(*name_idx) != Some(class) || self.utf8(*name) != Some(method) {
                continue;
            }
            if let Some(want_desc) = desc {
                if self.utf8(*desc_idx) != Some(want_desc) {
                    continue;
                }
            }
            matches.push(index as u16);
        }
        matches
    }
}

#[derive(Debug)]
struct MethodCode {
    insns: Vec<Insn>,
    /// (start_pc, line) pairs from `LineNumberTable`, in file order
    lines: Vec<(u16, u16)>,
}

impl MethodCode {
    /// Line for a pc: the entry with the greatest start_pc not beyond it,
    /// else 1 when the table is absent.
    fn line_for_pc(&self, pc: u32) -> u64 {
        self.lines
            .iter()
            .filter(|(start, _)| u32::from(*start) <= pc)
            .map(|(_, line)| u64::from(*line))
            .last()
            .unwrap_or(1)
    }
}

#[derive(Debug)]
struct Insn {
    pc: u32,
    op: u8,
    /// Constant-pool index for ldc/ldc_w/invoke/field ops
    index: u16,
    /// Immediate for bipush/sipush
    immediate: Option<i32>,
}

impl Insn {
    fn is_invoke(&self) -> bool {
        // invokevirtual, invokespecial, invokestatic, invokeinterface
        (0xB6..=0xB9).contains(&self.op)
    }

    fn operand_index(&self) -> u16 {
        self.index
    }

    fn string_constant(&self, class: &ClassFile) -> Option<String> {
        if self.op != 0x12 && self.op != 0x13 {
            return None;
        }
        match class.pool.get(self.index as usize)? {
            Const::Str(utf8_idx) => class.utf8(*utf8_idx).map(str::to_string),
            _ => None,
        }
    }

    fn int_constant(&self, class: &ClassFile) -> Option<i32> {
        match self.op {
            // bipush, sipush
            0x10 | 0x11 => self.immediate,
            // ldc, ldc_w over an Integer entry
            0x12 | 0x13 => match class.pool.get(self.index as usize)? {
                Const::Int(v) => Some(*v),
                _ => None,
            },
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Result<u8> {
        let v = *self.data.get(self.pos).ok_or_else(|| truncated("u8"))?;
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            bail!("truncated class file at offset {}", self.pos);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

fn truncated(what: &str) -> anyhow::Error {
    anyhow::anyhow!("truncated class file reading {what}")
}

fn parse_class(data: &[u8]) -> Result<ClassFile> {
    let mut cur = Cursor { data, pos: 0 };
    if cur.u32()? != MAGIC {
        bail!("bad class file magic");
    }
    cur.u32()?; // minor + major version

    let pool_count = cur.u16()? as usize;
    let mut pool = vec![Const::Empty; pool_count.max(1)];
    let mut i = 1;
    while i < pool_count {
        let tag = cur.u8()?;
        // long/double occupy two pool slots
        let mut slots = 1;
        let entry = match tag {
            1 => {
                let len = cur.u16()? as usize;
                let offset = cur.pos;
                let bytes = cur.take(len)?;
                Const::Utf8 { text: String::from_utf8_lossy(bytes).into_owned(), offset }
            }
            3 => Const::Int(cur.u32()? as i32),
            7 => Const::Class(cur.u16()?),
            8 => Const::Str(cur.u16()?),
            10 => {
                let class = cur.u16()?;
                let name_and_type = cur.u16()?;
                Const::MethodRef { class, name_and_type }
            }
            12 => {
                let name = cur.u16()?;
                let desc = cur.u16()?;
                Const::NameAndType { name, desc }
            }
            4 => {
                cur.take(4)?;
                Const::Other
            }
            5 | 6 => {
                cur.take(8)?;
                slots = 2;
                Const::Other
            }
            9 | 11 | 17 | 18 => {
                cur.take(4)?;
                Const::Other
            }
            15 => {
                cur.take(3)?;
                Const::Other
            }
            16 | 19 | 20 => {
                cur.take(2)?;
                Const::Other
            }
            other => bail!("unknown constant pool tag {other}"),
        };
        pool[i] = entry;
        i += slots;
    }

    cur.u16()?; // access_flags
    cur.u16()?; // this_class
    cur.u16()?; // super_class
    let interface_count = cur.u16()? as usize;
    cur.take(interface_count * 2)?;

    skip_members(&mut cur)?; // fields

    let mut methods = Vec::new();
    let method_count = cur.u16()? as usize;
    let utf8_at = |idx: u16| match pool.get(idx as usize) {
        Some(Const::Utf8 { text, .. }) => Some(text.as_str()),
        _ => None,
    };
    for _ in 0..method_count {
        cur.u16()?; // access
        cur.u16()?; // name
        cur.u16()?; // descriptor
        let attr_count = cur.u16()? as usize;
        for _ in 0..attr_count {
            let name_idx = cur.u16()?;
            let len = cur.u32()? as usize;
            if utf8_at(name_idx) == Some("Code") {
                let body = cur.take(len)?;
                if let Ok(code) = parse_code_attribute(body, &utf8_at) {
                    methods.push(code);
                }
            } else {
                cur.take(len)?;
            }
        }
    }

    Ok(ClassFile { pool, methods })
}

/// Skip a field table (count followed by member_info entries).
fn skip_members(cur: &mut Cursor<'_>) -> Result<()> {
    let count = cur.u16()? as usize;
    for _ in 0..count {
        cur.take(6)?; // access, name, descriptor
        let attr_count = cur.u16()? as usize;
        for _ in 0..attr_count {
            cur.u16()?;
            let len = cur.u32()? as usize;
            cur.take(len)?;
        }
    }
    Ok(())
}

fn parse_code_attribute<'p, F: Fn(u16) -> Option<&'p str>>(
    body: &[u8],
    utf8_at: &F,
) -> Result<MethodCode> {
    let mut cur = Cursor { data: body, pos: 0 };
    cur.u16()?; // max_stack
    cur.u16()?; // max_locals
    let code_len = cur.u32()? as usize;
    let code = cur.take(code_len)?;
    let insns = decode_instructions(code)?;

    let exception_count = cur.u16()? as usize;
    cur.take(exception_count * 8)?;

    let mut lines = Vec::new();
    let attr_count = cur.u16()? as usize;
    for _ in 0..attr_count {
        let name_idx = cur.u16()?;
        let len = cur.u32()? as usize;
        if utf8_at(name_idx) == Some("LineNumberTable") {
            let table = cur.take(len)?;
            let mut tcur = Cursor { data: table, pos: 0 };
            let entries = tcur.u16()? as usize;
            for _ in 0..entries {
                let start_pc = tcur.u16()?;
                let line = tcur.u16()?;
                lines.push((start_pc, line));
            }
        } else {
            cur.take(len)?;
        }
    }

    Ok(MethodCode { insns, lines })
}

/// Linear disassembly keeping only the operands the rules care about.
fn decode_instructions(code: &[u8]) -> Result<Vec<Insn>> {
    let mut insns = Vec::new();
    let mut pc = 0usize;
    while pc < code.len() {
        let op = code[pc];
        let mut index = 0u16;
        let mut immediate = None;
        let len = match op {
            0x10 => {
                immediate = code.get(pc + 1).map(|&b| i32::from(b as i8));
                2
            }
            0x11 => {
                if pc + 2 < code.len() {
                    immediate = Some(i32::from(i16::from_be_bytes([code[pc + 1], code[pc + 2]])));
                }
                3
            }
            0x12 => {
                index = u16::from(*code.get(pc + 1).ok_or_else(|| truncated("ldc"))?);
                2
            }
            0x13 | 0x14 => {
                index = read_index(code, pc)?;
                3
            }
            0x15..=0x19 | 0x36..=0x3A | 0xA9 | 0xBC => 2,
            0x84 => 3,
            0x99..=0xA8 | 0xB2..=0xB5 | 0xBB | 0xBD | 0xC0 | 0xC1 | 0xC6 | 0xC7 => 3,
            0xB6..=0xB8 => {
                index = read_index(code, pc)?;
                3
            }
            0xB9 | 0xBA => {
                index = read_index(code, pc)?;
                5
            }
            0xC5 => 4,
            0xC8 | 0xC9 => 5,
            0xC4 => {
                // wide: iinc form carries two extra operand bytes
                if code.get(pc + 1) == Some(&0x84) {
                    6
                } else {
                    4
                }
            }
            0xAA => switch_len(code, pc, true)?,
            0xAB => switch_len(code, pc, false)?,
            _ => 1,
        };
        insns.push(Insn { pc: pc as u32, op, index, immediate });
        pc = pc.checked_add(len).ok_or_else(|| truncated("instruction"))?;
    }
    Ok(insns)
}

fn read_index(code: &[u8], pc: usize) -> Result<u16> {
    match (code.get(pc + 1), code.get(pc + 2)) {
        (Some(&hi), Some(&lo)) => Ok(u16::from_be_bytes([hi, lo])),
        _ => bail!("truncated operand at pc {pc}"),
    }
}

/// tableswitch/lookupswitch length: padding to a 4-byte boundary, then a
/// fixed header and 4- or 8-byte entries.
fn switch_len(code: &[u8], pc: usize, table: bool) -> Result<usize> {
    let pad = (4 - ((pc + 1) % 4)) % 4;
    let base = pc + 1 + pad;
    let word = |at: usize| -> Result<i32> {
        if at + 4 > code.len() {
            bail!("truncated switch at pc {pc}");
        }
        Ok(i32::from_be_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]]))
    };
    if table {
        let low = word(base + 4)?;
        let high = word(base + 8)?;
        if high < low {
            bail!("invalid tableswitch bounds at pc {pc}");
        }
        let count = (high - low + 1) as usize;
        Ok(1 + pad + 12 + count * 4)
    } else {
        let npairs = word(base + 4)?;
        if npairs < 0 {
            bail!("invalid lookupswitch pair count at pc {pc}");
        }
        Ok(1 + pad + 8 + npairs as usize * 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::loader::load_from_str;

    /// Hand-assemble a minimal class: constant pool with a string, a
    /// method ref for MessageDigest.getInstance and KeyPairGenerator
    /// .initialize, and one method whose code loads "MD5", invokes the
    /// digest lookup, pushes 1024, and invokes initialize.
    fn build_test_class() -> Vec<u8> {
        let mut pool_bytes: Vec<u8> = Vec::new();
        let mut count: u16 = 1;
        let mut utf8 = |pool: &mut Vec<u8>, s: &str| -> u16 {
            pool.push(1);
            pool.extend((s.len() as u16).to_be_bytes());
            pool.extend(s.as_bytes());
            let idx = count;
            count += 1;
            idx
        };

        let md5_text = utf8(&mut pool_bytes, "MD5");
        let digest_class_name = utf8(&mut pool_bytes, "java/security/MessageDigest");
        let get_instance = utf8(&mut pool_bytes, "getInstance");
        let digest_desc =
            utf8(&mut pool_bytes, "(Ljava/lang/String;)Ljava/security/MessageDigest;");
        let kpg_class_name = utf8(&mut pool_bytes, "java/security/KeyPairGenerator");
        let initialize = utf8(&mut pool_bytes, "initialize");
        let init_desc = utf8(&mut pool_bytes, "(I)V");
        let code_attr = utf8(&mut pool_bytes, "Code");

        // String #9 -> "MD5"
        pool_bytes.push(8);
        pool_bytes.extend(md5_text.to_be_bytes());
        let md5_string = count;
        count += 1;

        // Class entries
        pool_bytes.push(7);
        pool_bytes.extend(digest_class_name.to_be_bytes());
        let digest_class = count;
        count += 1;
        pool_bytes.push(7);
        pool_bytes.extend(kpg_class_name.to_be_bytes());
        let kpg_class = count;
        count += 1;

        // NameAndType entries
        pool_bytes.push(12);
        pool_bytes.extend(get_instance.to_be_bytes());
        pool_bytes.extend(digest_desc.to_be_bytes());
        let digest_nat = count;
        count += 1;
        pool_bytes.push(12);
        pool_bytes.extend(initialize.to_be_bytes());
        pool_bytes.extend(init_desc.to_be_bytes());
        let init_nat = count;
        count += 1;

        // MethodRef entries
        pool_bytes.push(10);
        pool_bytes.extend(digest_class.to_be_bytes());
        pool_bytes.extend(digest_nat.to_be_bytes());
        let digest_ref = count;
        count += 1;
        pool_bytes.push(10);
        pool_bytes.extend(kpg_class.to_be_bytes());
        pool_bytes.extend(init_nat.to_be_bytes());
        let init_ref = count;
        count += 1;

        // Code: ldc md5_string; invokestatic digest_ref; sipush 1024;
        //       invokevirtual init_ref; return
        let code: Vec<u8> = vec![
            0x12, md5_string as u8,
            0xB8, (digest_ref >> 8) as u8, (digest_ref & 0xFF) as u8,
            0x11, 0x04, 0x00,
            0xB6, (init_ref >> 8) as u8, (init_ref & 0xFF) as u8,
            0xB1,
        ];

        // LineNumberTable attribute is deliberately absent: lines fall
        // back to 1.
        let mut code_body: Vec<u8> = Vec::new();
        code_body.extend(2u16.to_be_bytes()); // max_stack
        code_body.extend(1u16.to_be_bytes()); // max_locals
        code_body.extend((code.len() as u32).to_be_bytes());
        code_body.extend(&code);
        code_body.extend(0u16.to_be_bytes()); // exception table
        code_body.extend(0u16.to_be_bytes()); // attributes

        let mut out: Vec<u8> = Vec::new();
        out.extend(MAGIC.to_be_bytes());
        out.extend(0u16.to_be_bytes()); // minor
        out.extend(52u16.to_be_bytes()); // major (Java 8)
        out.extend(count.to_be_bytes()); // constant_pool_count
        out.extend(&pool_bytes);
        out.extend(0x0021u16.to_be_bytes()); // access
        out.extend(digest_class.to_be_bytes()); // this_class (any class idx)
        out.extend(0u16.to_be_bytes()); // super
        out.extend(0u16.to_be_bytes()); // interfaces
        out.extend(0u16.to_be_bytes()); // fields
        out.extend(1u16.to_be_bytes()); // methods
        out.extend(0x0009u16.to_be_bytes()); // method access
        out.extend(get_instance.to_be_bytes()); // name (reuse any utf8)
        out.extend(init_desc.to_be_bytes()); // descriptor (reuse)
        out.extend(1u16.to_be_bytes()); // attr count
        out.extend(code_attr.to_be_bytes());
        out.extend((code_body.len() as u32).to_be_bytes());
        out.extend(&code_body);
        out
    }

    fn catalog() -> PatternCatalog {
        load_from_str(
            r#"{
                "regex": [{"name": "digest class marker", "pattern": "MessageDigest"}],
                "ast": [
                    {"id": "bc-weak-digest", "lang": "java", "kind": "method_call",
                     "callee": "java.security.MessageDigest.getInstance",
                     "arg_regex": "^(MD5|SHA-?1)$",
                     "message": "Weak digest via MessageDigest", "severity": "med"}
                ]
            }"#,
        )
    }

    #[test]
    fn magic_detection() {
        assert!(is_class_file(&build_test_class()));
        assert!(!is_class_file(b"PK\x03\x04"));
    }

    #[test]
    fn method_rule_correlates_nearby_string() {
        let class = build_test_class();
        let hits = scan_class("Test.class", &class, &catalog());
        let rule_hit = hits
            .iter()
            .find(|d| d.pattern == "Weak digest via MessageDigest")
            .expect("method_call rule should fire");
        assert_eq!(rule_hit.evidence, EvidenceType::Bytecode);
        assert_eq!(rule_hit.matched, "MD5");
        assert_eq!(rule_hit.offset_or_line, 1, "no LineNumberTable -> line 1");
    }

    #[test]
    fn keygen_bits_correlated_from_sipush() {
        let class = build_test_class();
        let hits = scan_class("Test.class", &class, &catalog());
        let bits = hits
            .iter()
            .find(|d| d.pattern == "KeyPairGenerator.bits")
            .expect("keysize correlation should fire");
        assert_eq!(bits.matched, "1024");
        assert_eq!(bits.severity, Severity::Med);
    }

    #[test]
    fn pool_strings_scanned_with_real_offsets() {
        let class = build_test_class();
        let hits = scan_class("Test.class", &class, &catalog());
        let text_hit = hits
            .iter()
            .find(|d| d.pattern == "digest class marker")
            .expect("regex over pool");
        let off = text_hit.offset_or_line as usize;
        assert_eq!(&class[off..off + 13], b"MessageDigest");
    }

    #[test]
    fn garbage_input_yields_empty() {
        assert!(scan_class("x.class", b"\xCA\xFE\xBA\xBE\x00", &catalog()).is_empty());
        assert!(scan_class("x.class", b"not a class", &catalog()).is_empty());
    }
}

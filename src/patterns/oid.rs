//! ASN.1 object identifier compilation.
//!
//! A dotted OID compiles to two byte forms: VAL is the raw value bytes
//! (first two arcs collapsed as `40*a0 + a1`, remaining arcs base-128 with
//! continuation bits), DER prepends the `0x06` tag and a BER length. Both
//! are pure functions of the dotted string.

use crate::error::{Result, ScanError};

/// Parse a dotted-decimal OID into its arc list.
///
/// Arcs are non-negative decimals; fewer than two arcs is an error.
pub fn parse_dotted(dotted: &str) -> Result<Vec<u64>> {
    let mut arcs = Vec::new();
    for part in dotted.split('.') {
        if part.is_empty() {
            return Err(ScanError::decode(dotted.to_string(), "empty arc"));
        }
        let arc: u64 = part
            .parse()
            .map_err(|_| ScanError::decode(dotted.to_string(), format!("bad arc '{part}'")))?;
        arcs.push(arc);
    }
    if arcs.len() < 2 {
        return Err(ScanError::decode(
            dotted.to_string(),
            "OID requires at least two arcs",
        ));
    }
    Ok(arcs)
}

fn encode_base128(mut v: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        out.push((v & 0x7F) as u8);
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    out.reverse();
    let last = out.len() - 1;
    for b in &mut out[..last] {
        *b |= 0x80;
    }
    out
}

/// Compile the VAL form: `40*a0 + a1` then base-128 arcs.
pub fn value_bytes(dotted: &str) -> Result<Vec<u8>> {
    let arcs = parse_dotted(dotted)?;
    let mut out = Vec::with_capacity(arcs.len());
    out.push((arcs[0] * 40 + arcs[1]) as u8);
    for &arc in &arcs[2..] {
        out.extend(encode_base128(arc));
    }
    Ok(out)
}

/// Compile the DER form: `06 LL [value]` with short or long length per BER.
pub fn der_bytes(dotted: &str) -> Result<Vec<u8>> {
    let val = value_bytes(dotted)?;
    let mut out = Vec::with_capacity(val.len() + 4);
    out.push(0x06);
    if val.len() <= 127 {
        out.push(val.len() as u8);
    } else {
        let mut len_bytes = Vec::new();
        let mut n = val.len();
        while n > 0 {
            len_bytes.push((n & 0xFF) as u8);
            n >>= 8;
        }
        len_bytes.reverse();
        out.push(0x80 | len_bytes.len() as u8);
        out.extend(len_bytes);
    }
    out.extend(val);
    Ok(out)
}

/// Decode a VAL-form byte string back into its arc list. Returns `None` on
/// truncated continuation sequences. Supports the round-trip law used by
/// the test suite; the scanner itself only compiles.
pub fn parse_value(bytes: &[u8]) -> Option<Vec<u64>> {
    if bytes.is_empty() {
        return None;
    }
    let first = bytes[0] as u64;
    let (a0, a1) = if first < 40 {
        (0, first)
    } else if first < 80 {
        (1, first - 40)
    } else {
        (2, first - 80)
    };
    let mut arcs = vec![a0, a1];
    let mut acc: u64 = 0;
    let mut in_arc = false;
    for &b in &bytes[1..] {
        acc = (acc << 7) | (b & 0x7F) as u64;
        in_arc = true;
        if b & 0x80 == 0 {
            arcs.push(acc);
            acc = 0;
            in_arc = false;
        }
    }
    if in_arc {
        return None;
    }
    Some(arcs)
}

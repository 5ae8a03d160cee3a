//! The string/byte search engine: regex matching over ASCII runs and
//! literal needle search with the overlap-suppression advancement policy.

use crate::patterns::{ByteKind, BytePattern, RegexPattern};
use crate::strings::AsciiRun;

/// A regex hit inside an ASCII run, reported at its absolute byte offset.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub pattern: String,
    pub matched: String,
    pub offset: usize,
}

/// A byte-needle hit, reported with the needle's uppercase hex rendering.
#[derive(Debug, Clone)]
pub struct ByteHit {
    pub pattern: String,
    pub hex: String,
    pub offset: usize,
    pub kind: ByteKind,
}

/// Apply every regex pattern to every run, collecting all non-overlapping
/// matches. Match offsets within a run are added to the run offset to
/// yield absolute positions. Hits come out in pattern order, then offset
/// order within a pattern.
pub fn scan_runs(runs: &[AsciiRun], patterns: &[RegexPattern]) -> Vec<TextHit> {
    let mut hits = Vec::new();
    for pattern in patterns {
        for run in runs {
            for m in pattern.regex.find_iter(&run.text) {
                hits.push(TextHit {
                    pattern: pattern.name.clone(),
                    matched: m.as_str().to_string(),
                    offset: run.offset + m.start(),
                });
            }
        }
    }
    hits
}

/// Find all occurrences of every byte needle via linear search.
///
/// Advancement after a hit at offset `p`:
/// - all-one-byte needle: skip past the maximal run of that byte starting
///   at `p` (one emission per constant run);
/// - at most two distinct byte values: advance by the needle length;
/// - otherwise: advance by one, allowing overlapping structural matches.
pub fn scan_bytes(data: &[u8], patterns: &[BytePattern]) -> Vec<ByteHit> {
    let mut hits = Vec::new();
    for pattern in patterns {
        let needle = &pattern.bytes;
        if needle.is_empty() || data.len() < needle.len() {
            continue;
        }
        let hex = to_hex_upper(needle);
        let same_byte = all_same_byte(needle);
        let low_entropy = distinct_bytes(needle) <= 2;

        let mut pos = 0;
        while pos + needle.len() <= data.len() {
            let Some(found) = find_needle(&data[pos..], needle) else {
                break;
            };
            let off = pos + found;
            hits.push(ByteHit {
                pattern: pattern.name.clone(),
                hex: hex.clone(),
                offset: off,
                kind: pattern.kind,
            });

            pos = if let Some(b) = same_byte {
                let mut j = off + needle.len();
                while j < data.len() && data[j] == b {
                    j += 1;
                }
                j
            } else if low_entropy {
                off + needle.len()
            } else {
                off + 1
            };
        }
    }
    hits
}

fn find_needle(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn all_same_byte(needle: &[u8]) -> Option<u8> {
    let first = *needle.first()?;
    needle.iter().all(|&b| b == first).then_some(first)
}

fn distinct_bytes(needle: &[u8]) -> usize {
    let mut seen = [false; 256];
    let mut count = 0;
    for &b in needle {
        if !seen[b as usize] {
            seen[b as usize] = true;
            count += 1;
        }
    }
    count
}

/// Uppercase hex rendering used for byte-match evidence.
pub fn to_hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::extract_ascii_runs;
    use regex::RegexBuilder;

    fn regex_pattern(name: &str, pattern: &str) -> RegexPattern {
        RegexPattern {
            name: name.into(),
            regex: RegexBuilder::new(pattern).case_insensitive(true).build().unwrap(),
        }
    }

    fn byte_pattern(name: &str, bytes: &[u8], kind: ByteKind) -> BytePattern {
        BytePattern { name: name.into(), bytes: bytes.to_vec(), kind }
    }

    #[test]
    fn run_offset_plus_match_position() {
        let data = b"\x00\x00padding RSA-2048 rest";
        let runs = extract_ascii_runs(data, 4);
        let hits = scan_runs(&runs, &[regex_pattern("RSA", r"RSA-\d{4}")]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].offset, 10);
        assert_eq!(&data[hits[0].offset..hits[0].offset + 8], b"RSA-2048");
    }

    #[test]
    fn case_insensitive_by_default() {
        let runs = extract_ascii_runs(b"uses rc4 cipher", 4);
        let hits = scan_runs(&runs, &[regex_pattern("RC4", r"\bRC4\b")]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched, "rc4");
    }

    #[test]
    fn all_same_byte_needle_collapses_constant_run() {
        // 12 x 0xFF: a 4-byte all-0xFF needle reports once per maximal run
        let mut data = vec![0u8; 4];
        data.extend(std::iter::repeat(0xFF).take(12));
        data.push(0);
        data.extend(std::iter::repeat(0xFF).take(5));
        let hits = scan_bytes(&data, &[byte_pattern("pad", &[0xFF; 4], ByteKind::Bytes)]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].offset, 4);
        assert_eq!(hits[1].offset, 17);
    }

    #[test]
    fn two_value_needle_advances_by_length() {
        // ABABAB contains ABAB at 0 and 2 when overlapping; coarse dedup
        // reports only the non-overlapping occurrence at 0
        let data = b"ABABAB";
        let hits = scan_bytes(data, &[byte_pattern("ab", b"ABAB", ByteKind::Bytes)]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].offset, 0);
    }

    #[test]
    fn structural_needle_allows_overlap() {
        let data = b"ABCABCABC";
        let hits = scan_bytes(data, &[byte_pattern("abc", b"ABCABC", ByteKind::Bytes)]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].offset, 0);
        assert_eq!(hits[1].offset, 3);
    }

    #[test]
    fn every_hit_actually_matches() {
        let needle = [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];
        let mut data = vec![0x13u8; 7];
        data.extend(&needle);
        data.extend([0x00, 0x41]);
        data.extend(&needle);
        let hits = scan_bytes(&data, &[byte_pattern("rsa-oid", &needle, ByteKind::Oid)]);
        assert_eq!(hits.len(), 2);
        for hit in &hits {
            assert_eq!(&data[hit.offset..hit.offset + needle.len()], &needle[..]);
        }
        assert_eq!(hits[0].hex, "06092A864886F70D010101");
    }

    #[test]
    fn needle_longer_than_buffer_is_skipped() {
        let hits = scan_bytes(b"ab", &[byte_pattern("long", b"abcdef", ByteKind::Bytes)]);
        assert!(hits.is_empty());
    }

    #[test]
    fn hex_rendering_is_uppercase_and_padded() {
        assert_eq!(to_hex_upper(&[0x0A, 0xFF, 0x00]), "0AFF00");
    }
}

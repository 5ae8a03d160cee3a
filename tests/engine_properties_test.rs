//! Property coverage for the string/byte search engine.

use pqscan::patterns::{ByteKind, BytePattern, RegexPattern};
use pqscan::search::{scan_bytes, scan_runs};
use pqscan::strings::extract_ascii_runs;
use proptest::prelude::*;
use regex::RegexBuilder;

proptest! {
    /// Every extracted run is printable, maximal, and indexes back into
    /// the buffer at its reported offset.
    #[test]
    fn ascii_runs_are_maximal_and_addressable(
        data in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        for run in extract_ascii_runs(&data, 4) {
            let slice = &data[run.offset..run.offset + run.text.len()];
            prop_assert_eq!(slice, run.text.as_bytes());
            prop_assert!(run.text.bytes().all(|b| (0x20..=0x7E).contains(&b)));
            prop_assert!(run.text.len() >= 4);
            if run.offset > 0 {
                prop_assert!(!(0x20..=0x7E).contains(&data[run.offset - 1]));
            }
            let end = run.offset + run.text.len();
            if end < data.len() {
                prop_assert!(!(0x20..=0x7E).contains(&data[end]));
            }
        }
    }

    /// Every reported byte hit satisfies b[p..p+|n|] == n, offsets are
    /// strictly increasing, and low-entropy needles never overlap.
    #[test]
    fn byte_hits_match_and_respect_policy(
        needle_bytes in proptest::collection::vec(prop_oneof![Just(0xAAu8), Just(0xBBu8), Just(0xCCu8)], 1..6),
        data in proptest::collection::vec(prop_oneof![Just(0xAAu8), Just(0xBBu8), Just(0xCCu8), any::<u8>()], 0..256),
    ) {
        let mut distinct: Vec<u8> = needle_bytes.clone();
        distinct.sort_unstable();
        distinct.dedup();
        let low_entropy = distinct.len() <= 2;

        let pattern = BytePattern {
            name: "needle".into(),
            bytes: needle_bytes.clone(),
            kind: ByteKind::Bytes,
        };
        let hits = scan_bytes(&data, &[pattern]);
        let mut prev_end: Option<usize> = None;
        let mut prev_off: Option<usize> = None;
        for hit in &hits {
            prop_assert_eq!(&data[hit.offset..hit.offset + needle_bytes.len()], &needle_bytes[..]);
            if let Some(prev) = prev_off {
                prop_assert!(hit.offset > prev);
            }
            if low_entropy {
                if let Some(end) = prev_end {
                    prop_assert!(hit.offset >= end, "low-entropy needles must not overlap");
                }
            }
            prev_off = Some(hit.offset);
            prev_end = Some(hit.offset + needle_bytes.len());
        }
    }

    /// Regex hit offsets are run offset plus intra-run match position, and
    /// the reported text is literally at that offset.
    #[test]
    fn regex_offsets_are_absolute(
        prefix in proptest::collection::vec(prop_oneof![Just(0u8), any::<u8>()], 0..64),
        middle in "[ -~]{0,40}",
    ) {
        let mut data = prefix.clone();
        data.extend(middle.as_bytes());
        data.extend(b" MARKER-99 ");
        let pattern = RegexPattern {
            name: "marker".into(),
            regex: RegexBuilder::new(r"MARKER-\d+").case_insensitive(true).build().unwrap(),
        };
        let runs = extract_ascii_runs(&data, 4);
        let hits = scan_runs(&runs, &[pattern]);
        prop_assert!(!hits.is_empty());
        for hit in hits {
            let slice = &data[hit.offset..hit.offset + hit.matched.len()];
            prop_assert_eq!(slice, hit.matched.as_bytes());
        }
    }
}

/// All-same-byte needles collapse to one hit per maximal constant run.
#[test]
fn constant_run_collapse_count() {
    let mut data = Vec::new();
    for run_len in [4usize, 9, 17] {
        data.extend(std::iter::repeat(0xEE).take(run_len));
        data.push(0x00);
    }
    let pattern = BytePattern { name: "pad".into(), bytes: vec![0xEE; 4], kind: ByteKind::Bytes };
    let hits = scan_bytes(&data, &[pattern]);
    assert_eq!(hits.len(), 3, "one emission per maximal run");
}

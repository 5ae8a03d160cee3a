//! pqscan - static detection of classical (non-post-quantum) cryptography.
//!
//! The library walks files and directory trees and reports uses of
//! RSA, DSA, DH, elliptic curves, DES/3DES, RC4, MD5, SHA-1 and friends
//! across native binaries, JAR/ZIP archives, compiled classes, Java,
//! Python and C/C++ sources, and PEM/DER certificate material. Every
//! finding is a [`Detection`] record suitable for CSV export and triage.
//!
//! # Example
//!
//! ```no_run
//! use pqscan::{Scanner, ScanOptions};
//!
//! let scanner = Scanner::new();
//! let options = ScanOptions { recurse: true, deep_jar: true };
//! for hit in scanner.scan_path("target-dir".as_ref(), &options).unwrap() {
//!     println!("{}: {} ({})", hit.file, hit.pattern, hit.severity);
//! }
//! ```
//!
//! Detection is lexical and byte-level by design: the scanner never
//! executes or decompiles its inputs and never resolves symbols
//! semantically.

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod patterns;
pub mod scanner;
pub mod scanners;
pub mod search;
pub mod strings;
pub mod types;

pub use config::SizeGates;
pub use error::{Result, ScanError};
pub use patterns::{loader, PatternCatalog};
pub use scanner::Scanner;
pub use types::{Detection, EvidenceType, ScanOptions, Severity};

use std::path::Path;

/// Scan a single file with a scanner built from the default catalog.
///
/// For batch work, construct one [`Scanner`] and reuse it; the catalog is
/// loaded once per scanner.
pub fn scan_file<P: AsRef<Path>>(path: P) -> Result<Vec<Detection>> {
    Scanner::new().scan_file(path.as_ref())
}

/// Scan a file or directory tree with the default catalog.
pub fn scan_path<P: AsRef<Path>>(path: P, options: &ScanOptions) -> Result<Vec<Detection>> {
    Scanner::new().scan_path(path.as_ref(), options)
}

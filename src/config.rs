//! Size gates and traversal policy.
//!
//! Size gates substitute for time bounds: an oversized file is skipped (or
//! downgraded to a head-limited binary scan for archives) instead of
//! risking an unbounded scan.

use std::path::Path;

pub const MIB: u64 = 1024 * 1024;

/// Per-kind size gates applied before routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGates {
    /// Source files (.java/.py/.c/...)
    pub source_max: u64,
    /// C/C++ headers
    pub header_max: u64,
    /// Single compiled classes
    pub class_max: u64,
    /// Archives above this are skipped entirely
    pub archive_hard_cap: u64,
    /// Archives above this are not opened; they fall back to a
    /// head-limited binary scan
    pub deep_walk_max: u64,
    /// Head read for the oversized-archive fallback
    pub archive_head: u64,
}

impl Default for SizeGates {
    fn default() -> Self {
        Self {
            source_max: 32 * MIB,
            header_max: 8 * MIB,
            class_max: 32 * MIB,
            archive_hard_cap: 1024 * MIB,
            deep_walk_max: 256 * MIB,
            archive_head: 16 * MIB,
        }
    }
}

/// System roots never descended into when a walk is rooted above them.
pub const DENY_ROOTS: &[&str] = &["/proc", "/sys", "/dev", "/run", "/lost+found"];

/// True when the path sits under a deny-listed system root.
pub fn is_denied_root(path: &Path) -> bool {
    DENY_ROOTS.iter().any(|root| {
        path == Path::new(root) || path.starts_with(Path::new(root))
    })
}

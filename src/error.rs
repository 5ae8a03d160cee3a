use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the scan pipeline.
///
/// Errors never abort a scan: the walker logs and skips, the loaders drop
/// the affected item and keep the rest. The variants exist so callers can
/// tell a skipped file from a broken catalog.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pattern catalog unavailable: {message}")]
    Catalog { message: String },

    #[error("decode failed for {what}: {message}")]
    Decode { what: String, message: String },

    #[error("malformed rule '{rule}': {message}")]
    Rule { rule: String, message: String },

    #[error("file exceeds size gate: {size} bytes > {limit} bytes")]
    SizeGate { size: u64, limit: u64 },

    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    #[error("archive read failed: {message}")]
    Archive { message: String },

    #[error("scan cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    pub fn catalog<S: Into<String>>(message: S) -> Self {
        Self::Catalog { message: message.into() }
    }

    pub fn decode<S1: Into<String>, S2: Into<String>>(what: S1, message: S2) -> Self {
        Self::Decode { what: what.into(), message: message.into() }
    }

    pub fn rule<S1: Into<String>, S2: Into<String>>(rule: S1, message: S2) -> Self {
        Self::Rule { rule: rule.into(), message: message.into() }
    }

    pub fn size_gate(size: u64, limit: u64) -> Self {
        Self::SizeGate { size, limit }
    }

    pub fn archive<S: Into<String>>(message: S) -> Self {
        Self::Archive { message: message.into() }
    }

    pub fn path_not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Returns true if the error is recoverable and scanning can continue.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

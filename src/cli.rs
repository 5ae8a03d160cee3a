//! Command-line interface definitions.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Text,
    /// Canonical CSV columns
    Csv,
    /// JSON array of detection records
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Csv => "csv",
            Self::Json => "json",
        })
    }
}

/// Static scanner for classical, non-post-quantum cryptography.
///
/// Scans binaries, JAR/ZIP archives, compiled classes, Java/Python/C/C++
/// sources and PEM/DER certificate material for RSA, DSA, DH, ECC,
/// DES/3DES, RC4, MD5, SHA-1 and related primitives.
#[derive(Debug, Parser)]
#[command(name = "pqscan", version, about)]
pub struct Cli {
    /// Files or directories to scan
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Recurse into directories (unbounded depth)
    #[arg(short, long)]
    pub recurse: bool,

    /// Open archives and scan entries individually
    #[arg(long = "deep-jar")]
    pub deep_jar: bool,

    /// Pattern catalog path (overrides CRYPTO_SCANNER_PATTERNS and the
    /// default locations)
    #[arg(long)]
    pub patterns: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Drop detections below this severity
    #[arg(long, value_parser = parse_severity)]
    pub min_severity: Option<crate::types::Severity>,

    /// Suppress the per-file progress line on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_severity(s: &str) -> Result<crate::types::Severity, String> {
    match s {
        "info" => Ok(crate::types::Severity::Info),
        "low" => Ok(crate::types::Severity::Low),
        "med" => Ok(crate::types::Severity::Med),
        "high" => Ok(crate::types::Severity::High),
        other => Err(format!("unknown severity '{other}' (info|low|med|high)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "pqscan",
            "--recurse",
            "--deep-jar",
            "--format",
            "csv",
            "--min-severity",
            "med",
            "/tmp/scanme",
        ]);
        assert!(cli.recurse);
        assert!(cli.deep_jar);
        assert_eq!(cli.format, OutputFormat::Csv);
        assert_eq!(cli.min_severity, Some(Severity::Med));
        assert_eq!(cli.paths.len(), 1);
    }

    #[test]
    fn rejects_bad_severity() {
        assert!(Cli::try_parse_from(["pqscan", "--min-severity", "extreme", "/x"]).is_err());
    }
}

//! Output formatting for the embedding shell: CSV with the canonical
//! column set, JSON for machine consumption, and a colored table for
//! terminals.

use crate::types::{Detection, Severity};
use anyhow::Result;
use colored::Colorize;
use std::io::Write;

/// Canonical CSV header.
pub const CSV_HEADER: &str = "file,offset_or_line,pattern,match,evidence,severity";

/// Write detections as CSV with the canonical columns.
pub fn write_csv<W: Write>(writer: &mut W, detections: &[Detection]) -> Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;
    for d in detections {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            csv_escape(&d.file),
            d.offset_or_line,
            csv_escape(&d.pattern),
            csv_escape(&d.matched),
            d.evidence,
            d.severity
        )?;
    }
    Ok(())
}

/// Write detections as a JSON array.
pub fn write_json<W: Write>(writer: &mut W, detections: &[Detection]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, detections)?;
    writeln!(writer)?;
    Ok(())
}

/// Human-readable listing, one line per detection, severity colored.
pub fn write_table<W: Write>(writer: &mut W, detections: &[Detection]) -> Result<()> {
    for d in detections {
        let position = if d.evidence.position_is_line() {
            format!("line {}", d.offset_or_line)
        } else {
            format!("@{}", d.offset_or_line)
        };
        let severity = match d.severity {
            Severity::High => d.severity.as_str().red().bold(),
            Severity::Med => d.severity.as_str().yellow(),
            Severity::Low => d.severity.as_str().normal(),
            Severity::Info => d.severity.as_str().dimmed(),
        };
        writeln!(
            writer,
            "{:>4}  {}  {}  [{}]  {}  {}",
            severity,
            d.file,
            position,
            d.evidence,
            d.pattern.bold(),
            truncate(&d.matched, 80)
        )?;
    }
    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

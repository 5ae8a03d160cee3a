use anyhow::{Context, Result};
use clap::Parser;
use pqscan::cli::{Cli, OutputFormat};
use pqscan::{loader, output, Detection, ScanOptions, Scanner};
use std::io::{IsTerminal, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let catalog = match &cli.patterns {
        Some(path) => loader::load_from_file(path),
        None => loader::load_default(),
    };
    if let Some(error) = &catalog.error {
        eprintln!("pqscan: {error}");
    }
    let scanner = Scanner::with_catalog(catalog);

    let options = ScanOptions { recurse: cli.recurse, deep_jar: cli.deep_jar };
    let show_progress = !cli.quiet && std::io::stderr().is_terminal();

    let mut detections: Vec<Detection> = Vec::new();
    for path in &cli.paths {
        scan_one(&scanner, path, &options, show_progress, &mut detections)?;
    }

    if let Some(min) = cli.min_severity {
        detections.retain(|d| d.severity >= min);
    }

    let mut writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    match cli.format {
        OutputFormat::Text => output::write_table(&mut writer, &detections)?,
        OutputFormat::Csv => output::write_csv(&mut writer, &detections)?,
        OutputFormat::Json => output::write_json(&mut writer, &detections)?,
    }

    if cli.format == OutputFormat::Text {
        eprintln!("{} detection(s)", detections.len());
    }
    Ok(())
}

fn scan_one(
    scanner: &Scanner,
    path: &Path,
    options: &ScanOptions,
    show_progress: bool,
    detections: &mut Vec<Detection>,
) -> Result<()> {
    if path.is_dir() {
        scanner
            .scan_path_streaming(
                path,
                options,
                |d| detections.push(d.clone()),
                |current, done_files, total_files, _done_bytes, _total_bytes| {
                    if show_progress {
                        eprint!("\r\x1b[2K[{done_files}/{total_files}] {}", current.display());
                        let _ = std::io::stderr().flush();
                    }
                },
                || false,
            )
            .with_context(|| format!("scanning {}", path.display()))?;
        if show_progress {
            eprintln!();
        }
    } else {
        let found = scanner
            .scan_file(path)
            .with_context(|| format!("scanning {}", path.display()))?;
        detections.extend(found);
    }
    Ok(())
}

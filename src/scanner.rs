//! The traversal driver: routes files, applies size gates and traversal
//! policy, and exposes batch and streaming scan modes.

use crate::config::{is_denied_root, SizeGates};
use crate::error::{Result, ScanError};
use crate::patterns::{loader, PatternCatalog};
use crate::scanners::{
    archive, binary, certkey, class_file, cpp, detect_content_kind, java, python, ContentKind,
    SNIFF_LEN,
};
use crate::types::{DedupSet, Detection, ScanOptions};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Crypto-primitive scanner with an immutable pattern catalog.
///
/// Construction loads the catalog once; a load failure leaves the scanner
/// operable (it simply yields no matches) with the error recorded on the
/// catalog.
pub struct Scanner {
    catalog: PatternCatalog,
    gates: SizeGates,
}

impl Scanner {
    /// Build a scanner from the default catalog resolution chain
    /// (`CRYPTO_SCANNER_PATTERNS`, `./patterns.json`, `./config/patterns.json`).
    pub fn new() -> Self {
        Self::with_catalog(loader::load_default())
    }

    pub fn with_catalog(catalog: PatternCatalog) -> Self {
        if let Some(error) = &catalog.error {
            warn!("scanner constructed with unavailable catalog: {error}");
        }
        Self { catalog, gates: SizeGates::default() }
    }

    #[must_use]
    pub fn with_gates(mut self, gates: SizeGates) -> Self {
        self.gates = gates;
        self
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    /// Scan a single file. Archives are always deep-walked on this path;
    /// a single-file scan is an explicit request for its contents.
    pub fn scan_file(&self, path: &Path) -> Result<Vec<Detection>> {
        self.scan_file_inner(path, true, &|| false)
    }

    /// Scan a file or directory tree, returning all detections at the end.
    pub fn scan_path(&self, root: &Path, options: &ScanOptions) -> Result<Vec<Detection>> {
        let mut out = Vec::new();
        self.scan_path_streaming(
            root,
            options,
            |d| out.push(d.clone()),
            |_, _, _, _, _| {},
            || false,
        )?;
        Ok(out)
    }

    /// Streaming scan with per-detection and per-file progress callbacks.
    ///
    /// `on_progress(current_path, done_files, total_files, done_bytes,
    /// total_bytes)` fires after each file. Cancellation is polled between
    /// files (and between archive entries); the in-flight file finishes and
    /// the final progress callback reflects whatever completed.
    pub fn scan_path_streaming<D, P, C>(
        &self,
        root: &Path,
        options: &ScanOptions,
        mut on_detect: D,
        mut on_progress: P,
        is_cancelled: C,
    ) -> Result<()>
    where
        D: FnMut(&Detection),
        P: FnMut(&Path, u64, u64, u64, u64),
        C: Fn() -> bool,
    {
        if !root.exists() {
            return Err(ScanError::path_not_found(root));
        }

        let files = enumerate_files(root, options.recurse);
        let total_files = files.len() as u64;
        let total_bytes: u64 = files.iter().map(|(_, size)| size).sum();
        let mut done_files = 0u64;
        let mut done_bytes = 0u64;

        for (path, size) in files {
            if is_cancelled() {
                debug!("scan cancelled after {done_files}/{total_files} files");
                break;
            }
            match self.scan_file_inner(&path, options.deep_jar, &is_cancelled) {
                Ok(detections) => {
                    for detection in &detections {
                        on_detect(detection);
                    }
                }
                Err(e) if e.is_recoverable() => {
                    debug!("skipping {}: {e}", path.display());
                }
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                }
            }
            done_files += 1;
            done_bytes += size;
            on_progress(&path, done_files, total_files, done_bytes, total_bytes);
        }

        Ok(())
    }

    fn scan_file_inner(
        &self,
        path: &Path,
        deep_archives: bool,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<Vec<Detection>> {
        let size = std::fs::metadata(path)?.len();
        let head = read_head(path, SNIFF_LEN)?;
        let kind = detect_content_kind(path, &head);
        let display = path.display().to_string();

        match kind {
            ContentKind::Archive => {
                if size > self.gates.archive_hard_cap {
                    return Err(ScanError::size_gate(size, self.gates.archive_hard_cap));
                }
                if !deep_archives || size > self.gates.deep_walk_max {
                    // Oversized or shallow mode: binary scan of the head
                    let data = read_head(path, self.gates.archive_head as usize)?;
                    return Ok(binary::scan_blob(&display, &data, &self.catalog, false));
                }
                archive::scan_archive(&display, path, &self.catalog, is_cancelled)
            }
            ContentKind::ClassFile => {
                if size > self.gates.class_max {
                    return Err(ScanError::size_gate(size, self.gates.class_max));
                }
                let data = std::fs::read(path)?;
                // Union of the bytecode scanner and the generic binary
                // scan; identical string hits collapse through the set.
                let mut out = class_file::scan_class(&display, &data, &self.catalog);
                out.extend(binary::scan_blob(&display, &data, &self.catalog, false));
                let mut dedup = DedupSet::new();
                out.retain(|d| dedup.admit(d));
                Ok(out)
            }
            ContentKind::JavaSource | ContentKind::PythonSource | ContentKind::CSource { .. } => {
                let gate = match kind {
                    ContentKind::CSource { header: true } => self.gates.header_max,
                    _ => self.gates.source_max,
                };
                if size > gate {
                    return Err(ScanError::size_gate(size, gate));
                }
                let data = std::fs::read(path)?;
                let code = String::from_utf8_lossy(&data);
                Ok(match kind {
                    ContentKind::JavaSource => java::scan_source(&display, &code, &self.catalog),
                    ContentKind::PythonSource => {
                        python::scan_source(&display, &code, &self.catalog)
                    }
                    _ => cpp::scan_source(&display, &code, &self.catalog),
                })
            }
            ContentKind::CertKey => {
                let data = std::fs::read(path)?;
                Ok(certkey::scan_certkey(&display, &data, &self.catalog))
            }
            ContentKind::Binary => {
                let data = std::fs::read(path)?;
                Ok(binary::scan_blob(&display, &data, &self.catalog, false))
            }
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Enumerate regular files under a root in walker order, skipping
/// permission errors silently and never descending into deny-listed
/// system roots. A plain-file root yields itself.
fn enumerate_files(root: &Path, recurse: bool) -> Vec<(PathBuf, u64)> {
    let max_depth = if recurse { usize::MAX } else { 1 };
    WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| !is_denied_root(entry.path()))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            (entry.into_path(), size)
        })
        .collect()
}

fn read_head(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut data = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut data)?;
    Ok(data)
}

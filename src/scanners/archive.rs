//! Archive walking: stream ZIP/JAR entries through the per-kind scanners.
//!
//! Entries under the archive metadata directory and noise extensions
//! (documentation, media, fonts, manifests, nested archives, signature
//! artifacts) are filtered before scanning. Every emission uses the
//! canonical `<archive>::<entry>` path. Nested archives are not opened.

use super::{binary, class_file, cpp, java, python};
use crate::config::MIB;
use crate::error::{Result, ScanError};
use crate::patterns::PatternCatalog;
use crate::types::{DedupSet, Detection};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Cap on a single decompressed entry.
const ENTRY_MAX: u64 = 64 * MIB;

const NOISE_EXTS: &[&str] = &[
    // documentation and text
    "md", "txt", "html", "htm", "css", "pdf", "doc", "docx", "rtf",
    // images and fonts
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "ttf", "otf", "woff", "woff2", "eot",
    // media
    "mp3", "mp4", "wav", "ogg", "avi", "mov",
    // nested archives (not recursed)
    "zip", "jar", "war", "ear", "gz", "bz2", "xz", "7z", "rar",
    // signature artifacts
    "sf", "rsa", "dsa", "ec",
    // manifests and structured config
    "properties", "xml", "json", "yml", "yaml", "toml", "ini", "mf",
];

/// Skip metadata-directory entries and noise extensions.
pub fn is_noise_entry(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    if lowered.starts_with("meta-inf/") {
        return true;
    }
    let base = lowered.rsplit('/').next().unwrap_or(&lowered);
    if base == "license" || base == "notice" {
        return true;
    }
    match base.rsplit_once('.') {
        Some((_, ext)) => NOISE_EXTS.contains(&ext),
        None => false,
    }
}

/// Walk an archive on disk, scanning each surviving entry. Cancellation
/// is polled between entries; the in-flight entry completes.
pub fn scan_archive(
    display_path: &str,
    path: &Path,
    catalog: &PatternCatalog,
    is_cancelled: &dyn Fn() -> bool,
) -> Result<Vec<Detection>> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ScanError::archive(format!("{}: {e}", path.display())))?;

    let mut out = Vec::new();
    let mut dedup = DedupSet::new();

    for i in 0..archive.len() {
        if is_cancelled() {
            debug!("cancelled inside archive {display_path} after {i} entries");
            break;
        }
        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(e) => {
                warn!("{display_path}: unreadable entry #{i}: {e}");
                continue;
            }
        };
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().replace('\\', "/");
        if is_noise_entry(&name) {
            continue;
        }

        let mut data = Vec::new();
        if let Err(e) = (&mut entry).take(ENTRY_MAX).read_to_end(&mut data) {
            warn!("{display_path}::{name}: read failed: {e}");
            continue;
        }

        let entry_path = format!("{display_path}::{name}");
        let mut found = scan_entry(&entry_path, &name, &data, catalog);
        dedup.retain_new(&mut found);
        out.extend(found);
    }

    Ok(out)
}

/// Route one extracted entry: classes to the bytecode scanner, sources to
/// their language scanner, everything else as generic binary.
fn scan_entry(
    entry_path: &str,
    name: &str,
    data: &[u8],
    catalog: &PatternCatalog,
) -> Vec<Detection> {
    let ext = name
        .rsplit('/')
        .next()
        .and_then(|base| base.rsplit_once('.'))
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "class" => class_file::scan_class(entry_path, data, catalog),
        "java" => java::scan_source(entry_path, &String::from_utf8_lossy(data), catalog),
        "py" => python::scan_source(entry_path, &String::from_utf8_lossy(data), catalog),
        "c" | "cc" | "cxx" | "cpp" | "h" | "hpp" | "hh" | "ld" => {
            cpp::scan_source(entry_path, &String::from_utf8_lossy(data), catalog)
        }
        _ => binary::scan_blob(entry_path, data, catalog, false),
    }
}

//! Font file classification: which files can be linked, and which need
//! a metrics sidecar linked next to them.

use std::fs;
use std::path::{Path, PathBuf};

/// Extensions (lowercase, without the dot) accepted into font sets.
pub const FONT_EXTENSIONS: &[&str] = &[
    "ttf", "ttc", "otf", "otc", "woff", "woff2", "dfont", "bin", "pfa", "pfb", "ps",
];

/// PostScript-family subset whose metrics live in separate AFM/PFM files.
/// MacBinary (`.bin`) may wrap a PostScript font, so it is included.
pub const METRICS_EXTENSIONS: &[&str] = &["bin", "pfa", "pfb", "ps"];

/// Metrics extensions in lookup priority order.
const METRICS_FILE_EXTENSIONS: &[&str] = &["afm", "pfm"];

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Case-insensitive check against [`FONT_EXTENSIONS`]; a leading dot is allowed.
pub fn is_font_extension(ext: &str) -> bool {
    FONT_EXTENSIONS.contains(&normalize(ext).as_str())
}

/// True for PostScript-family fonts that may come with AFM/PFM metrics.
pub fn requires_metrics(ext: &str) -> bool {
    METRICS_EXTENSIONS.contains(&normalize(ext).as_str())
}

/// True when the path's extension is a registered font extension.
pub fn is_font_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_font_extension)
}

/// Locate the metrics file for `base_name` (the font filename without
/// extension).
///
/// `dir` is searched first, then its `afm/` and `pfm/` subdirectories
/// (matched case-insensitively). Within each directory an AFM file wins
/// over a PFM file. Returns `None` when nothing matches or `dir` cannot be
/// read.
pub fn find_metrics(dir: &Path, base_name: &str) -> Option<PathBuf> {
    let mut search_dirs = vec![dir.to_path_buf()];
    search_dirs.extend(metrics_subdirs(dir));

    search_dirs
        .iter()
        .find_map(|candidate| find_metrics_in(candidate, base_name))
}

fn metrics_subdirs(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = sorted_entries(dir) else {
        return found;
    };

    for wanted in METRICS_FILE_EXTENSIONS {
        found.extend(
            entries
                .iter()
                .filter(|path| path.is_dir())
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
                })
                .cloned(),
        );
    }
    found
}

fn find_metrics_in(dir: &Path, base_name: &str) -> Option<PathBuf> {
    let entries = sorted_entries(dir).ok()?;

    METRICS_FILE_EXTENSIONS.iter().find_map(|wanted| {
        entries
            .iter()
            .find(|path| {
                path.is_file()
                    && path.file_stem().and_then(|s| s.to_str()) == Some(base_name)
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
            })
            .cloned()
    })
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    Ok(entries)
}

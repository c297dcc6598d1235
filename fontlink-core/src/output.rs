//! JSON helpers: streaming renderers for listings and atomic document files.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::catalog::{SetCatalog, SetId};
use crate::font_set::{CheckState, FontSet};

/// One row of a set listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSummary {
    /// 1-based position in the catalog.
    pub index: usize,
    pub name: String,
    pub active: usize,
    pub total: usize,
    pub state: SetState,
    pub selected: bool,
}

/// Serializable mirror of [`CheckState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetState {
    Off,
    On,
    Mixed,
}

impl From<CheckState> for SetState {
    fn from(state: CheckState) -> Self {
        match state {
            CheckState::Unchecked => SetState::Off,
            CheckState::Checked => SetState::On,
            CheckState::Indeterminate => SetState::Mixed,
        }
    }
}

/// One row of a font listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSummary {
    pub name: String,
    pub path: PathBuf,
    pub enabled: bool,
    pub linkable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_in: Option<PathBuf>,
}

/// Rows for every set, in catalog order.
pub fn summarize_sets(catalog: &SetCatalog, selected: Option<SetId>) -> Vec<SetSummary> {
    catalog
        .iter()
        .enumerate()
        .map(|(pos, (id, name, fonts))| SetSummary {
            index: pos + 1,
            name: name.to_string(),
            active: fonts.active_count(),
            total: fonts.len(),
            state: fonts.check_state().into(),
            selected: selected == Some(id),
        })
        .collect()
}

/// Rows for the fonts of `set`, sorted by name.
pub fn summarize_fonts(set: &FontSet) -> Vec<FontSummary> {
    set.sorted_indices()
        .into_iter()
        .filter_map(|index| set.get(index))
        .map(|entry| FontSummary {
            name: entry.name().to_string(),
            path: entry.source().to_path_buf(),
            enabled: entry.is_enabled(),
            linkable: entry.is_linkable(),
            installed_in: entry.installed_in().map(Path::to_path_buf),
        })
        .collect()
}

/// Write rows as a prettified JSON array.
pub fn write_json_pretty<T: Serialize>(rows: &[T], mut w: impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    w.write_all(json.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Write rows as newline-delimited JSON (NDJSON).
pub fn write_ndjson<T: Serialize>(rows: &[T], mut w: impl Write) -> Result<()> {
    for row in rows {
        let line = serde_json::to_string(row)?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

/// Read a JSON document. `None` when the file is missing or blank.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };

    if text.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&text)
        .map(Some)
        .with_context(|| format!("parsing {}", path.display()))
}

/// Write `value` as pretty JSON: a temporary file next to `path` is
/// filled, flushed and renamed over it, so readers never see half a file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut file, value)
        .with_context(|| format!("serializing {}", path.display()))?;
    file.write_all(b"\n")?;
    file.flush()?;
    file.persist(path)
        .map_err(|err| anyhow!(err.error))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

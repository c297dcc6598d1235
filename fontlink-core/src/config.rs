//! Where fontlink keeps its documents and its links.
//!
//! Each directory is taken from an explicit value, then from the
//! environment, then from the platform default:
//!
//! - config: `FONTLINK_CONFIG_DIR`, else `<user config dir>/fontlink`
//! - fonts: `FONTLINK_FONTS_DIR`, else the per-user font directory the
//!   host renderer scans (`~/.local/share/fonts` on Linux,
//!   `~/Library/Fonts` on macOS, `%LOCALAPPDATA%/Microsoft/Windows/Fonts`
//!   on Windows)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

pub const CONFIG_DIR_ENV: &str = "FONTLINK_CONFIG_DIR";
pub const FONTS_DIR_ENV: &str = "FONTLINK_FONTS_DIR";

const CATALOG_FILE: &str = "sets.json";
const SETTINGS_FILE: &str = "settings.json";

/// Resolved directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    config_dir: PathBuf,
    fonts_dir: PathBuf,
}

impl Paths {
    pub fn new(config_dir: impl Into<PathBuf>, fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            fonts_dir: fonts_dir.into(),
        }
    }

    /// Resolve both directories from explicit values, the environment and
    /// the platform defaults, in that order.
    pub fn resolve(config_dir: Option<PathBuf>, fonts_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = pick(config_dir, CONFIG_DIR_ENV, default_config_dir)?;
        let fonts_dir = pick(fonts_dir, FONTS_DIR_ENV, default_fonts_dir)?;
        Ok(Self::new(config_dir, fonts_dir))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// The managed fonts directory links are created in.
    pub fn fonts_dir(&self) -> &Path {
        &self.fonts_dir
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.config_dir.join(CATALOG_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Create both directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.fonts_dir] {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }
}

fn pick(
    explicit: Option<PathBuf>,
    var: &str,
    default: fn() -> Result<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    match env::var_os(var) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => default(),
    }
}

/// `<user config dir>/fontlink`.
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("fontlink"))
        .ok_or_else(|| anyhow!("could not determine the user configuration directory"))
}

/// The per-user font directory of this platform.
pub fn default_fonts_dir() -> Result<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .map(|home| home.join("Library").join("Fonts"))
            .ok_or_else(|| anyhow!("could not determine the home directory"))
    }

    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir()
            .map(|dir| dir.join("Microsoft").join("Windows").join("Fonts"))
            .ok_or_else(|| anyhow!("could not determine the local app data directory"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        dirs::data_dir()
            .map(|dir| dir.join("fonts"))
            .ok_or_else(|| anyhow!("could not determine the user data directory"))
    }
}

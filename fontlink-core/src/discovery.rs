//! Snapshot of fonts the host already provides.
//!
//! A font whose filename appears in the snapshot is treated as installed:
//! it is always enabled and never linked or unlinked by fontlink. The
//! snapshot is taken once per session and never refreshed.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::classify::is_font_path;

/// Installed fonts keyed by filename, mapped to their directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledFonts {
    fonts: HashMap<String, PathBuf>,
}

impl InstalledFonts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` under its filename; a later duplicate wins.
    pub fn insert_path(&mut self, path: &Path) {
        if let (Some(name), Some(dir)) = (path.file_name(), path.parent()) {
            self.fonts
                .insert(name.to_string_lossy().into_owned(), dir.to_path_buf());
        }
    }

    /// Directory providing `name`, if the host already has it.
    pub fn dir_of(&self, name: &str) -> Option<&Path> {
        self.fonts.get(name).map(PathBuf::as_path)
    }

    /// Drop every font found under `dir`.
    pub fn without_dir(mut self, dir: &Path) -> Self {
        self.fonts.retain(|_, found| !found.starts_with(dir));
        self
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl<P: AsRef<Path>> FromIterator<P> for InstalledFonts {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut fonts = Self::new();
        for path in iter {
            fonts.insert_path(path.as_ref());
        }
        fonts
    }
}

/// Source of the installed-font snapshot.
pub trait FontDiscovery {
    fn installed_fonts(&self) -> Result<InstalledFonts>;
}

/// Ask fontconfig through `fc-list : file`.
///
/// A missing `fc-list` binary is not an error: the host simply has no
/// discovery facility and the snapshot is empty.
#[derive(Debug, Clone)]
pub struct FcListDiscovery {
    program: PathBuf,
}

impl Default for FcListDiscovery {
    fn default() -> Self {
        Self {
            program: PathBuf::from("fc-list"),
        }
    }
}

impl FcListDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another executable in place of `fc-list`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl FontDiscovery for FcListDiscovery {
    fn installed_fonts(&self) -> Result<InstalledFonts> {
        let output = match Command::new(&self.program).args([":", "file"]).output() {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(program = %self.program.display(), "font discovery tool not found");
                return Ok(InstalledFonts::new());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("running {}", self.program.display()));
            }
        };

        if !output.status.success() {
            warn!(
                program = %self.program.display(),
                status = %output.status,
                "font discovery tool failed; assuming no installed fonts"
            );
            return Ok(InstalledFonts::new());
        }

        Ok(parse_fc_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `fc-list : file` output: one `path:` per line.
pub fn parse_fc_list(output: &str) -> InstalledFonts {
    output
        .lines()
        .map(|line| line.trim().trim_end_matches(':'))
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Recursive filesystem walker over explicit font roots.
#[derive(Debug, Clone)]
pub struct PathDiscovery {
    roots: Vec<PathBuf>,
    follow_symlinks: bool,
}

impl PathDiscovery {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let roots = roots.into_iter().map(Into::into).collect();
        Self {
            roots,
            follow_symlinks: false,
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }
}

impl PathDiscovery {
    fn scan_root(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            debug!(root = %root.display(), "skipping missing font root");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(self.follow_symlinks) {
            let entry = entry.with_context(|| format!("walking {}", root.display()))?;
            if entry.file_type().is_file() && is_font_path(entry.path()) {
                found.push(entry.into_path());
            }
        }
        Ok(found)
    }
}

impl FontDiscovery for PathDiscovery {
    /// Roots are walked in parallel; results are merged in root order, so
    /// a filename found under a later root wins.
    fn installed_fonts(&self) -> Result<InstalledFonts> {
        let per_root = self
            .roots
            .par_iter()
            .map(|root| self.scan_root(root))
            .collect::<Result<Vec<_>>>()?;

        Ok(per_root.into_iter().flatten().collect())
    }
}

/// Discovery that reports nothing installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscovery;

impl FontDiscovery for NoDiscovery {
    fn installed_fonts(&self) -> Result<InstalledFonts> {
        Ok(InstalledFonts::new())
    }
}

//! Reference-counted symlink groups.
//!
//! A [`LinkGroup`] is physically created when its count goes from zero to
//! one and removed when it drops back to zero, so any number of font
//! entries (e.g. in duplicated sets) can share the same links.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

/// One symlink: `target` (inside the managed fonts directory) points to
/// `source`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkPair {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl LinkPair {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Links created and removed as a unit: the main font file first, then
/// any sidecar files. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkGroup {
    pairs: Vec<LinkPair>,
}

impl LinkGroup {
    pub fn new(main: LinkPair) -> Self {
        Self { pairs: vec![main] }
    }

    /// Append a sidecar pair.
    pub fn with(mut self, pair: LinkPair) -> Self {
        self.pairs.push(pair);
        self
    }

    /// The main font file pair.
    pub fn main(&self) -> &LinkPair {
        &self.pairs[0]
    }

    pub fn pairs(&self) -> &[LinkPair] {
        &self.pairs
    }
}

/// Physical link operations behind the engine.
pub trait LinkBackend: fmt::Debug {
    fn link(&self, pair: &LinkPair) -> io::Result<()>;

    /// Whether `path` is currently a symbolic link.
    fn is_link(&self, path: &Path) -> bool;

    fn unlink(&self, path: &Path) -> io::Result<()>;
}

/// Real symlinks on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymlinkBackend;

impl LinkBackend for SymlinkBackend {
    fn link(&self, pair: &LinkPair) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&pair.source, &pair.target)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_file(&pair.source, &pair.target)
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = pair;
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "symlinks are not supported on this platform",
            ))
        }
    }

    fn is_link(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Bookkeeping only: never touches the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedBackend;

impl LinkBackend for DetachedBackend {
    fn link(&self, _pair: &LinkPair) -> io::Result<()> {
        Ok(())
    }

    fn is_link(&self, _path: &Path) -> bool {
        false
    }

    fn unlink(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Per-process link table mapping each live group to its reference count.
///
/// Physical failures are logged and swallowed; the count is what the rest
/// of the system relies on. Dropping the engine unlinks everything it still
/// holds.
#[derive(Debug)]
pub struct LinkEngine {
    backend: Box<dyn LinkBackend>,
    counts: HashMap<LinkGroup, usize>,
}

impl Default for LinkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEngine {
    /// Engine creating real symlinks.
    pub fn new() -> Self {
        Self::with_backend(SymlinkBackend)
    }

    /// Engine that only counts references.
    pub fn detached() -> Self {
        Self::with_backend(DetachedBackend)
    }

    pub fn with_backend(backend: impl LinkBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            counts: HashMap::new(),
        }
    }

    /// Take a reference on `group`, linking it if it was not yet live.
    pub fn create(&mut self, group: &LinkGroup) {
        let count = self.counts.entry(group.clone()).or_insert(0);
        if *count == 0 {
            for pair in group.pairs() {
                link_pair(self.backend.as_ref(), pair);
            }
        }
        *count += 1;
    }

    /// Release a reference on `group`, unlinking it when the last one goes.
    /// Releasing a group that holds no reference does nothing.
    pub fn remove(&mut self, group: &LinkGroup) {
        let Some(count) = self.counts.get_mut(group) else {
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            self.counts.remove(group);
            unlink_group(self.backend.as_ref(), group);
        }
    }

    /// Unlink every live group and forget all references.
    pub fn remove_all(&mut self) {
        if self.counts.is_empty() {
            return;
        }
        debug!(groups = self.counts.len(), "removing all font links");
        for (group, count) in self.counts.drain() {
            if count > 0 {
                unlink_group(self.backend.as_ref(), &group);
            }
        }
    }

    /// Current reference count of `group` (zero when untracked).
    pub fn ref_count(&self, group: &LinkGroup) -> usize {
        self.counts.get(group).copied().unwrap_or(0)
    }

    /// Number of live groups.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl Drop for LinkEngine {
    fn drop(&mut self) {
        self.remove_all();
    }
}

fn link_pair(backend: &dyn LinkBackend, pair: &LinkPair) {
    match backend.link(pair) {
        Ok(()) => trace!(
            source = %pair.source.display(),
            target = %pair.target.display(),
            "linked"
        ),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => debug!(
            target = %pair.target.display(),
            "link target already exists; leaving it alone"
        ),
        Err(err) => warn!(
            source = %pair.source.display(),
            target = %pair.target.display(),
            error = %err,
            "failed to create font link"
        ),
    }
}

fn unlink_group(backend: &dyn LinkBackend, group: &LinkGroup) {
    for pair in group.pairs() {
        // Only ever remove symlinks; a regular file at the target belongs
        // to the user.
        if !backend.is_link(&pair.target) {
            continue;
        }
        match backend.unlink(&pair.target) {
            Ok(()) => trace!(target = %pair.target.display(), "unlinked"),
            Err(err) => warn!(
                target = %pair.target.display(),
                error = %err,
                "failed to remove font link"
            ),
        }
    }
}

//! Font entries and the sets that hold them.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::classify::{find_metrics, is_font_extension, requires_metrics};
use crate::discovery::InstalledFonts;
use crate::link::{LinkEngine, LinkGroup, LinkPair};

/// Where links go and what the host already provides.
#[derive(Debug, Clone)]
pub struct FontEnv {
    fonts_dir: PathBuf,
    installed: InstalledFonts,
}

impl FontEnv {
    pub fn new(fonts_dir: impl Into<PathBuf>, installed: InstalledFonts) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            installed,
        }
    }

    /// The managed fonts directory.
    pub fn fonts_dir(&self) -> &Path {
        &self.fonts_dir
    }

    pub fn installed(&self) -> &InstalledFonts {
        &self.installed
    }
}

/// A font file to add, with its requested state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontItem {
    pub path: PathBuf,
    pub enabled: bool,
}

impl FontItem {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }
}

impl From<PathBuf> for FontItem {
    fn from(path: PathBuf) -> Self {
        Self::new(path, true)
    }
}

impl From<&Path> for FontItem {
    fn from(path: &Path) -> Self {
        Self::new(path, true)
    }
}

impl From<&str> for FontItem {
    fn from(path: &str) -> Self {
        Self::new(path, true)
    }
}

impl<P: Into<PathBuf>> From<(P, bool)> for FontItem {
    fn from((path, enabled): (P, bool)) -> Self {
        Self::new(path, enabled)
    }
}

/// One font placed into a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontEntry {
    links: LinkGroup,
    enabled: bool,
    linkable: bool,
    name: String,
    installed_in: Option<PathBuf>,
}

impl FontEntry {
    pub fn links(&self) -> &LinkGroup {
        &self.links
    }

    /// Path of the main font file.
    pub fn source(&self) -> &Path {
        &self.links.main().source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// False when the host already provides the font or the file was
    /// missing when it was added; such entries are always enabled.
    pub fn is_linkable(&self) -> bool {
        self.linkable
    }

    /// Filename of the main font file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of the already-installed font with the same filename.
    pub fn installed_in(&self) -> Option<&Path> {
        self.installed_in.as_deref()
    }

    fn holds_links(&self) -> bool {
        self.enabled && self.linkable
    }
}

/// Tri-state summary of a set, for checkbox rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    Checked,
    Indeterminate,
}

type ActiveObserver = Box<dyn FnMut(usize)>;

/// Ordered fonts, unique by filename, with a running count of enabled
/// entries.
#[derive(Default)]
pub struct FontSet {
    entries: Vec<FontEntry>,
    names: HashSet<String>,
    active_count: usize,
    observers: Vec<ActiveObserver>,
}

impl fmt::Debug for FontSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontSet")
            .field("entries", &self.entries)
            .field("active_count", &self.active_count)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl FontSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `observer` with the new count whenever `active_count` changes.
    pub fn observe(&mut self, observer: impl FnMut(usize) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Number of enabled entries.
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FontEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&FontEntry> {
        self.entries.get(index)
    }

    /// Index of the entry named `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Entry indices ordered by name, for display; storage order is
    /// left untouched.
    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.entries.len()).collect();
        indices.sort_by(|&a, &b| {
            let (a, b) = (&self.entries[a].name, &self.entries[b].name);
            a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
        });
        indices
    }

    pub fn check_state(&self) -> CheckState {
        if self.active_count == 0 {
            CheckState::Unchecked
        } else if self.active_count == self.entries.len() {
            CheckState::Checked
        } else {
            CheckState::Indeterminate
        }
    }

    /// Add fonts, skipping non-fonts, filenames already in the set and
    /// files inside the managed fonts directory. Returns how many were
    /// added.
    pub fn add<I, T>(&mut self, items: I, env: &FontEnv, engine: &mut LinkEngine) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Into<FontItem>,
    {
        let before = self.active_count;
        let mut added = 0;

        for item in items {
            let item = item.into();
            if let Some(entry) = self.build_entry(item, env) {
                self.push(entry, engine);
                added += 1;
            }
        }

        self.publish(before);
        added
    }

    fn build_entry(&self, item: FontItem, env: &FontEnv) -> Option<FontEntry> {
        let path = item.path;
        if path.to_str().is_none() {
            debug!(path = %path.display(), "skipping path that is not valid UTF-8");
            return None;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            debug!(path = %path.display(), "skipping path without a usable filename");
            return None;
        };
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if !is_font_extension(ext) {
            debug!(path = %path.display(), "skipping non-font file");
            return None;
        }
        if self.names.contains(&name) {
            debug!(%name, "font already in set");
            return None;
        }
        let font_dir = path.parent().unwrap_or(Path::new(""));
        if font_dir.starts_with(env.fonts_dir()) {
            debug!(path = %path.display(), "skipping font inside the managed directory");
            return None;
        }

        let installed_in = env.installed().dir_of(&name).map(Path::to_path_buf);
        let installed = installed_in.is_some();
        let file_exists = path.is_file();
        let linkable = file_exists && !installed;

        let mut links = LinkGroup::new(LinkPair::new(&path, env.fonts_dir().join(&name)));
        if file_exists && !installed && requires_metrics(ext) {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if let Some(metrics) = find_metrics(font_dir, stem) {
                if let Some(metrics_name) = metrics.file_name() {
                    let target = env.fonts_dir().join(metrics_name);
                    links = links.with(LinkPair::new(metrics, target));
                }
            }
        }

        Some(FontEntry {
            links,
            enabled: item.enabled || !linkable,
            linkable,
            name,
            installed_in,
        })
    }

    fn push(&mut self, entry: FontEntry, engine: &mut LinkEngine) {
        if entry.enabled {
            self.active_count += 1;
        }
        if entry.holds_links() {
            engine.create(&entry.links);
        }
        self.names.insert(entry.name.clone());
        self.entries.push(entry);
    }

    /// Copy entries from `other` that are not already here by name.
    pub fn add_all_from(&mut self, other: &FontSet, engine: &mut LinkEngine) -> usize {
        let before = self.active_count;
        let mut added = 0;

        for entry in &other.entries {
            if self.names.contains(&entry.name) {
                continue;
            }
            self.push(entry.clone(), engine);
            added += 1;
        }

        self.publish(before);
        added
    }

    /// Remove the entries at `indices`, or every entry when `None`.
    /// Indices out of range are ignored.
    pub fn remove(&mut self, indices: Option<&[usize]>, engine: &mut LinkEngine) {
        let before = self.active_count;

        match indices {
            None => {
                for entry in self.entries.drain(..) {
                    if entry.holds_links() {
                        engine.remove(&entry.links);
                    }
                }
                self.names.clear();
                self.active_count = 0;
            }
            Some(indices) => {
                let mut indices = indices.to_vec();
                indices.sort_unstable();
                indices.dedup();

                for index in indices.into_iter().rev() {
                    if index >= self.entries.len() {
                        continue;
                    }
                    let entry = self.entries.remove(index);
                    if entry.holds_links() {
                        engine.remove(&entry.links);
                    }
                    if entry.enabled {
                        self.active_count -= 1;
                    }
                    self.names.remove(&entry.name);
                }
            }
        }

        self.publish(before);
    }

    /// Flip one entry. Returns false when nothing changed (out of range or
    /// not linkable).
    pub fn toggle(&mut self, index: usize, engine: &mut LinkEngine) -> bool {
        let Some(entry) = self.entries.get(index) else {
            return false;
        };
        if !entry.linkable {
            return false;
        }

        let before = self.active_count;
        let enabled = !entry.enabled;
        self.apply(index, enabled, engine);
        self.publish(before);
        true
    }

    /// Bring every linkable entry to `enabled`.
    pub fn set_all(&mut self, enabled: bool, engine: &mut LinkEngine) {
        let before = self.active_count;
        for index in 0..self.entries.len() {
            let entry = &self.entries[index];
            if entry.linkable && entry.enabled != enabled {
                self.apply(index, enabled, engine);
            }
        }
        self.publish(before);
    }

    /// Enable everything unless everything is already enabled, in which
    /// case disable everything.
    pub fn toggle_all(&mut self, engine: &mut LinkEngine) {
        let enable = self.active_count < self.entries.len();
        self.set_all(enable, engine);
    }

    fn apply(&mut self, index: usize, enabled: bool, engine: &mut LinkEngine) {
        let entry = &mut self.entries[index];
        entry.enabled = enabled;
        if enabled {
            engine.create(&entry.links);
            self.active_count += 1;
        } else {
            engine.remove(&entry.links);
            self.active_count -= 1;
        }
    }

    fn publish(&mut self, before: usize) {
        if self.active_count == before {
            return;
        }
        let count = self.active_count;
        for observer in &mut self.observers {
            observer(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _tmp: TempDir,
        src: PathBuf,
        env: FontEnv,
    }

    fn fixture(installed: &[&str]) -> Fixture {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let fonts = tmp.path().join("fonts");
        fs::create_dir_all(&src).expect("mkdir src");
        fs::create_dir_all(&fonts).expect("mkdir fonts");
        let installed = installed
            .iter()
            .map(|name| PathBuf::from("/usr/share/fonts").join(name))
            .collect();
        Fixture {
            env: FontEnv::new(&fonts, installed),
            src,
            _tmp: tmp,
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").expect("touch");
        path
    }

    fn scan_active(set: &FontSet) -> usize {
        set.entries().iter().filter(|e| e.is_enabled()).count()
    }

    #[test]
    fn add_filters_rejected_items() {
        let fx = fixture(&[]);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();

        let a = touch(&fx.src, "A.ttf");
        let notes = touch(&fx.src, "notes.txt");
        let managed = touch(fx.env.fonts_dir(), "C.otf");

        let added = set.add(
            [a.clone(), notes, managed, a.clone(), fx.src.join("sub/A.ttf")],
            &fx.env,
            &mut engine,
        );

        assert_eq!(added, 1);
        assert_eq!(set.len(), 1);
        assert_eq!(set.entries()[0].name(), "A.ttf");
        assert_eq!(set.entries()[0].source(), a.as_path());
    }

    #[test]
    fn installed_fonts_are_enabled_and_never_linked() {
        let fx = fixture(&["Sys.ttf"]);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();
        let sys = touch(&fx.src, "Sys.ttf");

        set.add([(sys, false)], &fx.env, &mut engine);

        let entry = &set.entries()[0];
        assert!(entry.is_enabled());
        assert!(!entry.is_linkable());
        assert_eq!(entry.installed_in(), Some(Path::new("/usr/share/fonts")));
        assert!(engine.is_empty());
        assert!(!set.toggle(0, &mut engine));
        assert!(set.entries()[0].is_enabled());
    }

    #[test]
    fn missing_files_are_not_linkable() {
        let fx = fixture(&[]);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();

        set.add([(fx.src.join("Gone.ttf"), false)], &fx.env, &mut engine);

        let entry = &set.entries()[0];
        assert!(!entry.is_linkable());
        assert!(entry.is_enabled());
        assert!(engine.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn paths_that_are_not_utf8_are_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let fx = fixture(&[]);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();
        let latin1 = fx.src.join(OsStr::from_bytes(b"caf\xe9")).join("Foo.ttf");

        let added = set.add([latin1, touch(&fx.src, "Bar.ttf")], &fx.env, &mut engine);

        assert_eq!(added, 1);
        assert_eq!(set.entries()[0].name(), "Bar.ttf");
    }

    #[test]
    fn missing_postscript_fonts_skip_metrics() {
        let fx = fixture(&[]);
        touch(&fx.src, "Bar.afm");
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();

        set.add([fx.src.join("Bar.pfb")], &fx.env, &mut engine);

        let entry = &set.entries()[0];
        assert!(!entry.is_linkable());
        assert_eq!(entry.links().pairs().len(), 1);
    }

    #[test]
    fn postscript_fonts_pick_up_metrics() {
        let fx = fixture(&[]);
        let afm_dir = fx.src.join("afm");
        fs::create_dir_all(&afm_dir).expect("mkdir afm");
        let pfb = touch(&fx.src, "Bar.pfb");
        let afm = touch(&afm_dir, "Bar.afm");
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();

        set.add([pfb.clone()], &fx.env, &mut engine);

        let links = set.entries()[0].links();
        assert_eq!(
            links.pairs(),
            &[
                LinkPair::new(&pfb, fx.env.fonts_dir().join("Bar.pfb")),
                LinkPair::new(&afm, fx.env.fonts_dir().join("Bar.afm")),
            ]
        );
        assert_eq!(engine.ref_count(links), 1);
    }

    #[test]
    fn toggle_and_set_all_track_active_count() {
        let fx = fixture(&["Sys.ttf"]);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();
        let items = [
            (touch(&fx.src, "A.ttf"), true),
            (touch(&fx.src, "B.otf"), false),
            (touch(&fx.src, "Sys.ttf"), false),
        ];
        set.add(items, &fx.env, &mut engine);
        assert_eq!(set.active_count(), 2);
        assert_eq!(set.check_state(), CheckState::Indeterminate);

        assert!(set.toggle(1, &mut engine));
        assert_eq!(set.active_count(), 3);
        assert_eq!(set.check_state(), CheckState::Checked);

        set.set_all(false, &mut engine);
        assert_eq!(set.active_count(), 1, "installed font stays enabled");
        assert!(engine.is_empty());

        set.toggle_all(&mut engine);
        assert_eq!(set.active_count(), 3);
        assert_eq!(engine.len(), 2);
        assert_eq!(set.active_count(), scan_active(&set));
    }

    #[test]
    fn remove_releases_links_highest_index_first() {
        let fx = fixture(&[]);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();
        let names = ["A.ttf", "B.ttf", "C.ttf", "D.ttf"];
        set.add(
            names.iter().map(|n| touch(&fx.src, n)),
            &fx.env,
            &mut engine,
        );

        set.remove(Some(&[3, 0, 3, 9][..]), &mut engine);

        let left: Vec<&str> = set.entries().iter().map(FontEntry::name).collect();
        assert_eq!(left, vec!["B.ttf", "C.ttf"]);
        assert_eq!(engine.len(), 2);
        assert_eq!(set.active_count(), 2);
        assert!(!set.contains("A.ttf"));

        set.remove(None, &mut engine);
        assert!(set.is_empty());
        assert!(engine.is_empty());
        assert_eq!(set.check_state(), CheckState::Unchecked);
    }

    #[test]
    fn shared_groups_survive_removal_from_one_set() {
        let fx = fixture(&[]);
        let mut engine = LinkEngine::detached();
        let mut original = FontSet::new();
        original.add([touch(&fx.src, "A.ttf")], &fx.env, &mut engine);

        let mut copy = FontSet::new();
        copy.add_all_from(&original, &mut engine);
        let group = original.entries()[0].links().clone();
        assert_eq!(engine.ref_count(&group), 2);

        original.remove(None, &mut engine);
        assert_eq!(engine.ref_count(&group), 1);
        copy.toggle(0, &mut engine);
        assert_eq!(engine.ref_count(&group), 0);
    }

    #[test]
    fn observers_see_only_changes() {
        let fx = fixture(&[]);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        set.observe(move |count| sink.borrow_mut().push(count));

        set.add(
            [(touch(&fx.src, "A.ttf"), true), (touch(&fx.src, "B.ttf"), true)],
            &fx.env,
            &mut engine,
        );
        set.set_all(true, &mut engine);
        set.toggle(0, &mut engine);
        set.add([(touch(&fx.src, "C.ttf"), false)], &fx.env, &mut engine);

        assert_eq!(*seen.borrow(), vec![2, 1]);
    }

    #[test]
    fn sorted_indices_ignore_case() {
        let fx = fixture(&[]);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();
        set.add(
            ["b.ttf", "C.ttf", "A.ttf"].iter().map(|n| touch(&fx.src, n)),
            &fx.env,
            &mut engine,
        );

        assert_eq!(set.sorted_indices(), vec![2, 0, 1]);
        assert_eq!(set.find("C.ttf"), Some(1));
    }
}

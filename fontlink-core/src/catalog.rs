//! Named font sets and their persisted document.
//!
//! The document is a JSON array, in catalog order:
//!
//! ```json
//! [
//!   { "name": "Display", "fonts": [ { "enabled": true, "path": "/home/u/Foo.ttf" } ] }
//! ]
//! ```
//!
//! Only main font paths are stored; metrics sidecars are found again when
//! the document is loaded.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::font_set::{FontEnv, FontItem, FontSet};
use crate::link::LinkEngine;
use crate::naming::unique_name;
use crate::output::{read_json, write_json_atomic};

/// Name given to sets created without an explicit name, and to the set
/// that replaces the last deleted one.
pub const DEFAULT_SET_NAME: &str = "New set";

/// Stable handle to a set; survives insertions, moves and renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(u64);

/// One font in the persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontRecord {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub path: PathBuf,
}

fn default_enabled() -> bool {
    true
}

/// One set in the persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRecord {
    pub name: String,
    #[serde(default)]
    pub fonts: Vec<FontRecord>,
}

pub type CatalogDocument = Vec<SetRecord>;

type CatalogObserver = Rc<RefCell<dyn FnMut(SetId, usize)>>;

struct NamedSet {
    id: SetId,
    name: String,
    fonts: FontSet,
}

/// Ordered, uniquely named font sets.
#[derive(Default)]
pub struct SetCatalog {
    sets: Vec<NamedSet>,
    next_id: u64,
    observers: Vec<CatalogObserver>,
}

impl fmt::Debug for SetCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sets.iter().map(|s| (s.id, &s.name, &s.fonts)))
            .finish()
    }
}

impl SetCatalog {
    /// An empty catalog. Call [`SetCatalog::ensure_default`] (or load a
    /// document) before handing it to users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify `observer` with `(set, active_count)` whenever the active
    /// count of any set, current or future, changes.
    pub fn observe(&mut self, observer: impl FnMut(SetId, usize) + 'static) {
        let observer: CatalogObserver = Rc::new(RefCell::new(observer));
        for named in &mut self.sets {
            attach(&mut named.fonts, named.id, &observer);
        }
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Handles in catalog order.
    pub fn ids(&self) -> Vec<SetId> {
        self.sets.iter().map(|s| s.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SetId, &str, &FontSet)> {
        self.sets.iter().map(|s| (s.id, s.name.as_str(), &s.fonts))
    }

    pub fn position(&self, id: SetId) -> Option<usize> {
        self.sets.iter().position(|s| s.id == id)
    }

    pub fn id_at(&self, index: usize) -> Option<SetId> {
        self.sets.get(index).map(|s| s.id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<SetId> {
        self.sets.iter().find(|s| s.name == name).map(|s| s.id)
    }

    pub fn name(&self, id: SetId) -> Option<&str> {
        self.entry(id).map(|s| s.name.as_str())
    }

    pub fn get(&self, id: SetId) -> Option<&FontSet> {
        self.entry(id).map(|s| &s.fonts)
    }

    pub fn get_mut(&mut self, id: SetId) -> Option<&mut FontSet> {
        self.sets
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| &mut s.fonts)
    }

    fn entry(&self, id: SetId) -> Option<&NamedSet> {
        self.sets.iter().find(|s| s.id == id)
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|s| s.name.as_str())
    }

    /// Create an empty set named after `name` (made unique), placed right
    /// after `after` or at the end.
    pub fn add(&mut self, name: &str, after: Option<SetId>) -> SetId {
        let name = unique_name(name, self.names());
        self.insert(name, FontSet::new(), after)
    }

    /// Copy `id` into a new set placed right after it.
    pub fn duplicate(&mut self, id: SetId, engine: &mut LinkEngine) -> Option<SetId> {
        let source = self.entry(id)?;
        let name = unique_name(&source.name, self.names());
        let mut fonts = FontSet::new();
        fonts.add_all_from(&source.fonts, engine);
        Some(self.insert(name, fonts, Some(id)))
    }

    fn insert(&mut self, name: String, mut fonts: FontSet, after: Option<SetId>) -> SetId {
        let id = SetId(self.next_id);
        self.next_id += 1;
        for observer in &self.observers {
            attach(&mut fonts, id, observer);
        }

        let index = after
            .and_then(|after| self.position(after))
            .map_or(self.sets.len(), |pos| pos + 1);
        debug!(%name, index, "adding font set");
        self.sets.insert(index, NamedSet { id, name, fonts });
        id
    }

    /// Unlink and drop the set. A catalog left empty gets a fresh default
    /// set. Returns false for an unknown handle.
    pub fn remove(&mut self, id: SetId, engine: &mut LinkEngine) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let mut removed = self.sets.remove(index);
        removed.fonts.remove(None, engine);
        debug!(name = %removed.name, "removed font set");
        self.ensure_default();
        true
    }

    /// Rename a set. Surrounding whitespace is trimmed; an empty or
    /// unchanged name leaves the set alone, and a name taken by another set
    /// gets a ` #n` suffix. Returns the resulting name.
    pub fn rename(&mut self, id: SetId, new_name: &str) -> Option<String> {
        let index = self.position(id)?;
        let new_name = new_name.trim();
        let current = &self.sets[index].name;
        if new_name.is_empty() || new_name == current {
            return Some(current.clone());
        }

        let others = self
            .sets
            .iter()
            .filter(|s| s.id != id)
            .map(|s| s.name.as_str());
        let name = unique_name(new_name, others);
        self.sets[index].name = name.clone();
        Some(name)
    }

    /// Move a set to `index` (clamped to the catalog length).
    pub fn move_to(&mut self, id: SetId, index: usize) -> bool {
        let Some(from) = self.position(id) else {
            return false;
        };
        let named = self.sets.remove(from);
        let index = index.min(self.sets.len());
        self.sets.insert(index, named);
        true
    }

    /// Add a default set if the catalog is empty.
    pub fn ensure_default(&mut self) -> Option<SetId> {
        if self.sets.is_empty() {
            Some(self.add(DEFAULT_SET_NAME, None))
        } else {
            None
        }
    }

    /// The catalog as a persistable document.
    pub fn to_document(&self) -> CatalogDocument {
        self.sets
            .iter()
            .map(|named| SetRecord {
                name: named.name.clone(),
                fonts: named
                    .fonts
                    .entries()
                    .iter()
                    .map(|entry| FontRecord {
                        enabled: entry.is_enabled(),
                        path: entry.source().to_path_buf(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Append the sets of `document`, in order, relinking enabled fonts.
    pub fn load_document(
        &mut self,
        document: CatalogDocument,
        env: &FontEnv,
        engine: &mut LinkEngine,
    ) {
        let mut previous = None;
        for record in document {
            let id = self.add(&record.name, previous);
            let items = record
                .fonts
                .into_iter()
                .map(|font| FontItem::new(font.path, font.enabled));
            if let Some(fonts) = self.get_mut(id) {
                fonts.add(items, env, engine);
            }
            previous = Some(id);
        }
        self.ensure_default();
    }

    /// Build a catalog from the document at `path`. A missing or blank
    /// document yields one default set; unreadable or malformed documents
    /// are errors.
    pub fn load_from(path: &Path, env: &FontEnv, engine: &mut LinkEngine) -> Result<Self> {
        let document = read_document(path)?;
        let mut catalog = Self::new();
        catalog.load_document(document, env, engine);
        info!(sets = catalog.len(), path = %path.display(), "loaded font sets");
        Ok(catalog)
    }

    /// Write the catalog document to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        write_document(path, &self.to_document())
    }
}

fn attach(fonts: &mut FontSet, id: SetId, observer: &CatalogObserver) {
    let observer = Rc::clone(observer);
    fonts.observe(move |count| (&mut *observer.borrow_mut())(id, count));
}

/// Read a catalog document. A missing or blank file is an empty document.
pub fn read_document(path: &Path) -> Result<CatalogDocument> {
    Ok(read_json(path)?.unwrap_or_default())
}

/// Write a catalog document atomically.
pub fn write_document(path: &Path, document: &CatalogDocument) -> Result<()> {
    write_json_atomic(path, document)
}

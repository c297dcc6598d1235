//! A running fontlink session: paths, installed-font snapshot, link engine,
//! catalog and settings owned together.
//!
//! Opening a session loads settings, takes the installed-font snapshot and
//! loads the catalog, which relinks every enabled font. Closing it (or
//! dropping it) saves settings, then the catalog, then removes every link
//! the session still holds.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::catalog::{SetCatalog, SetId};
use crate::config::Paths;
use crate::discovery::{FontDiscovery, InstalledFonts};
use crate::font_set::{FontEnv, FontItem, FontSet};
use crate::link::LinkEngine;
use crate::settings::{Settings, SELECTED_SET};

#[derive(Debug)]
pub struct Session {
    paths: Paths,
    env: FontEnv,
    engine: LinkEngine,
    catalog: SetCatalog,
    settings: Settings,
    selected: Option<SetId>,
    closed: bool,
}

impl Session {
    /// Start a session. Only failing to create the directories is an
    /// error; unreadable documents and a failing discovery degrade to
    /// empty state with a warning.
    pub fn open(paths: Paths, discovery: &dyn FontDiscovery, engine: LinkEngine) -> Result<Self> {
        paths.ensure_dirs()?;

        let settings_file = paths.settings_file();
        let settings = Settings::load_from(&settings_file).unwrap_or_else(|err| {
            warn!(path = %settings_file.display(), error = %format!("{err:#}"), "ignoring unreadable settings");
            Settings::new()
        });

        let installed = discovery.installed_fonts().unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "font discovery failed; assuming no installed fonts");
            InstalledFonts::new()
        });
        // Links this or another session placed are not host fonts.
        let managed = paths.fonts_dir();
        let mut installed = installed.without_dir(managed);
        if let Ok(canonical) = managed.canonicalize() {
            installed = installed.without_dir(&canonical);
        }
        debug!(installed = installed.len(), "took installed font snapshot");
        let env = FontEnv::new(paths.fonts_dir(), installed);

        let mut engine = engine;
        let catalog_file = paths.catalog_file();
        let catalog =
            SetCatalog::load_from(&catalog_file, &env, &mut engine).unwrap_or_else(|err| {
                warn!(path = %catalog_file.display(), error = %format!("{err:#}"), "ignoring unreadable font sets");
                let mut catalog = SetCatalog::new();
                catalog.ensure_default();
                catalog
            });

        let selected = settings
            .get::<usize>(SELECTED_SET)
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| catalog.id_at(index));

        Ok(Self {
            paths,
            env,
            engine,
            catalog,
            settings,
            selected,
            closed: false,
        })
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn env(&self) -> &FontEnv {
        &self.env
    }

    pub fn engine(&self) -> &LinkEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &SetCatalog {
        &self.catalog
    }

    /// For operations that never touch links (observe, rename, move).
    pub fn catalog_mut(&mut self) -> &mut SetCatalog {
        &mut self.catalog
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// The selected set, falling back to the first one.
    pub fn selected(&self) -> SetId {
        match self.selected.filter(|id| self.catalog.position(*id).is_some()) {
            Some(id) => id,
            // The catalog gets a default set whenever it empties.
            None => self.catalog.ids()[0],
        }
    }

    pub fn select(&mut self, id: SetId) -> bool {
        if self.catalog.position(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn set(&self, id: SetId) -> Option<&FontSet> {
        self.catalog.get(id)
    }

    pub fn add_set(&mut self, name: &str, after: Option<SetId>) -> SetId {
        self.catalog.add(name, after)
    }

    pub fn duplicate_set(&mut self, id: SetId) -> Option<SetId> {
        self.catalog.duplicate(id, &mut self.engine)
    }

    /// Delete a set; if it was selected, the set that takes its place
    /// becomes selected.
    pub fn remove_set(&mut self, id: SetId) -> bool {
        let Some(position) = self.catalog.position(id) else {
            return false;
        };
        self.catalog.remove(id, &mut self.engine);
        if self.selected == Some(id) {
            let last = self.catalog.len().saturating_sub(1);
            self.selected = self.catalog.id_at(position.min(last));
        }
        true
    }

    pub fn add_fonts<I, T>(&mut self, id: SetId, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Into<FontItem>,
    {
        match self.catalog.get_mut(id) {
            Some(set) => set.add(items, &self.env, &mut self.engine),
            None => 0,
        }
    }

    pub fn remove_fonts(&mut self, id: SetId, indices: Option<&[usize]>) {
        if let Some(set) = self.catalog.get_mut(id) {
            set.remove(indices, &mut self.engine);
        }
    }

    pub fn toggle_font(&mut self, id: SetId, index: usize) -> bool {
        self.catalog
            .get_mut(id)
            .is_some_and(|set| set.toggle(index, &mut self.engine))
    }

    pub fn set_all(&mut self, id: SetId, enabled: bool) {
        if let Some(set) = self.catalog.get_mut(id) {
            set.set_all(enabled, &mut self.engine);
        }
    }

    pub fn toggle_all(&mut self, id: SetId) {
        if let Some(set) = self.catalog.get_mut(id) {
            set.toggle_all(&mut self.engine);
        }
    }

    /// Persist settings, then the catalog. Failures are logged.
    pub fn save(&mut self) {
        let selected = self.catalog.position(self.selected()).map(|pos| pos + 1);
        let stored = match selected {
            Some(index) => self.settings.set(SELECTED_SET, index),
            None => Ok(()),
        };
        if let Err(err) = stored {
            warn!(error = %format!("{err:#}"), "failed to record the selected set");
        }

        let settings_file = self.paths.settings_file();
        if let Err(err) = self.settings.save_to(&settings_file) {
            warn!(path = %settings_file.display(), error = %format!("{err:#}"), "failed to save settings");
        }

        let catalog_file = self.paths.catalog_file();
        match self.catalog.save_to(&catalog_file) {
            Ok(()) => debug!(path = %catalog_file.display(), "saved font sets"),
            Err(err) => {
                warn!(path = %catalog_file.display(), error = %format!("{err:#}"), "failed to save font sets")
            }
        }
    }

    /// Ordered shutdown: settings, catalog, then every remaining link.
    /// Runs once; later calls and the drop that follows do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.save();
        let live = self.engine.len();
        self.engine.remove_all();
        info!(links = live, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

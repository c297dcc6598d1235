//! Flat key/value settings persisted as a JSON object with sorted keys.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::output::{read_json, write_json_atomic};

/// 1-based index of the selected font set.
pub const SELECTED_SET: &str = "selected_set";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings; a missing or blank file gives empty settings.
    pub fn load_from(path: &Path) -> Result<Self> {
        let values = read_json(path)?.unwrap_or_default();
        Ok(Self { values })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.values)?;
        debug!(path = %path.display(), keys = self.values.len(), "saved settings");
        Ok(())
    }

    /// Typed value for `key`; `None` when absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value).with_context(|| format!("encoding {key}"))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

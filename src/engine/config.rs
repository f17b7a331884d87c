//! Match configuration lookup.
//!
//! Configuration arrives as already-deserialized content grouped into named
//! categories (`general`, `other`). The engine resolves durations once at
//! start and booleans at each rule decision point; a missing entry is a
//! fatal wiring error, not a default.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One configuration entry inside a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Entry name within its category
    #[serde(rename = "configurationName")]
    pub name: String,
    /// Entry value; booleans and numbers are the consumed types
    pub value: serde_json::Value,
}

/// Categorized configuration entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfig {
    /// Content schema version
    #[serde(default)]
    pub version: String,
    /// Entries per category
    #[serde(default)]
    pub configurations: HashMap<String, Vec<ConfigEntry>>,
}

impl GameConfig {
    /// Creates an empty configuration; entries are added with the `with_*`
    /// builders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a duration entry, in seconds.
    #[must_use]
    pub fn with_duration(self, category: &str, name: &str, seconds: u64) -> Self {
        self.with_value(category, name, serde_json::json!(seconds))
    }

    /// Adds a boolean entry.
    #[must_use]
    pub fn with_boolean(self, category: &str, name: &str, value: bool) -> Self {
        self.with_value(category, name, serde_json::json!(value))
    }

    fn with_value(mut self, category: &str, name: &str, value: serde_json::Value) -> Self {
        self.configurations
            .entry(category.to_string())
            .or_default()
            .push(ConfigEntry {
                name: name.to_string(),
                value,
            });
        self
    }

    /// Looks up a duration in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingConfiguration`] when the entry is
    /// absent or not a number.
    pub fn duration(&self, category: &str, name: &str) -> Result<u64, EngineError> {
        self.entry(category, name)?
            .value
            .as_u64()
            .ok_or_else(|| missing(category, name))
    }

    /// Looks up a boolean.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingConfiguration`] when the entry is
    /// absent or not a boolean.
    pub fn boolean(&self, category: &str, name: &str) -> Result<bool, EngineError> {
        self.entry(category, name)?
            .value
            .as_bool()
            .ok_or_else(|| missing(category, name))
    }

    fn entry(&self, category: &str, name: &str) -> Result<&ConfigEntry, EngineError> {
        self.configurations
            .get(category)
            .and_then(|entries| entries.iter().find(|e| e.name == name))
            .ok_or_else(|| missing(category, name))
    }
}

fn missing(category: &str, name: &str) -> EngineError {
    EngineError::MissingConfiguration {
        category: category.to_string(),
        name: name.to_string(),
    }
}

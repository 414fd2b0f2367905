//! Host settings store and the shared rendering-context limit.
//!
//! Settings are grouped per module. A module registers a schema for each key
//! it owns, which supplies the default when nothing is stored. Stored values
//! come from a TOML document with one table per module:
//!
//! ```toml
//! [fpp-3d-thumbnails]
//! maxContexts = 4
//!
//! [threeportrait]
//! maxContexts = 2
//! ```

use std::collections::HashMap;
use std::path::Path;

use crate::config::ConfigError;

/// Registered numeric setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingSchema {
    pub key: &'static str,
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

/// Maximum number of rendering contexts a module may hold at once.
pub const MAX_CONTEXTS: SettingSchema = SettingSchema {
    key: "maxContexts",
    min: 1,
    max: 10,
    default: 3,
};

#[derive(Debug, Default, Clone)]
pub struct Settings {
    values: toml::Table,
    registered: HashMap<(String, String), SettingSchema>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses stored values from TOML.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            values: toml::from_str(s)?,
            registered: HashMap::new(),
        })
    }

    /// Loads stored values from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    /// Registers `schema` under `module_id`, providing its default.
    pub fn register(&mut self, module_id: &str, schema: SettingSchema) {
        self.registered
            .insert((module_id.to_string(), schema.key.to_string()), schema);
    }

    /// Stores a value, replacing any previous one.
    pub fn set(&mut self, module_id: &str, key: &str, value: toml::Value) {
        let table = self
            .values
            .entry(module_id.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()));
        if !table.is_table() {
            *table = toml::Value::Table(toml::Table::new());
        }
        if let toml::Value::Table(t) = table {
            t.insert(key.to_string(), value);
        }
    }

    /// Returns the stored numeric value, else the registered default.
    ///
    /// A stored value that isn't a number yields `None`.
    pub fn get(&self, module_id: &str, key: &str) -> Option<f64> {
        let stored = self
            .values
            .get(module_id)
            .and_then(|v| v.as_table())
            .and_then(|t| t.get(key));

        match stored {
            Some(toml::Value::Integer(i)) => Some(*i as f64),
            Some(toml::Value::Float(f)) => Some(*f),
            Some(_) => None,
            None => self
                .registered
                .get(&(module_id.to_string(), key.to_string()))
                .map(|schema| schema.default as f64),
        }
    }
}

fn as_context_limit(value: Option<f64>) -> usize {
    match value {
        Some(n) if n.is_finite() => n
            .floor()
            .clamp(MAX_CONTEXTS.min as f64, MAX_CONTEXTS.max as f64) as usize,
        _ => 1,
    }
}

/// The concurrency limit shared with the companion module's previews.
///
/// Each module's `maxContexts` counts as 1 if unset or non-numeric. The
/// result is the smaller of the two, within `1..=10`.
pub fn effective_concurrency(settings: &Settings, module_id: &str, companion_id: &str) -> usize {
    let own = as_context_limit(settings.get(module_id, MAX_CONTEXTS.key));
    let companion = as_context_limit(settings.get(companion_id, MAX_CONTEXTS.key));
    own.min(companion)
}

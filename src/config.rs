//! Keyed configuration provider
//!
//! Index construction and ranker selection are driven by a JSON document of
//! nested tables. Accessors are optional and typed: absent keys and
//! mistyped values both read as `None`, so callers decide which keys are
//! required.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{CuttleError, Result};

/// A tree of configuration keys backed by a JSON object
#[derive(Clone, Debug, Default)]
pub struct Config {
    root: Map<String, Value>,
}

impl Config {
    /// Load a configuration tree from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let value: Value = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CuttleError::Config(format!("invalid configuration file: {}", e)))?;
        Self::from_value(value)
    }

    /// Build a configuration tree from an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(CuttleError::Config(format!(
                "configuration root must be an object, got {}",
                other
            ))),
        }
    }

    /// Typed lookup of a top-level key; `None` if absent or of the wrong type
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.root
            .get(key)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Like [`get_as`](Self::get_as) but missing keys are an error
    pub fn require_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_as(key)
            .ok_or_else(|| CuttleError::Config(key.to_string()))
    }

    /// A nested table under `key`, if present
    pub fn get_table(&self, key: &str) -> Option<Config> {
        match self.root.get(key) {
            Some(Value::Object(table)) => Some(Config { root: table.clone() }),
            _ => None,
        }
    }

    /// An array of nested tables under `key`, if present
    pub fn get_table_array(&self, key: &str) -> Option<Vec<Config>> {
        match self.root.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Object(table) => Some(Config { root: table.clone() }),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

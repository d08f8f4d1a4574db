//! In-memory store backend.
//!
//! Holds a flat map of subtree paths to their values. Used on hosts without
//! a native registry and as the reader in tests. A fixture can be described
//! in YAML:
//!
//! ```yaml
//! keys:
//!   - root: HKCU
//!     path: Software\Microsoft\Windows\CurrentVersion\Run
//!     values:
//!       - name: Updater
//!         type: REG_SZ
//!         data: C:\upd.exe
//!   - root: HKLM
//!     path: SAM\SAM
//!     denied: true
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::types::{Entry, Hive, SourceError, StoreReader, Value, ValueType, normalize_path};

/// Errors raised while loading a fixture file.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value '{name}' under '{path}': {reason}")]
    InvalidValue {
        path: String,
        name: String,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    keys: Vec<FixtureKey>,
}

#[derive(Debug, Deserialize)]
struct FixtureKey {
    root: Hive,
    path: String,
    #[serde(default)]
    denied: bool,
    #[serde(default)]
    values: Vec<FixtureValue>,
}

#[derive(Debug, Deserialize)]
struct FixtureValue {
    name: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    #[serde(default)]
    data: serde_yaml::Value,
}

#[derive(Debug, Clone)]
enum Node {
    Values(Vec<Entry>),
    Denied,
}

/// Store backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    nodes: HashMap<(Hive, String), Node>,
}

impl FixtureStore {
    /// Create an empty store. Every lookup reports `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a readable subtree holding `entries` in the given order.
    pub fn with_key(mut self, root: Hive, path: &str, entries: Vec<Entry>) -> Self {
        self.nodes
            .insert((root, normalize_path(path)), Node::Values(entries));
        self
    }

    /// Add a subtree that exists but refuses to be read.
    pub fn with_denied(mut self, root: Hive, path: &str) -> Self {
        self.nodes.insert((root, normalize_path(path)), Node::Denied);
        self
    }

    /// Load a fixture from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a fixture from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, FixtureError> {
        let file: FixtureFile = serde_yaml::from_str(content)?;
        let mut store = Self::new();

        for key in file.keys {
            if key.denied {
                store = store.with_denied(key.root, &key.path);
                continue;
            }
            let entries = key
                .values
                .into_iter()
                .map(|v| {
                    let value = decode_value(v.value_type, &v.data).map_err(|reason| {
                        FixtureError::InvalidValue {
                            path: key.path.clone(),
                            name: v.name.clone(),
                            reason,
                        }
                    })?;
                    Ok(Entry::new(v.name, value, v.value_type))
                })
                .collect::<Result<Vec<_>, FixtureError>>()?;
            store = store.with_key(key.root, &key.path, entries);
        }

        Ok(store)
    }

    /// Number of subtrees in the store.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no subtrees.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl StoreReader for FixtureStore {
    fn name(&self) -> &str {
        "fixture"
    }

    fn enumerate(&self, root: Hive, path: &str) -> Result<Vec<Entry>, SourceError> {
        match self.nodes.get(&(root, normalize_path(path))) {
            Some(Node::Values(entries)) => Ok(entries.clone()),
            Some(Node::Denied) => Err(SourceError::access(path, "access is denied")),
            None => Err(SourceError::NotFound {
                path: path.to_string(),
            }),
        }
    }
}

/// Interpret fixture `data` according to its declared type.
fn decode_value(value_type: ValueType, data: &serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    match value_type {
        ValueType::REG_SZ | ValueType::REG_EXPAND_SZ | ValueType::REG_LINK => match data {
            Yaml::String(s) => Ok(Value::String(s.clone())),
            Yaml::Number(n) => Ok(Value::String(n.to_string())),
            Yaml::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err("expected a string".to_string()),
        },
        ValueType::REG_DWORD | ValueType::REG_DWORD_BIG_ENDIAN => {
            let n = data.as_u64().ok_or("expected an unsigned integer")?;
            u32::try_from(n)
                .map(Value::from)
                .map_err(|_| format!("{n} does not fit in 32 bits"))
        }
        ValueType::REG_QWORD => data
            .as_u64()
            .map(Value::Integer)
            .ok_or_else(|| "expected an unsigned integer".to_string()),
        ValueType::REG_MULTI_SZ => match data {
            Yaml::Sequence(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| "expected a list of strings".to_string())
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::MultiString),
            _ => Err("expected a list of strings".to_string()),
        },
        ValueType::REG_BINARY | ValueType::REG_NONE | ValueType::REG_OTHER => match data {
            Yaml::String(s) => hex::decode(s.trim())
                .map(Value::Bytes)
                .map_err(|e| format!("invalid hex: {e}")),
            Yaml::Null => Ok(Value::Bytes(Vec::new())),
            _ => Err("expected a hex string".to_string()),
        },
    }
}

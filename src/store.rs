//! Durable variable namespace shared by all steps of a run.
//!
//! The store is a single flat mapping from variable name to the
//! last-known JSON value. Captured variables are never deleted
//! automatically; they live for the lifetime of the backing store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read/write access to the variable namespace.
///
/// Implementations are confined to a single execution context per
/// run: the file backing rewrites the whole namespace on every `set`,
/// so two concurrent writers would lose updates (last-writer-wins).
pub trait VariableStore: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;
    fn set(&mut self, name: &str, value: Value) -> Result<()>;
    fn snapshot(&self) -> HashMap<String, Value>;
}

/// In-memory store, the default for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    variables: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with initial variables.
    pub fn with_variables(variables: HashMap<String, Value>) -> Self {
        Self { variables }
    }
}

impl VariableStore for MemoryStore {
    fn get(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: Value) -> Result<()> {
        debug!("Saved variable '{}' = {:?}", name, value);
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    fn snapshot(&self) -> HashMap<String, Value> {
        self.variables.clone()
    }
}

/// On-disk serialization of the variable namespace.
#[derive(Debug, Default, Serialize, Deserialize)]
struct VariablesFile {
    #[serde(default)]
    variables: HashMap<String, Value>,
}

/// YAML-file-backed store.
///
/// Every `set` is a full read-merge-write: the entire namespace is
/// read, one key updated, the entire namespace rewritten. A missing
/// file reads as an empty namespace.
#[derive(Debug)]
pub struct YamlFileStore {
    path: PathBuf,
}

impl YamlFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> Result<VariablesFile> {
        if !self.path.exists() {
            return Ok(VariablesFile::default());
        }
        let content = fs::read_to_string(&self.path).context(format!(
            "Failed to read variables file: {}",
            self.path.display()
        ))?;
        serde_yaml::from_str(&content).context(format!(
            "Failed to parse variables file: {}",
            self.path.display()
        ))
    }

    fn write(&self, file: &VariablesFile) -> Result<()> {
        let content = serde_yaml::to_string(file)?;
        fs::write(&self.path, content).context(format!(
            "Failed to write variables file: {}",
            self.path.display()
        ))
    }
}

impl VariableStore for YamlFileStore {
    fn get(&self, name: &str) -> Option<Value> {
        self.read().ok()?.variables.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let mut file = self.read()?;
        debug!("Saved variable '{}' = {:?}", name, value);
        file.variables.insert(name.to_string(), value);
        self.write(&file)
    }

    fn snapshot(&self) -> HashMap<String, Value> {
        self.read().map(|f| f.variables).unwrap_or_default()
    }
}

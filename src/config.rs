//! Scenario file discovery and loading.

use crate::model::Scenario;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads scenario files from a set of search paths.
#[derive(Debug)]
pub struct ScenarioLoader {
    pub search_paths: Vec<PathBuf>,
}

impl ScenarioLoader {
    pub fn new() -> Self {
        Self {
            search_paths: vec![PathBuf::from("tests/scenarios")],
        }
    }

    pub fn add_path<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Load a single scenario file.
    pub fn load_scenario<P: AsRef<Path>>(&self, path: P) -> Result<Scenario> {
        let path = path.as_ref();
        info!("Loading scenario from {}", path.display());

        let content = fs::read_to_string(path).context(format!(
            "Failed to read scenario file: {}",
            path.display()
        ))?;

        let scenario = Scenario::from_yaml(&content).context(format!(
            "Failed to parse YAML from {}",
            path.display()
        ))?;

        debug!("Successfully loaded scenario: {}", scenario.name);
        Ok(scenario)
    }

    /// Load every scenario file directly inside a directory.
    pub fn load_scenarios_from_dir<P: AsRef<Path>>(
        &self,
        dir: P,
    ) -> Result<Vec<Scenario>> {
        let dir = dir.as_ref();
        info!("Loading scenarios from directory: {}", dir.display());

        let mut scenarios = Vec::new();

        for entry in fs::read_dir(dir).context(format!(
            "Failed to read directory: {}",
            dir.display()
        ))? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && is_scenario_file(&path) {
                match self.load_scenario(&path) {
                    Ok(scenario) => scenarios.push(scenario),
                    Err(err) => {
                        debug!(
                            "Failed to load scenario from {}: {}",
                            path.display(),
                            err
                        );
                    }
                }
            }
        }

        info!(
            "Loaded {} scenarios from {}",
            scenarios.len(),
            dir.display()
        );
        Ok(scenarios)
    }

    /// Load from every configured search path that exists.
    pub fn load_all_scenarios(&self) -> Result<Vec<Scenario>> {
        let mut all_scenarios = Vec::new();

        for path in &self.search_paths {
            if path.exists() && path.is_dir() {
                match self.load_scenarios_from_dir(path) {
                    Ok(mut scenarios) => all_scenarios.append(&mut scenarios),
                    Err(err) => {
                        debug!(
                            "Failed to load scenarios from {}: {}",
                            path.display(),
                            err
                        );
                    }
                }
            }
        }

        info!("Loaded {} scenarios in total", all_scenarios.len());
        Ok(all_scenarios)
    }
}

impl Default for ScenarioLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Return `true` for `.yaml` / `.yml` files.
fn is_scenario_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

//! Pipeline definition registry

pub mod trigger;

use crate::core::config::PipelineConfig;
use crate::core::PipelineDefinition;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

pub use trigger::{score_trigger, TriggerMatch};

/// Holds immutable pipeline definitions keyed by id
///
/// Shared read-only across concurrent runs; `reload` swaps the whole map
/// so a reader sees either the old set or the new one.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    definitions: RwLock<HashMap<String, Arc<PipelineDefinition>>>,
    source_dir: RwLock<Option<PathBuf>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry by loading every definition in `dir`
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let registry = Self::new();
        registry.load(dir)?;
        Ok(registry)
    }

    /// Load all definitions from a directory
    ///
    /// Malformed files and files without an id are skipped with a warning.
    /// Only an unreadable directory is an error. Returns the number loaded.
    pub fn load<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let loaded = read_definitions(dir)?;
        let count = loaded.len();

        {
            let mut definitions = self.write_definitions();
            for definition in loaded {
                definitions.insert(definition.id.clone(), Arc::new(definition));
            }
        }
        *self
            .source_dir
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(dir.to_path_buf());

        info!("Loaded {} pipeline definition(s) from {}", count, dir.display());
        Ok(count)
    }

    /// Re-read the directory given to `load`, replacing all definitions
    pub fn reload(&self) -> Result<usize> {
        let dir = self
            .source_dir
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .context("Registry was never loaded from a directory")?;

        let fresh: HashMap<String, Arc<PipelineDefinition>> = read_definitions(&dir)?
            .into_iter()
            .map(|definition| (definition.id.clone(), Arc::new(definition)))
            .collect();
        let count = fresh.len();

        *self.write_definitions() = fresh;
        info!("Reloaded {} pipeline definition(s) from {}", count, dir.display());
        Ok(count)
    }

    /// Register a definition directly, replacing any with the same id
    pub fn register(&self, definition: PipelineDefinition) {
        let id = definition.id.clone();
        if self
            .write_definitions()
            .insert(id.clone(), Arc::new(definition))
            .is_some()
        {
            debug!("Replaced pipeline definition '{}'", id);
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<PipelineDefinition>> {
        self.read_definitions().get(id).cloned()
    }

    /// All definitions, sorted by id
    pub fn list(&self) -> Vec<Arc<PipelineDefinition>> {
        let mut definitions: Vec<_> = self.read_definitions().values().cloned().collect();
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        definitions
    }

    pub fn len(&self) -> usize {
        self.read_definitions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_definitions().is_empty()
    }

    fn read_definitions(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<PipelineDefinition>>> {
        self.definitions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_definitions(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<PipelineDefinition>>> {
        self.definitions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn is_definition_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml" | "json"))
}

fn read_definitions(dir: &Path) -> Result<Vec<PipelineDefinition>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read pipeline directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_definition_file(path))
        .collect();
    paths.sort();

    let mut definitions = Vec::new();
    for path in paths {
        match PipelineConfig::from_file(&path) {
            Ok(config) => {
                debug!("Parsed pipeline '{}' from {}", config.id, path.display());
                definitions.push(config.to_definition());
            }
            Err(e) => warn!("Skipping pipeline file {}: {:#}", path.display(), e),
        }
    }

    Ok(definitions)
}

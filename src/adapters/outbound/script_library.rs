use std::collections::HashMap;
use std::path::PathBuf;

use crate::common::ConfigError;
use crate::domains::trajectory::ScriptSource;

/// Script directory on disk.
///
/// Names resolve case-insensitively (lowercased), as the authored script
/// corpus mixes cases freely.
pub struct FilesystemScriptSource {
    base: PathBuf,
}

impl FilesystemScriptSource {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &PathBuf {
        &self.base
    }
}

impl ScriptSource for FilesystemScriptSource {
    fn resolve(&self, name: &str) -> Result<String, ConfigError> {
        let path = self.base.join(name.to_lowercase());
        std::fs::read_to_string(&path).map_err(|_| ConfigError::ScriptNotFound {
            name: name.to_string(),
        })
    }
}

/// In-memory scripts, used by tests and for generated build programs.
#[derive(Debug, Clone, Default)]
pub struct MemoryScriptSource {
    scripts: HashMap<String, String>,
}

impl MemoryScriptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, text: &str) {
        self.scripts.insert(name.to_string(), text.to_string());
    }
}

impl ScriptSource for MemoryScriptSource {
    fn resolve(&self, name: &str) -> Result<String, ConfigError> {
        self.scripts
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::ScriptNotFound {
                name: name.to_string(),
            })
    }
}

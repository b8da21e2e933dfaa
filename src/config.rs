use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::ConfigError;

/// One simulation's worth of configuration, read from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub name: String,
    /// JSON position graph the bots move on.
    pub map: String,
    /// Directory holding the authored build scripts.
    pub scripts_dir: String,
    /// Root routine to run. Ignored when `sequence` is set.
    #[serde(default)]
    pub routine: Option<String>,
    /// Generate the build program from `structure` instead of running an
    /// authored routine.
    #[serde(default)]
    pub sequence: bool,
    /// JSON structure geometry, required when `sequence` is set.
    #[serde(default)]
    pub structure: Option<String>,
    #[serde(default)]
    pub bots: Vec<BotSpec>,
    #[serde(default)]
    pub node_aliases: BTreeMap<String, String>,
    /// Rod type -> feed node (alias or node name).
    #[serde(default)]
    pub feed_zones: BTreeMap<String, String>,
    /// Bot type -> rod mounting offset relative to the bot.
    #[serde(default)]
    pub mount_offsets: BTreeMap<String, [f32; 3]>,
    #[serde(default = "default_true")]
    pub dual_build: bool,
    #[serde(default = "default_states_per_chunk")]
    pub states_per_chunk: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub bot_type: String,
    /// Start node, alias or node name.
    pub start: String,
}

fn default_true() -> bool {
    true
}

fn default_states_per_chunk() -> usize {
    crate::domains::simulation::STATES_PER_CHUNK
}

fn default_output_dir() -> String {
    "paths".to_string()
}

impl SimulationConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::Invalid {
            reason: e.to_string(),
        })
    }

    /// Resolve a node alias to its node name; unknown aliases pass through
    /// as literal node names.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.node_aliases.get(name).map(|s| s.as_str()).unwrap_or(name)
    }
}

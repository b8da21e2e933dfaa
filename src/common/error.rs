use thiserror::Error;

/// Configuration and input-resolution failures. All fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Script not found: {name}")]
    ScriptNotFound { name: String },

    #[error("Malformed line in script {script}: {line}")]
    MalformedScript { script: String, line: String },

    #[error("Bad argument for {command}: {reason}")]
    BadArgument { command: String, reason: String },

    #[error("Unknown node: {name}")]
    UnknownNode { name: String },

    #[error("No feed zone configured for rod type {rod_type}")]
    UnknownFeedZone { rod_type: String },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Geometry classification and ordering failures in the build sequencer. All fatal.
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("Rod {index} from {v1:?} to {v2:?} is not axis-aligned")]
    NonAxisAligned {
        index: usize,
        v1: [f32; 3],
        v2: [f32; 3],
    },

    #[error("Cannot enter {to} phase from {from} (rod {index})")]
    IllegalPhaseTransition {
        from: String,
        to: String,
        index: usize,
    },

    #[error("Rod {index} references unknown vertex {vertex}")]
    UnknownVertex { index: usize, vertex: String },

    #[error("Structure has no vertical rods to anchor trees on")]
    NoTreeAnchors,
}

/// Contradictory control inputs detected during motion execution. Fatal.
#[derive(Error, Debug)]
pub enum MotionError {
    #[error("Bot {bot} commanded to {targets:?} simultaneously on frame {frame}")]
    Conflict {
        bot: String,
        frame: u64,
        targets: Vec<String>,
    },
}

/// Top-level simulator error.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Motion error: {0}")]
    Motion(#[from] MotionError),

    #[error("State store error: {0}")]
    StateStore(String),
}

pub type SimResult<T> = Result<T, SimError>;

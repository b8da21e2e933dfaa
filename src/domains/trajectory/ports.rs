use crate::common::ConfigError;

/// Resolves a script name to its text.
///
/// Production uses the filesystem adapter; tests and the build sequencer use
/// the in-memory adapter.
pub trait ScriptSource {
    fn resolve(&self, name: &str) -> Result<String, ConfigError>;
}

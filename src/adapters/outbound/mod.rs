pub mod script_library;
pub mod state_store;

pub use script_library::{FilesystemScriptSource, MemoryScriptSource};
pub use state_store::{FilesystemStateStore, MemoryStateStore};

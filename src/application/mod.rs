pub mod playback;
pub mod sim_service;

pub use playback::PlaybackReader;
pub use sim_service::{open_run, run_simulation, RunOutcome};

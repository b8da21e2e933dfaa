//! Simulator for grid-constrained micro robots assembling a 3D truss
//! lattice.
//!
//! The pipeline runs in four stages. A build script is parsed into a
//! command tree and compiled into a per-frame control timeline
//! ([`domains::trajectory`]). Alternatively the timeline's source script is
//! generated from structure geometry by the build sequencer
//! ([`domains::sequencer`]). The frame loop applies the timeline to the
//! bots and the growing structure ([`domains::motion`],
//! [`domains::simulation`]) and every frame is persisted through a chunked
//! state store for later playback ([`application::playback`]).

pub mod adapters;
pub mod application;
pub mod common;
pub mod config;
pub mod domains;

pub use application::{run_simulation, PlaybackReader, RunOutcome};
pub use common::{ConfigError, GeometryError, MotionError, SimError, SimResult};
pub use config::SimulationConfig;

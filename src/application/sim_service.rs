//! End-to-end run orchestration: config -> graph -> build program ->
//! timeline -> frame loop -> persisted run.

use std::path::{Path, PathBuf};

use chrono::Utc;
use glam::Vec3;
use tracing::info;
use uuid::Uuid;

use crate::adapters::outbound::{FilesystemScriptSource, FilesystemStateStore};
use crate::common::{ConfigError, SimResult};
use crate::config::SimulationConfig;
use crate::domains::map::PositionGraph;
use crate::domains::motion::{Bot, RigOffsets, Structure};
use crate::domains::sequencer::{BuildSequencer, SequencerOptions, StructureFile};
use crate::domains::simulation::{RunMeta, SimStatus, Simulation, StateRecorder, StateStore};
use crate::domains::trajectory::{compile_script, compile_text, Timeline};

pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: SimStatus,
    pub frames: u64,
    pub chunks: u64,
    pub run_dir: PathBuf,
}

/// Run one configured simulation to completion and persist it.
pub fn run_simulation(config: &SimulationConfig) -> SimResult<RunOutcome> {
    let graph = PositionGraph::load(&config.map)?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "map {} loaded",
        config.map
    );

    let mut bots = Vec::with_capacity(config.bots.len());
    for spec in &config.bots {
        let node = graph.resolve(config.resolve_alias(&spec.start))?;
        bots.push(Bot::new(&spec.name, &spec.bot_type, node));
    }

    let mut offsets = RigOffsets::default();
    for (rod_type, feed_node) in &config.feed_zones {
        let node = graph.resolve(config.resolve_alias(feed_node))?;
        offsets
            .feed_zones
            .insert(rod_type.clone(), graph.position(node));
    }
    for (bot_type, offset) in &config.mount_offsets {
        offsets
            .mount_offsets
            .insert(bot_type.clone(), Vec3::from_array(*offset));
    }

    let timeline = build_timeline(config)?;
    info!(frames = timeline.len(), "timeline compiled");

    let structure = Structure::new(offsets);
    let mut sim = Simulation::new(graph, bots, structure, timeline);

    let run_id = Uuid::new_v4();
    let run_dir = PathBuf::from(&config.output_dir).join(format!("paths_{}", config.name));
    let mut store = FilesystemStateStore::create(&run_dir)?;
    let mut recorder = StateRecorder::new(config.states_per_chunk);

    let status = sim.run(&mut recorder, &mut store)?;

    let meta = RunMeta {
        run_id,
        sim_name: config.name.clone(),
        status: status.as_str().to_string(),
        frames: recorder.frames(),
        chunks: recorder.chunks_written(),
        chunk_len: recorder.chunk_len(),
        bots: config
            .bots
            .iter()
            .map(|b| (b.name.clone(), b.bot_type.clone()))
            .collect(),
        created_at: Utc::now(),
    };
    store.write_meta(&meta)?;

    Ok(RunOutcome {
        run_id,
        status,
        frames: meta.frames,
        chunks: meta.chunks,
        run_dir,
    })
}

/// Compile the run's control timeline: either an authored routine, or a
/// build program generated from the structure geometry.
fn build_timeline(config: &SimulationConfig) -> SimResult<Timeline> {
    let source = FilesystemScriptSource::new(&config.scripts_dir);

    if config.sequence {
        let structure_path =
            config
                .structure
                .as_ref()
                .ok_or_else(|| ConfigError::Invalid {
                    reason: "sequence = true requires a structure file".to_string(),
                })?;
        let structure = StructureFile::load(structure_path)?;
        info!(
            rods = structure.edges.len(),
            vertices = structure.vertices.len(),
            "sequencing build for {structure_path}"
        );

        let sequencer = BuildSequencer::new(
            &structure,
            SequencerOptions {
                dual_build: config.dual_build,
            },
        );
        let script = sequencer.generate()?;

        // Keep the generated program next to the authored scripts so it can
        // be inspected and replayed.
        let name = format!("_{}.txt", config.name.to_lowercase());
        let path = Path::new(&config.scripts_dir).join(&name);
        std::fs::write(&path, &script).map_err(ConfigError::Io)?;

        Ok(compile_text(&source, &name, &script)?)
    } else {
        let routine = config.routine.as_ref().ok_or_else(|| ConfigError::Invalid {
            reason: "either routine or sequence must be configured".to_string(),
        })?;
        Ok(compile_script(&source, routine)?)
    }
}

/// Open a recorded run for playback.
pub fn open_run<P: AsRef<Path>>(run_dir: P) -> SimResult<FilesystemStateStore> {
    FilesystemStateStore::open(run_dir)
}

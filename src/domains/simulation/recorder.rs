//! Per-frame snapshots, sharded into bounded chunks.
//!
//! Each chunk opens with a full snapshot and continues with field-level
//! deltas, so playback can seek to any frame by loading one chunk and
//! applying deltas forward. The recorder flushes a chunk as soon as the
//! buffered state count reaches the watermark, bounding memory for
//! arbitrarily long builds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{SimError, SimResult};
use crate::domains::map::PositionGraph;
use crate::domains::motion::{Bot, RodId, RodState, Structure};

/// Buffered states per persisted chunk.
pub const STATES_PER_CHUNK: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotPose {
    pub pos: Vec3,
    pub rot: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RodSnapshot {
    pub rod_type: String,
    pub state: RodState,
}

/// Complete observable state of one simulation frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimState {
    pub frame: u64,
    pub time: f64,
    pub bots: BTreeMap<String, BotPose>,
    pub rods: BTreeMap<RodId, RodSnapshot>,
    pub stage: Vec3,
    pub scripts: Vec<String>,
}

impl SimState {
    pub fn capture(
        frame: u64,
        time: f64,
        graph: &PositionGraph,
        bots: &[Bot],
        structure: &Structure,
        scripts: &[String],
    ) -> Self {
        Self {
            frame,
            time,
            bots: bots
                .iter()
                .map(|b| {
                    (
                        b.name.clone(),
                        BotPose {
                            pos: b.position(graph),
                            rot: b.rot,
                        },
                    )
                })
                .collect(),
            rods: structure
                .rods
                .iter()
                .map(|(id, rod)| {
                    (
                        *id,
                        RodSnapshot {
                            rod_type: rod.rod_type.clone(),
                            state: rod.state.clone(),
                        },
                    )
                })
                .collect(),
            stage: structure.stage_pos,
            scripts: scripts.to_vec(),
        }
    }

    /// Fields of `self` that differ from `prev`.
    pub fn diff(&self, prev: &SimState) -> SimStateDelta {
        SimStateDelta {
            frame: self.frame,
            time: self.time,
            bots: self
                .bots
                .iter()
                .filter(|(name, pose)| prev.bots.get(*name) != Some(pose))
                .map(|(name, pose)| (name.clone(), pose.clone()))
                .collect(),
            rods: self
                .rods
                .iter()
                .filter(|(id, rod)| prev.rods.get(id) != Some(rod))
                .map(|(id, rod)| (*id, rod.clone()))
                .collect(),
            stage: (prev.stage != self.stage).then_some(self.stage),
            scripts: (prev.scripts != self.scripts).then(|| self.scripts.clone()),
        }
    }

    /// Apply a delta on top of this state.
    pub fn apply(&mut self, delta: &SimStateDelta) {
        self.frame = delta.frame;
        self.time = delta.time;
        for (name, pose) in &delta.bots {
            self.bots.insert(name.clone(), pose.clone());
        }
        for (id, rod) in &delta.rods {
            self.rods.insert(*id, rod.clone());
        }
        if let Some(stage) = delta.stage {
            self.stage = stage;
        }
        if let Some(scripts) = &delta.scripts {
            self.scripts = scripts.clone();
        }
    }
}

/// Changed fields between two consecutive frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimStateDelta {
    pub frame: u64,
    pub time: f64,
    pub bots: BTreeMap<String, BotPose>,
    pub rods: BTreeMap<RodId, RodSnapshot>,
    pub stage: Option<Vec3>,
    pub scripts: Option<Vec<String>>,
}

/// One persisted shard: a full snapshot plus deltas for the frames after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChunk {
    pub index: u64,
    pub start_frame: u64,
    pub full: SimState,
    pub deltas: Vec<SimStateDelta>,
}

impl StateChunk {
    /// Number of states the chunk holds, the full snapshot included.
    pub fn states(&self) -> usize {
        1 + self.deltas.len()
    }

    pub fn last_frame(&self) -> u64 {
        self.deltas.last().map_or(self.full.frame, |d| d.frame)
    }
}

/// Run-level metadata, written once at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub sim_name: String,
    pub status: String,
    pub frames: u64,
    pub chunks: u64,
    pub chunk_len: usize,
    pub bots: Vec<(String, String)>,
    pub created_at: DateTime<Utc>,
}

/// Persistence boundary for recorded runs.
pub trait StateStore {
    fn write_chunk(&mut self, chunk: &StateChunk) -> SimResult<()>;
    fn write_meta(&mut self, meta: &RunMeta) -> SimResult<()>;
    fn read_chunk(&self, index: u64) -> SimResult<StateChunk>;
    fn read_meta(&self) -> SimResult<RunMeta>;
}

pub struct StateRecorder {
    chunk_len: usize,
    current: Option<StateChunk>,
    last: Option<SimState>,
    chunks_written: u64,
    frames: u64,
}

impl StateRecorder {
    pub fn new(chunk_len: usize) -> Self {
        Self {
            chunk_len: chunk_len.max(1),
            current: None,
            last: None,
            chunks_written: 0,
            frames: 0,
        }
    }

    /// Buffer one frame's state, flushing a chunk at the watermark.
    pub fn record(&mut self, state: SimState, store: &mut dyn StateStore) -> SimResult<()> {
        self.frames += 1;

        match (&mut self.current, &self.last) {
            (Some(chunk), Some(last)) => chunk.deltas.push(state.diff(last)),
            _ => {
                self.current = Some(StateChunk {
                    index: self.chunks_written,
                    start_frame: state.frame,
                    full: state.clone(),
                    deltas: Vec::new(),
                });
            }
        }
        self.last = Some(state);

        let full = self
            .current
            .as_ref()
            .is_some_and(|c| c.states() >= self.chunk_len);
        if full {
            self.flush(store)?;
        }
        Ok(())
    }

    /// Flush the trailing partial chunk. Call once after the run ends.
    pub fn finish(&mut self, store: &mut dyn StateStore) -> SimResult<()> {
        if self.current.is_some() {
            self.flush(store)?;
        }
        Ok(())
    }

    fn flush(&mut self, store: &mut dyn StateStore) -> SimResult<()> {
        let Some(chunk) = self.current.take() else {
            return Err(SimError::StateStore("no chunk to flush".to_string()));
        };
        store.write_chunk(&chunk)?;
        self.chunks_written += 1;
        Ok(())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }
}

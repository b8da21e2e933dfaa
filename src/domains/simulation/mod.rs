//! Frame loop: applies the compiled timeline to the bots and the shared
//! structure, one frame at a time.
//!
//! Strictly single-threaded and synchronous. Bots update in fixed list order
//! within a frame, all reading the same control-input vector; because
//! occupancy derives from live positions, a later bot observes an earlier
//! bot's already-applied move. That ordering is a documented guarantee.

pub mod recorder;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::SimResult;
use crate::domains::map::PositionGraph;
use crate::domains::motion::{Bot, Structure};
use crate::domains::trajectory::{Timeline, DEFAULT_RATE};

pub use recorder::{
    BotPose, RodSnapshot, RunMeta, SimState, SimStateDelta, StateChunk, StateRecorder, StateStore,
    STATES_PER_CHUNK,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimStatus {
    InProgress,
    Success,
    /// No bot state changed while some bot was short of its goal. Only the
    /// goal-driven router variant can end up here; the timeline-driven loop
    /// always terminates by exhaustion.
    TrafficJam,
}

impl SimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimStatus::InProgress => "in_progress",
            SimStatus::Success => "success",
            SimStatus::TrafficJam => "traffic_jam",
        }
    }
}

pub struct Simulation {
    graph: PositionGraph,
    bots: Vec<Bot>,
    structure: Structure,
    timeline: Timeline,
    frame: u64,
    time: f64,
    rate: f32,
    status: SimStatus,
    script_history: Vec<Vec<String>>,
}

impl Simulation {
    pub fn new(
        graph: PositionGraph,
        bots: Vec<Bot>,
        structure: Structure,
        timeline: Timeline,
    ) -> Self {
        info!(
            bots = bots.len(),
            frames = timeline.len(),
            nodes = graph.node_count(),
            "simulation ready"
        );
        Self {
            graph,
            bots,
            structure,
            timeline,
            frame: 0,
            time: 0.0,
            rate: DEFAULT_RATE,
            status: SimStatus::InProgress,
            script_history: Vec::new(),
        }
    }

    /// Advance one frame.
    ///
    /// Returns the frame's resulting state, or `None` once the timeline is
    /// exhausted (at which point the status flips to success).
    pub fn step(&mut self) -> SimResult<Option<SimState>> {
        let Some(inputs) = self.timeline.get(self.frame as usize).cloned() else {
            self.status = SimStatus::Success;
            return Ok(None);
        };

        if self.frame % 1000 == 0 {
            info!(frame = self.frame, time = format!("{:.2}", self.time), "-----");
        }

        for bot in &mut self.bots {
            bot.update(&self.graph, &inputs, self.frame)?;
        }
        self.check_occupancy();

        self.structure
            .update(&inputs, &self.graph, &self.bots, self.frame)?;

        if let Some(rate) = inputs.rate {
            self.rate = rate;
        }
        self.script_history.push(inputs.script.clone());

        let state = SimState::capture(
            self.frame,
            self.time,
            &self.graph,
            &self.bots,
            &self.structure,
            &inputs.script,
        );

        self.frame += 1;
        self.time += 1.0 / self.rate as f64;
        Ok(Some(state))
    }

    /// Run to completion, streaming every frame into the recorder.
    pub fn run(
        &mut self,
        recorder: &mut StateRecorder,
        store: &mut dyn StateStore,
    ) -> SimResult<SimStatus> {
        while let Some(state) = self.step()? {
            recorder.record(state, store)?;
        }
        recorder.finish(store)?;
        info!(
            frames = self.frame,
            placed = self.structure.placed_count(),
            "simulation finished: {}",
            self.status.as_str()
        );
        Ok(self.status)
    }

    /// One bot per node is an invariant of the rig; a violation points at a
    /// bad build program and is surfaced as an integrity warning.
    fn check_occupancy(&self) {
        let mut seen = HashMap::new();
        for bot in &self.bots {
            if let Some(other) = seen.insert(bot.node, &bot.name) {
                warn!(
                    node = %self.graph.name(bot.node),
                    frame = self.frame,
                    "bots {other} and {} share a node",
                    bot.name
                );
            }
        }
    }

    pub fn status(&self) -> SimStatus {
        self.status
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn graph(&self) -> &PositionGraph {
        &self.graph
    }
}

//! Shared structure state: the build stage and every rod's lifecycle.
//!
//! Rods only ever move pending -> carried (pickup) and carried -> placed
//! (uv detach); the tagged state enum leaves no room for other transitions.
//! Pickup and detach are position-threshold triggered and re-checked every
//! frame.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::ConfigError;
use crate::domains::map::PositionGraph;
use crate::domains::motion::bot::Bot;
use crate::domains::trajectory::ControlFrame;

/// World-X a carrying bot must cross before a uv pulse attaches its rod.
pub const DETACH_MIN_X: f32 = 100.0;
/// Pickup zone tolerances around a pending rod, world units.
pub const PICKUP_X_TOL: f32 = 2.5;
pub const PICKUP_Y_TOL: f32 = 2.5;

pub type RodId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RodState {
    /// Waiting at the feed zone for a bot.
    Pending { pos: Vec3 },
    /// Somewhere on a bot; has no position of its own.
    Carried { bot: String },
    /// Attached to the structure, stage-relative. Terminal.
    Placed { pos: Vec3, rot: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rod {
    pub id: RodId,
    pub rod_type: String,
    pub state: RodState,
}

impl Rod {
    pub fn is_done(&self) -> bool {
        matches!(self.state, RodState::Placed { .. })
    }
}

/// Fixed rig geometry: where each rod type is fed, and where each bot type
/// holds its rod relative to its own position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigOffsets {
    pub feed_zones: BTreeMap<String, Vec3>,
    pub mount_offsets: BTreeMap<String, Vec3>,
}

pub struct Structure {
    pub stage_pos: Vec3,
    pub rods: BTreeMap<RodId, Rod>,
    offsets: RigOffsets,
    next_rod_id: RodId,
    last_uv: u8,
}

impl Structure {
    pub fn new(offsets: RigOffsets) -> Self {
        Self {
            stage_pos: Vec3::ZERO,
            rods: BTreeMap::new(),
            offsets,
            next_rod_id: 1,
            last_uv: 0,
        }
    }

    fn new_rod(&mut self, rod_type: &str, pos: Vec3) -> RodId {
        let id = self.next_rod_id;
        self.next_rod_id += 1;
        self.rods.insert(
            id,
            Rod {
                id,
                rod_type: rod_type.to_string(),
                state: RodState::Pending { pos },
            },
        );
        id
    }

    /// Apply one frame's control inputs, in fixed order: stage move, feed,
    /// uv detach, pickup scan.
    pub fn update(
        &mut self,
        frame: &ControlFrame,
        graph: &PositionGraph,
        bots: &[Bot],
        frame_no: u64,
    ) -> Result<(), ConfigError> {
        if let Some(delta) = frame.stagerel {
            debug!(frame = frame_no, "moving stage by {delta}");
            self.stage_pos += delta;
        }

        if let Some(rod_type) = &frame.feed {
            let pos = *self.offsets.feed_zones.get(rod_type).ok_or_else(|| {
                ConfigError::UnknownFeedZone {
                    rod_type: rod_type.clone(),
                }
            })?;
            let id = self.new_rod(rod_type, pos);
            info!(rod = id, frame = frame_no, "new {rod_type} rod pending at {pos}");
        }

        if let Some(uv) = frame.uv {
            if uv == 1 && self.last_uv == 0 {
                self.detach_rods(graph, bots, frame_no);
            }
            self.last_uv = uv;
        }

        self.pickup_rods(graph, bots, frame_no);
        Ok(())
    }

    /// Carried rods whose bot has crossed the detach threshold become part of
    /// the structure, positioned relative to the current stage.
    fn detach_rods(&mut self, graph: &PositionGraph, bots: &[Bot], frame_no: u64) {
        let stage_pos = self.stage_pos;
        for rod in self.rods.values_mut() {
            let RodState::Carried { bot: carrier } = &rod.state else {
                continue;
            };
            let Some(bot) = bots.iter().find(|b| &b.name == carrier) else {
                continue;
            };
            let bot_pos = graph.position(bot.node);
            if bot_pos.x <= DETACH_MIN_X {
                continue;
            }
            let mount = self
                .offsets
                .mount_offsets
                .get(&bot.bot_type)
                .copied()
                .unwrap_or(Vec3::ZERO);
            let placed = bot_pos + mount - stage_pos;
            info!(
                rod = rod.id,
                bot = %bot.name,
                frame = frame_no,
                "rod attached at {placed}"
            );
            rod.state = RodState::Placed {
                pos: placed,
                rot: bot.rot,
            };
        }
    }

    /// A pending rod is claimed by the first bot (in update order) inside its
    /// pickup zone. Claiming removes it from pending, so a rod is picked up
    /// at most once.
    fn pickup_rods(&mut self, graph: &PositionGraph, bots: &[Bot], frame_no: u64) {
        for rod in self.rods.values_mut() {
            let RodState::Pending { pos } = rod.state else {
                continue;
            };
            let claimed = bots.iter().find(|b| {
                let bp = graph.position(b.node);
                (bp.x - pos.x).abs() < PICKUP_X_TOL && (bp.y - pos.y).abs() < PICKUP_Y_TOL
            });
            if let Some(bot) = claimed {
                info!(rod = rod.id, bot = %bot.name, frame = frame_no, "rod picked up");
                rod.state = RodState::Carried {
                    bot: bot.name.clone(),
                };
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.rods
            .values()
            .filter(|r| matches!(r.state, RodState::Pending { .. }))
            .count()
    }

    pub fn placed_count(&self) -> usize {
        self.rods.values().filter(|r| r.is_done()).count()
    }
}

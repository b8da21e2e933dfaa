use std::f32::consts::FRAC_PI_2;

use glam::{Vec2, Vec3};
use petgraph::stable_graph::NodeIndex;
use tracing::{debug, warn};

use crate::common::MotionError;
use crate::domains::map::PositionGraph;
use crate::domains::trajectory::ControlFrame;

/// Micro robot with a position on the map graph and an orientation.
#[derive(Debug, Clone)]
pub struct Bot {
    pub name: String,
    pub bot_type: String,
    pub node: NodeIndex,
    /// Accumulated rotation, radians.
    pub rot: f32,
    /// Heading of the last move, unit 2D vector. None until the first move.
    heading: Option<Vec2>,
    pub move_history: Vec<NodeIndex>,
    pub rot_history: Vec<f32>,
}

impl Bot {
    pub fn new(name: &str, bot_type: &str, node: NodeIndex) -> Self {
        Self {
            name: name.to_string(),
            bot_type: bot_type.to_string(),
            node,
            rot: 0.0,
            heading: None,
            move_history: Vec::new(),
            rot_history: Vec::new(),
        }
    }

    pub fn position(&self, graph: &PositionGraph) -> Vec3 {
        graph.position(self.node)
    }

    /// Decide and apply this frame's move.
    ///
    /// An outgoing edge is active when one of its zone conditions matches the
    /// frame exactly. More than one distinct active target means the build
    /// program commanded contradictory moves, which is fatal. Exactly one
    /// target different from the current node moves the bot; anything else
    /// leaves it stationary.
    pub fn update(
        &mut self,
        graph: &PositionGraph,
        frame: &ControlFrame,
        frame_no: u64,
    ) -> Result<(), MotionError> {
        self.move_history.push(self.node);

        let mut targets: Vec<NodeIndex> = Vec::new();
        for (rules, target) in graph.out_edges(self.node) {
            let active = rules
                .iter()
                .any(|(zone, dir)| frame.zones.get(zone) == Some(dir));
            if active && !targets.contains(&target) {
                targets.push(target);
            }
        }

        if targets.len() > 1 {
            return Err(MotionError::Conflict {
                bot: self.name.clone(),
                frame: frame_no,
                targets: targets
                    .iter()
                    .map(|t| graph.name(*t).to_string())
                    .collect(),
            });
        }

        if let Some(&target) = targets.first() {
            if target != self.node {
                let from = graph.position(self.node);
                let to = graph.position(target);
                debug!(
                    bot = %self.name,
                    "moving {} -> {}",
                    graph.name(self.node),
                    graph.name(target)
                );
                self.node = target;
                self.update_rotation(from, to);
            }
        }

        self.rot_history.push(self.rot);
        Ok(())
    }

    /// Fold a move's 2D heading change into the rotation scalar.
    ///
    /// The turn is the signed smaller-magnitude rotation between the previous
    /// heading and the new one, so |turn| <= pi. Turns beyond pi/2 indicate a
    /// discontinuity in the build program and are logged, not rejected.
    fn update_rotation(&mut self, from: Vec3, to: Vec3) {
        let delta = (to - from).truncate();
        if delta.length_squared() == 0.0 {
            return;
        }
        let heading = delta.normalize();

        let Some(prev) = self.heading.replace(heading) else {
            return;
        };
        if prev.abs_diff_eq(heading, 1e-6) {
            return;
        }

        let turn = prev.angle_to(heading);
        if turn.abs() > FRAC_PI_2 + 1e-6 {
            warn!(bot = %self.name, "suspicious rotation of {turn} rad in one move");
        }
        self.rot += turn;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::map::EdgeRules;
    use std::f32::consts::FRAC_PI_2;

    fn line_graph() -> (PositionGraph, NodeIndex) {
        let mut g = PositionGraph::new();
        let a = g.add_node("a", Vec3::new(0.0, 0.0, 0.0));
        g.add_node("b", Vec3::new(1.0, 0.0, 0.0));
        g.add_node("c", Vec3::new(1.0, 1.0, 0.0));
        g.add_edge("a", "b", EdgeRules::from([("Z01".to_string(), "+X".to_string())]))
            .unwrap();
        g.add_edge("b", "c", EdgeRules::from([("Z01".to_string(), "+Y".to_string())]))
            .unwrap();
        (g, a)
    }

    #[test]
    fn left_turn_accumulates_half_pi() {
        let (g, start) = line_graph();
        let mut bot = Bot::new("b1", "default", start);

        let east = ControlFrame::default().zone("Z01", "+X");
        let north = ControlFrame::default().zone("Z01", "+Y");
        bot.update(&g, &east, 0).unwrap();
        assert_eq!(bot.rot, 0.0); // first move stores the heading only
        bot.update(&g, &north, 1).unwrap();
        assert!((bot.rot - FRAC_PI_2).abs() < 1e-5);
    }
}

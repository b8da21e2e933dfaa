//! Directed position graph the bots move on.
//!
//! Nodes are named 3D positions on the rig; each edge carries the zone
//! conditions under which a bot standing at the source node is driven to the
//! target node. The graph is read-only during simulation.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use glam::Vec3;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::common::ConfigError;

/// Zone label -> direction token (`+X`, `-X`, `+Y`, `-Y`).
///
/// An edge is active when the current control frame assigns one of these
/// labels exactly this token.
pub type EdgeRules = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionNode {
    pub name: String,
    pub pos: Vec3,
}

/// On-disk map representation (produced by the external map generator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapFile {
    pub nodes: Vec<MapNode>,
    pub edges: Vec<MapEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapNode {
    pub name: String,
    pub pos: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEdge {
    pub src: String,
    pub dst: String,
    pub rules: EdgeRules,
}

#[derive(Debug, Clone, Default)]
pub struct PositionGraph {
    graph: StableDiGraph<PositionNode, EdgeRules>,
    by_name: HashMap<String, NodeIndex>,
}

impl PositionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a map from its JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let file: MapFile = serde_json::from_str(&text)?;
        Self::from_map_file(file)
    }

    pub fn from_map_file(file: MapFile) -> Result<Self, ConfigError> {
        let mut graph = Self::new();
        for node in file.nodes {
            graph.add_node(&node.name, Vec3::from_array(node.pos));
        }
        for edge in file.edges {
            graph.add_edge(&edge.src, &edge.dst, edge.rules)?;
        }
        Ok(graph)
    }

    /// Add a node, returning its index. Re-adding a known name returns the
    /// existing index unchanged.
    pub fn add_node(&mut self, name: &str, pos: Vec3) -> NodeIndex {
        if let Some(&idx) = self.by_name.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(PositionNode {
            name: name.to_string(),
            pos,
        });
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    pub fn add_edge(
        &mut self,
        src: &str,
        dst: &str,
        rules: EdgeRules,
    ) -> Result<(), ConfigError> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        self.graph.add_edge(src, dst, rules);
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.by_name.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> Result<NodeIndex, ConfigError> {
        self.node(name).ok_or_else(|| ConfigError::UnknownNode {
            name: name.to_string(),
        })
    }

    pub fn position(&self, idx: NodeIndex) -> Vec3 {
        self.graph[idx].pos
    }

    pub fn name(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].name
    }

    /// Outgoing edges of a node as (rules, target) pairs.
    pub fn out_edges(&self, idx: NodeIndex) -> impl Iterator<Item = (&EdgeRules, NodeIndex)> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.weight(), e.target()))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

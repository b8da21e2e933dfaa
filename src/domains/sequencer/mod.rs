//! Build sequencer: turns pre-sorted lattice geometry into an ordered build
//! script for the trajectory compiler.
//!
//! Rods are visited in the order the external geometry generator emitted
//! them. A phase state machine tracks which placement rig configuration is
//! active; moving between phases emits the corresponding transition macro.
//! Where the geometry allows it, two rods of the same orientation are placed
//! with one combined dual-build macro.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::{ConfigError, GeometryError};

/// Lattice spacing in mm.
pub const LATTICE_SPACING: f32 = 12.0;

/// Coordinate comparison tolerance, in lattice units.
const EPS: f32 = 1e-4;

/// On-disk structure geometry (produced by the external lattice filler).
///
/// Vertices are in lattice units; edges are pre-sorted by the generator's
/// documented contract and are trusted as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureFile {
    pub vertices: BTreeMap<String, [f32; 3]>,
    pub edges: Vec<(String, String)>,
}

impl StructureFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Tree,
    Tlap,
    Vert,
    Horz,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Tree => "tree",
            Phase::Tlap => "tlap",
            Phase::Vert => "vert",
            Phase::Horz => "horz",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RodAxis {
    X,
    Y,
    Z,
}

/// Classify a rod by the equal-coordinate test on its two endpoints.
pub fn classify(v1: Vec3, v2: Vec3) -> Option<RodAxis> {
    let eq = |a: f32, b: f32| (a - b).abs() < EPS;
    if eq(v1.y, v2.y) && eq(v1.z, v2.z) {
        Some(RodAxis::X)
    } else if eq(v1.x, v2.x) && eq(v1.z, v2.z) {
        Some(RodAxis::Y)
    } else if eq(v1.x, v2.x) && eq(v1.y, v2.y) {
        Some(RodAxis::Z)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct SequencerOptions {
    pub dual_build: bool,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self { dual_build: true }
    }
}

struct PhaseMacros {
    /// Comment label, capitalized.
    label: &'static str,
    axis: RodAxis,
    dual_script: &'static str,
    single_script: &'static str,
    dual_shift: Vec3,
    single_shift: Option<Vec3>,
}

fn macros(phase: Phase) -> PhaseMacros {
    match phase {
        Phase::Tree => PhaseMacros {
            label: "Tree",
            axis: RodAxis::X,
            dual_script: "units1&2_tree_int",
            single_script: "unit2_tree_int_AH.txt",
            dual_shift: Vec3::new(0.0, -12.0, 0.0),
            single_shift: None,
        },
        Phase::Tlap => PhaseMacros {
            label: "Tree",
            axis: RodAxis::X,
            dual_script: "units1&2_tlap_int",
            single_script: "unit2_tlap_int",
            dual_shift: Vec3::new(0.0, -12.0, 0.0),
            single_shift: Some(Vec3::new(0.0, -12.0, 0.0)),
        },
        Phase::Vert => PhaseMacros {
            label: "Vertical",
            axis: RodAxis::Z,
            dual_script: "units1&2_vert_int",
            single_script: "unit2_vert_int",
            dual_shift: Vec3::new(0.0, -12.0, 0.0),
            single_shift: Some(Vec3::new(0.0, -12.0, 0.0)),
        },
        Phase::Horz => PhaseMacros {
            label: "Horizontal",
            axis: RodAxis::Y,
            dual_script: "units1&2_horz_int",
            single_script: "unit2_horz_int",
            dual_shift: Vec3::new(0.0, 0.0, -12.0),
            single_shift: Some(Vec3::new(0.0, -12.0, 0.0)),
        },
    }
}

pub struct BuildSequencer {
    vertices: BTreeMap<String, Vec3>,
    rod_queue: Vec<(String, String)>,
    processed: Vec<bool>,
    stage_pos: Vec3,
    phase: Phase,
    dual_build: bool,
    lines: Vec<String>,
}

impl BuildSequencer {
    pub fn new(structure: &StructureFile, options: SequencerOptions) -> Self {
        Self {
            vertices: structure
                .vertices
                .iter()
                .map(|(k, v)| (k.clone(), Vec3::from_array(*v)))
                .collect(),
            rod_queue: structure.edges.clone(),
            processed: Vec::new(),
            stage_pos: Vec3::ZERO,
            phase: Phase::Tree,
            dual_build: options.dual_build,
            lines: Vec::new(),
        }
    }

    /// Generate the build script text.
    pub fn generate(mut self) -> Result<String, GeometryError> {
        self.header();
        self.init_trees()?;
        self.processed = vec![false; self.rod_queue.len()];

        for inx in 0..self.rod_queue.len() {
            self.handle_rod(inx)?;
        }

        self.footer();
        Ok(self.lines.join("\n"))
    }

    // ----- rod handling -----

    fn handle_rod(&mut self, inx: usize) -> Result<(), GeometryError> {
        // Already built in an earlier dual step.
        if self.processed[inx] {
            return Ok(());
        }

        let (v1, v2) = self.get_rod(inx)?;
        let axis = classify(v1, v2).ok_or(GeometryError::NonAxisAligned {
            index: inx,
            v1: v1.to_array(),
            v2: v2.to_array(),
        })?;

        match axis {
            RodAxis::X => {
                match self.phase {
                    Phase::Tree => self.place_rod(inx, Phase::Tree)?,
                    Phase::Horz => {
                        self.horz_to_tlap();
                        self.place_rod(inx, Phase::Tlap)?;
                    }
                    Phase::Tlap => self.place_rod(inx, Phase::Tlap)?,
                    from => {
                        return Err(GeometryError::IllegalPhaseTransition {
                            from: from.to_string(),
                            to: Phase::Tlap.to_string(),
                            index: inx,
                        })
                    }
                }
                info!(rod = inx, "tree rod: {} -> {}", fmt_v(v1), fmt_v(v2));
                if self.phase != Phase::Tree {
                    self.phase = Phase::Tlap;
                }
            }
            RodAxis::Y => {
                match self.phase {
                    Phase::Vert => {
                        self.vert_to_horz();
                        self.place_rod(inx, Phase::Horz)?;
                    }
                    Phase::Horz => self.place_rod(inx, Phase::Horz)?,
                    from => {
                        return Err(GeometryError::IllegalPhaseTransition {
                            from: from.to_string(),
                            to: Phase::Horz.to_string(),
                            index: inx,
                        })
                    }
                }
                info!(rod = inx, "horizontal rod: {} -> {}", fmt_v(v1), fmt_v(v2));
                self.phase = Phase::Horz;
            }
            RodAxis::Z => {
                match self.phase {
                    Phase::Tree => {
                        self.tree_to_vert();
                        self.place_rod(inx, Phase::Vert)?;
                    }
                    Phase::Tlap => {
                        self.tlap_to_vert();
                        self.place_rod(inx, Phase::Vert)?;
                    }
                    Phase::Vert => self.place_rod(inx, Phase::Vert)?,
                    from => {
                        return Err(GeometryError::IllegalPhaseTransition {
                            from: from.to_string(),
                            to: Phase::Vert.to_string(),
                            index: inx,
                        })
                    }
                }
                info!(rod = inx, "vertical rod: {} -> {}", fmt_v(v1), fmt_v(v2));
                self.phase = Phase::Vert;
            }
        }

        Ok(())
    }

    /// Place one rod, preferring a combined dual-build placement.
    ///
    /// The stage displacement aligns the build head with the rod's first
    /// vertex; trailing alignment moves inside the macros are intentionally
    /// not tracked in the cumulative stage position.
    fn place_rod(&mut self, inx: usize, phase: Phase) -> Result<(), GeometryError> {
        let (v1, v2) = self.get_rod(inx)?;
        let v1_mm = v1 * LATTICE_SPACING;
        let mv = self.stage_pos - v1_mm;
        self.stage_pos -= mv;

        let m = macros(phase);

        if self.dual_build {
            if let Some(pair) = self.find_dual(inx, v1, m.axis)? {
                if !self.processed[pair] {
                    let (u1, u2) = self.get_rod(pair)?;
                    self.comment("Place in parallel:");
                    self.comment(&format!("{} rod from {} to {}", m.label, fmt_v(v1), fmt_v(v2)));
                    self.comment(&format!("{} rod from {} to {}", m.label, fmt_v(u1), fmt_v(u2)));
                    self.stagerel(mv);
                    self.script(m.dual_script);
                    self.stagerel(m.dual_shift);
                    self.newline();

                    self.processed[pair] = true;
                    self.processed[inx] = true;
                    return Ok(());
                }
            }
        }

        self.comment(&format!(
            "Place {} rod from {} to {}",
            m.label.to_lowercase(),
            fmt_v(v1),
            fmt_v(v2)
        ));
        self.stagerel(mv);
        self.script(m.single_script);
        if let Some(shift) = m.single_shift {
            self.stagerel(shift);
        }
        self.newline();
        self.processed[inx] = true;
        Ok(())
    }

    /// Greedy dual-build lookahead: scan forward through the phase-sorted
    /// queue, while rods keep this orientation, for the next rod sharing
    /// (x, z) with `v1` and offset by exactly 2 lattice units in y. No
    /// backtracking, no optimality claim.
    fn find_dual(
        &self,
        inx: usize,
        v1: Vec3,
        axis: RodAxis,
    ) -> Result<Option<usize>, GeometryError> {
        let mut i = inx + 1;
        while i < self.rod_queue.len() {
            let (u1, u2) = self.get_rod(i)?;
            if classify(u1, u2) != Some(axis) {
                break;
            }
            if (u1.x - v1.x).abs() < EPS
                && (u1.z - v1.z).abs() < EPS
                && (v1.y - u1.y - 2.0).abs() < EPS
            {
                return Ok(Some(i));
            }
            i += 1;
        }
        Ok(None)
    }

    fn get_rod(&self, inx: usize) -> Result<(Vec3, Vec3), GeometryError> {
        let (id1, id2) = &self.rod_queue[inx];
        let lookup = |id: &String| {
            self.vertices
                .get(id)
                .copied()
                .ok_or_else(|| GeometryError::UnknownVertex {
                    index: inx,
                    vertex: id.clone(),
                })
        };
        Ok((lookup(id1)?, lookup(id2)?))
    }

    // ----- initialization -----

    /// Synthesize one anchor tree rod per (x, z) column of the lowest
    /// vertical layer and prepend them to the rod queue, so every column has
    /// a trunk before anything is placed on it.
    fn init_trees(&mut self) -> Result<(), GeometryError> {
        self.phase = Phase::Tree;

        // Columns come from the leading run of vertical rods.
        let mut tree_verts: Vec<Vec3> = Vec::new();
        for inx in 0..self.rod_queue.len() {
            let (v1, v2) = self.get_rod(inx)?;
            if classify(v1, v2) != Some(RodAxis::Z) {
                break;
            }
            for v in [v1, v2] {
                if !tree_verts.iter().any(|t| t.abs_diff_eq(v, EPS)) {
                    tree_verts.push(v);
                }
            }
        }

        if tree_verts.is_empty() {
            return Err(GeometryError::NoTreeAnchors);
        }

        // Fixed descending (x, z, y) build order.
        tree_verts.sort_by(|a, b| {
            b.x.total_cmp(&a.x)
                .then(b.z.total_cmp(&a.z))
                .then(b.y.total_cmp(&a.y))
        });

        debug!("tree anchors: {}", tree_verts.len());

        self.start_to_tree(tree_verts[0]);

        let mut tree_edges = Vec::with_capacity(tree_verts.len());
        for (i, v1) in tree_verts.iter().enumerate() {
            let v2 = *v1 + Vec3::X;
            let id1 = format!("tree_{i}_1");
            let id2 = format!("tree_{i}_2");
            self.vertices.insert(id1.clone(), *v1);
            self.vertices.insert(id2.clone(), v2);
            tree_edges.push((id1, id2));
        }
        self.rod_queue.splice(0..0, tree_edges);
        Ok(())
    }

    // ----- phase transition macros -----

    fn start_to_tree(&mut self, v1: Vec3) {
        let v1_mm = v1 * LATTICE_SPACING;

        self.comment("TRANSITION: start -> tree");
        self.separator();
        self.script("units1&2_buffer_reverse");
        self.script("units1&2_tree_ready");
        self.script("units1&2_buffer_reverse");
        self.newline();
        self.stagerel(v1_mm);
        self.stagerel(Vec3::new(-6.0, 0.0, 0.0));
        self.separator();
        self.newline();
    }

    fn tree_to_vert(&mut self) {
        self.stagerel(Vec3::new(6.0, 0.0, 0.0));
        self.newline();
        self.comment("TRANSITION: tree -> vert");
        self.separator();
        self.stagerel(Vec3::new(0.0, 0.0, -12.0));
        self.script("units1&2_buffer_advance");
        self.script("units1&2_buffer_advance");
        self.newline();
        self.comment("Fix the glue gap");
        self.stagerel(Vec3::new(1.0, -1.0, 0.0));
        self.newline();
        self.stagerel(Vec3::new(8.0, 0.0, 0.0));
        self.separator();
        self.newline();
    }

    fn vert_to_horz(&mut self) {
        self.comment("Undo fix the glue gap");
        self.stagerel(Vec3::new(-1.0, 1.0, 0.0));
        self.newline();
        self.comment("TRANSITION: vert -> horz");
        self.separator();
        self.stagerel(Vec3::new(0.0, -12.0, 12.0));
        self.script("units1&2_buffer_reverse");
        self.script("units1&2_horz_ready");
        self.script("units1&2_buffer_reverse");
        self.script("units1&2_buffer_reverse");
        self.newline();
        self.comment("Rod alignment asymmetry");
        self.stagerel(Vec3::new(0.0, -2.0, 0.0));
        self.newline();
        self.separator();
        self.newline();
    }

    fn horz_to_tlap(&mut self) {
        self.comment("Undo rod alignment asymmetry");
        self.stagerel(Vec3::new(0.0, 2.0, 0.0));
        self.newline();
        self.comment("TRANSITION: horz -> tlap");
        self.separator();
        self.script("units1&2_buffer_advance");
        self.script("units1&2_buffer_advance");
        self.script("units1&2_tree_ready");
        self.script("units1&2_buffer_advance");
        self.stagerel(Vec3::new(-12.0, 12.0, 0.0));
        self.newline();
        self.separator();
        self.newline();
    }

    fn tlap_to_vert(&mut self) {
        self.comment("TRANSITION: tlap -> vert");
        self.separator();
        self.stagerel(Vec3::new(12.0, 0.0, -12.0));
        self.newline();
        self.comment("align, getsolv, getwater_soak left out here");
        self.newline();
        self.comment("Fix the glue gap");
        self.stagerel(Vec3::new(1.0, -1.0, 0.0));
        self.separator();
        self.newline();
    }

    fn header(&mut self) {
        self.separator();
        self.comment("Autogenerated build script");
        self.comment(&format!("Date: {}", chrono::Utc::now()));
        self.separator();
        self.newline();
    }

    fn footer(&mut self) {
        self.separator();
        self.comment("End autogenerated build script");
        self.separator();
        self.newline();
    }

    // ----- emission -----

    fn comment(&mut self, s: &str) {
        self.lines.push(format!("# {s}"));
    }

    fn script(&mut self, s: &str) {
        self.lines.push(format!("<{s}"));
    }

    fn stagerel(&mut self, v: Vec3) {
        self.lines.push(format!("stagerel({}, {}, {})", v.x, v.y, v.z));
    }

    fn separator(&mut self) {
        self.lines
            .push("# -------------------------------------------------------".to_string());
    }

    fn newline(&mut self) {
        self.lines.push(String::new());
    }
}

fn fmt_v(v: Vec3) -> String {
    format!("({}, {}, {})", v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_axis_aligned_rods() {
        assert_eq!(
            classify(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            Some(RodAxis::X)
        );
        assert_eq!(
            classify(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
            Some(RodAxis::Y)
        );
        assert_eq!(
            classify(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
            Some(RodAxis::Z)
        );
        assert_eq!(classify(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)), None);
    }
}

//! Compiles a parsed command tree into a frame-indexed control timeline.

use glam::Vec3;
use tracing::warn;

use crate::common::ConfigError;
use crate::domains::trajectory::ast::Command;
use crate::domains::trajectory::frame::{ControlFrame, Timeline};
use crate::domains::trajectory::parser::ScriptParser;
use crate::domains::trajectory::ports::ScriptSource;

/// Switch rate of the board, in frames per second.
pub const DEFAULT_RATE: f32 = 120.0;

/// One 0.5 mm lattice edge per discrete step.
const STEPS_PER_MM: f32 = 2.0;

pub struct TrajectoryCompiler {
    rate: f32,
    script_stack: Vec<String>,
}

impl Default for TrajectoryCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TrajectoryCompiler {
    pub fn new() -> Self {
        Self {
            rate: DEFAULT_RATE,
            script_stack: Vec::new(),
        }
    }

    /// Compile a command tree into its timeline.
    ///
    /// Serial nodes concatenate their children (the only operation that
    /// extends the timeline); parallel nodes merge their children index-wise.
    /// The rate register persists across siblings, so a `rate` command scales
    /// every later `wait`/`zonewait` in the program.
    pub fn compile(&mut self, command: &Command) -> Result<Timeline, ConfigError> {
        match command {
            Command::Leaf { name, args } => self.compile_leaf(name, args),
            Command::Serial { script, children } => {
                self.script_stack.push(script.clone());
                let mut timeline = Timeline::new();
                for child in children {
                    timeline.extend(self.compile(child)?);
                }
                self.script_stack.pop();
                Ok(timeline)
            }
            Command::Parallel { children } => {
                let mut merged = Timeline::new();
                for child in children {
                    let branch = self.compile(child)?;
                    for (i, frame) in branch.into_iter().enumerate() {
                        if i < merged.len() {
                            merged[i].merge_from(&frame);
                        } else {
                            merged.push(frame);
                        }
                    }
                }
                Ok(merged)
            }
        }
    }

    fn compile_leaf(&mut self, name: &str, args: &[String]) -> Result<Timeline, ConfigError> {
        match name {
            "zmove" => {
                let zone = zone_label(arg_str(name, args, 0)?);
                let x = arg_f32(name, args, 1)?;
                let y = arg_f32(name, args, 2)?;
                Ok(self.zmove(&zone, x, y))
            }
            "rate" => {
                self.rate = arg_f32(name, args, 0)?;
                let mut frame = self.frame();
                frame.rate = Some(self.rate);
                Ok(vec![frame])
            }
            "wait" => {
                let time = arg_f32(name, args, 0)?;
                let mut frame = self.frame();
                frame.zones.insert("waiting".to_string(), time.to_string());
                Ok(self.repeat(frame, time))
            }
            "zonewait" => {
                let zone = zone_label(arg_str(name, args, 0)?);
                let time = arg_f32(name, args, 1)?;
                let mut frame = self.frame();
                frame
                    .zones
                    .insert(format!("zonewaiting_{zone}"), time.to_string());
                Ok(self.repeat(frame, time))
            }
            "uv" => {
                let state = arg_f32(name, args, 0)? as u8;
                let mut frame = self.frame();
                frame.uv = Some(state);
                Ok(vec![frame])
            }
            "feed" => {
                let rod_type = arg_str(name, args, 0)?;
                let mut frame = self.frame();
                frame.feed = Some(rod_type.to_string());
                Ok(vec![frame])
            }
            "stagerel" => {
                let x = arg_f32(name, args, 0)?;
                let y = arg_f32(name, args, 1)?;
                let z = arg_f32(name, args, 2)?;
                let mut frame = self.frame();
                frame.stagerel = Some(Vec3::new(x, y, z));
                Ok(vec![frame])
            }
            _ => {
                // Unknown commands never fail compilation; they pass through
                // so downstream consumers can pick them up.
                warn!(command = %name, "unknown command, passing through");
                let mut frame = self.frame();
                frame.zones.insert(name.to_string(), args.join(","));
                Ok(vec![frame])
            }
        }
    }

    /// Convert continuous mm deltas into discrete unit steps, X before Y.
    fn zmove(&self, zone: &str, x: f32, y: f32) -> Timeline {
        let x = (STEPS_PER_MM * x) as i32;
        let y = (STEPS_PER_MM * y) as i32;

        let mut timeline = Timeline::new();

        let x_move = if x > 0 { "+X" } else { "-X" };
        for _ in 0..x.abs() {
            timeline.push(self.frame().zone(zone, x_move));
        }

        let y_move = if y > 0 { "+Y" } else { "-Y" };
        for _ in 0..y.abs() {
            timeline.push(self.frame().zone(zone, y_move));
        }

        timeline
    }

    fn repeat(&self, frame: ControlFrame, time: f32) -> Timeline {
        let frames = (time * self.rate).round() as usize;
        vec![frame; frames]
    }

    fn frame(&self) -> ControlFrame {
        ControlFrame::with_script(&self.script_stack)
    }
}

/// Compile a named script from a source in one step.
pub fn compile_script(source: &dyn ScriptSource, name: &str) -> Result<Timeline, ConfigError> {
    let ast = ScriptParser::new(source).parse_script(name)?;
    TrajectoryCompiler::new().compile(&ast)
}

/// Compile script text directly, resolving sub-script references from `source`.
pub fn compile_text(
    source: &dyn ScriptSource,
    name: &str,
    text: &str,
) -> Result<Timeline, ConfigError> {
    let ast = ScriptParser::new(source).parse_text(name, text)?;
    TrajectoryCompiler::new().compile(&ast)
}

/// Normalize a zone argument: numeric zones become `Z{:02}` labels, anything
/// else is taken verbatim.
fn zone_label(arg: &str) -> String {
    match arg.trim().parse::<f32>() {
        Ok(n) => format!("Z{:02}", n as i32),
        Err(_) => arg.trim().to_string(),
    }
}

fn arg_str<'a>(command: &str, args: &'a [String], index: usize) -> Result<&'a str, ConfigError> {
    args.get(index)
        .map(|s| s.as_str())
        .ok_or_else(|| ConfigError::BadArgument {
            command: command.to_string(),
            reason: format!("missing argument {index}"),
        })
}

fn arg_f32(command: &str, args: &[String], index: usize) -> Result<f32, ConfigError> {
    let raw = arg_str(command, args, index)?;
    raw.trim().parse().map_err(|_| ConfigError::BadArgument {
        command: command.to_string(),
        reason: format!("expected a number, got {raw:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, args: &[&str]) -> Command {
        Command::Leaf {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn zmove_emits_x_steps_before_y_steps() {
        let serial = Command::Serial {
            script: "t".to_string(),
            children: vec![leaf("zmove", &["Z01", "1", "-0.5"])],
        };
        let timeline = TrajectoryCompiler::new().compile(&serial).unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].zones["Z01"], "+X");
        assert_eq!(timeline[1].zones["Z01"], "+X");
        assert_eq!(timeline[2].zones["Z01"], "-Y");
    }

    #[test]
    fn numeric_zone_arguments_are_formatted() {
        let timeline = TrajectoryCompiler::new()
            .compile(&leaf("zmove", &["1", "0.5", "0"]))
            .unwrap();
        assert_eq!(timeline[0].zones["Z01"], "+X");
    }

    #[test]
    fn rate_register_scales_later_waits() {
        let serial = Command::Serial {
            script: "t".to_string(),
            children: vec![leaf("rate", &["10"]), leaf("wait", &["0.5"])],
        };
        let timeline = TrajectoryCompiler::new().compile(&serial).unwrap();
        // One rate frame plus round(0.5 * 10) wait frames.
        assert_eq!(timeline.len(), 1 + 5);
        assert_eq!(timeline[0].rate, Some(10.0));
        assert!(timeline[1].zones.contains_key("waiting"));
    }

    #[test]
    fn unknown_commands_pass_through() {
        let timeline = TrajectoryCompiler::new()
            .compile(&leaf("getsolv", &["3", "4"]))
            .unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].zones["getsolv"], "3,4");
    }

    #[test]
    fn bad_numeric_argument_is_fatal() {
        let err = TrajectoryCompiler::new()
            .compile(&leaf("wait", &["soon"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::BadArgument { .. }));
    }

    #[test]
    fn frames_carry_the_script_stack() {
        let inner = Command::Serial {
            script: "inner.txt".to_string(),
            children: vec![leaf("wait", &["0.1"])],
        };
        let outer = Command::Serial {
            script: "outer.txt".to_string(),
            children: vec![inner],
        };
        let timeline = TrajectoryCompiler::new().compile(&outer).unwrap();
        assert_eq!(timeline[0].script, vec!["outer.txt", "inner.txt"]);
    }
}

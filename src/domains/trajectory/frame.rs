use std::collections::BTreeMap;
use std::fmt::Debug;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One frame's worth of control-signal assignments.
///
/// Zone direction tokens, wait markers and unknown-command passthrough live in
/// the generic `zones` sideband; the keys the motion core interprets directly
/// are typed fields. Frames are immutable once compiled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub zones: BTreeMap<String, String>,
    pub stagerel: Option<Vec3>,
    pub feed: Option<String>,
    pub uv: Option<u8>,
    pub rate: Option<f32>,
    /// Active-script stack, carried for debugging and playback only.
    pub script: Vec<String>,
}

/// Frame-indexed control-input stream. Its length fixes the run length.
pub type Timeline = Vec<ControlFrame>;

impl ControlFrame {
    pub fn with_script(stack: &[String]) -> Self {
        Self {
            script: stack.to_vec(),
            ..Default::default()
        }
    }

    pub fn zone(mut self, label: &str, token: &str) -> Self {
        self.zones.insert(label.to_string(), token.to_string());
        self
    }

    /// Index-wise dict-union used by parallel composition.
    ///
    /// On key collision the incoming (later-listed) branch wins. That
    /// resolution is a preserved quirk of the script format, so collisions
    /// are warned about rather than rejected. The script stack always takes
    /// the incoming branch without a warning.
    pub fn merge_from(&mut self, other: &ControlFrame) {
        for (key, value) in &other.zones {
            if let Some(old) = self.zones.insert(key.clone(), value.clone()) {
                if old != *value {
                    warn!(key = %key, old = %old, new = %value, "parallel branch collision; last branch wins");
                }
            }
        }
        merge_field(&mut self.stagerel, other.stagerel, "stagerel");
        merge_field(&mut self.feed, other.feed.clone(), "feed");
        merge_field(&mut self.uv, other.uv, "uv");
        merge_field(&mut self.rate, other.rate, "rate");
        if !other.script.is_empty() {
            self.script = other.script.clone();
        }
    }
}

fn merge_field<T: PartialEq + Debug>(slot: &mut Option<T>, incoming: Option<T>, key: &str) {
    let Some(new) = incoming else { return };
    if let Some(old) = slot.take() {
        if old != new {
            warn!(key = %key, "parallel branch collision; last branch wins");
        }
    }
    *slot = Some(new);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_unions_zones_and_last_branch_wins() {
        let mut a = ControlFrame::default().zone("Z01", "+X");
        let b = ControlFrame::default().zone("Z01", "-X").zone("Z02", "+Y");
        a.merge_from(&b);
        assert_eq!(a.zones["Z01"], "-X");
        assert_eq!(a.zones["Z02"], "+Y");
    }

    #[test]
    fn merge_keeps_existing_fields_when_other_is_empty() {
        let mut a = ControlFrame {
            uv: Some(1),
            ..Default::default()
        };
        a.merge_from(&ControlFrame::default());
        assert_eq!(a.uv, Some(1));
    }
}

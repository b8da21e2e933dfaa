//! Renderer-facing reader over a recorded run.

use crate::common::{SimError, SimResult};
use crate::domains::simulation::{RunMeta, SimState, StateChunk, StateStore};

struct Cursor {
    chunk: StateChunk,
    state: SimState,
    applied: usize,
}

pub struct PlaybackReader<'a, S: StateStore> {
    store: &'a S,
    meta: RunMeta,
    cursor: Option<Cursor>,
}

impl<'a, S: StateStore> PlaybackReader<'a, S> {
    pub fn open(store: &'a S) -> SimResult<Self> {
        let meta = store.read_meta()?;
        Ok(Self {
            store,
            meta,
            cursor: None,
        })
    }

    pub fn meta(&self) -> &RunMeta {
        &self.meta
    }

    /// State at `frame`.
    ///
    /// Seeks to the chunk holding the frame, then applies deltas forward from
    /// the chunk's full snapshot. Sequential requests within one chunk catch
    /// up incrementally from the last returned frame instead of replaying the
    /// chunk from its start.
    pub fn get_state(&mut self, frame: u64) -> SimResult<SimState> {
        if frame >= self.meta.frames {
            return Err(SimError::StateStore(format!(
                "frame {frame} out of range (run has {} frames)",
                self.meta.frames
            )));
        }

        let chunk_index = frame / self.meta.chunk_len as u64;
        let reload = match &self.cursor {
            Some(c) => c.chunk.index != chunk_index || c.state.frame > frame,
            None => true,
        };
        if reload {
            let chunk = self.store.read_chunk(chunk_index)?;
            self.cursor = Some(Cursor {
                state: chunk.full.clone(),
                applied: 0,
                chunk,
            });
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Err(SimError::StateStore("playback cursor unavailable".to_string()));
        };
        while cursor.state.frame < frame {
            let Some(delta) = cursor.chunk.deltas.get(cursor.applied) else {
                return Err(SimError::StateStore(format!(
                    "frame {frame} missing from chunk {chunk_index}"
                )));
            };
            cursor.state.apply(delta);
            cursor.applied += 1;
        }
        Ok(cursor.state.clone())
    }
}

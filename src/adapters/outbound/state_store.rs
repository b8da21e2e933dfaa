//! Filesystem persistence for recorded runs.
//!
//! Chunk files carry a magic tag and a format version byte ahead of the
//! bincode payload so stale files fail loudly instead of deserializing into
//! garbage. Run metadata is plain JSON.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::{SimError, SimResult};
use crate::domains::simulation::{RunMeta, StateChunk, StateStore};

const MAGIC: &[u8; 4] = b"LFSS";
const FORMAT_VERSION: u8 = 1;

const META_FILE: &str = "run.json";

pub struct FilesystemStateStore {
    dir: PathBuf,
}

impl FilesystemStateStore {
    /// Create (or reuse) a run directory for writing.
    pub fn create<P: AsRef<Path>>(dir: P) -> SimResult<Self> {
        fs::create_dir_all(&dir).map_err(|e| SimError::StateStore(e.to_string()))?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    /// Open an existing run directory for reading.
    pub fn open<P: AsRef<Path>>(dir: P) -> SimResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(SimError::StateStore(format!(
                "run directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chunk_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("chunk_{index:05}.lfss"))
    }
}

impl StateStore for FilesystemStateStore {
    fn write_chunk(&mut self, chunk: &StateChunk) -> SimResult<()> {
        let payload =
            bincode::serialize(chunk).map_err(|e| SimError::StateStore(e.to_string()))?;
        let mut bytes = Vec::with_capacity(payload.len() + 5);
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&payload);
        fs::write(self.chunk_path(chunk.index), bytes)
            .map_err(|e| SimError::StateStore(e.to_string()))
    }

    fn read_chunk(&self, index: u64) -> SimResult<StateChunk> {
        let path = self.chunk_path(index);
        let bytes = fs::read(&path)
            .map_err(|e| SimError::StateStore(format!("{}: {e}", path.display())))?;
        if bytes.len() < 5 || &bytes[..4] != MAGIC {
            return Err(SimError::StateStore(format!(
                "not a state chunk: {}",
                path.display()
            )));
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(SimError::StateStore(format!(
                "unsupported chunk format version {} in {}",
                bytes[4],
                path.display()
            )));
        }
        bincode::deserialize(&bytes[5..]).map_err(|e| SimError::StateStore(e.to_string()))
    }

    fn write_meta(&mut self, meta: &RunMeta) -> SimResult<()> {
        let text = serde_json::to_string_pretty(meta)
            .map_err(|e| SimError::StateStore(e.to_string()))?;
        fs::write(self.dir.join(META_FILE), text)
            .map_err(|e| SimError::StateStore(e.to_string()))
    }

    fn read_meta(&self) -> SimResult<RunMeta> {
        let text = fs::read_to_string(self.dir.join(META_FILE))
            .map_err(|e| SimError::StateStore(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| SimError::StateStore(e.to_string()))
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStateStore {
    pub chunks: Vec<StateChunk>,
    pub meta: Option<RunMeta>,
}

impl StateStore for MemoryStateStore {
    fn write_chunk(&mut self, chunk: &StateChunk) -> SimResult<()> {
        self.chunks.push(chunk.clone());
        Ok(())
    }

    fn read_chunk(&self, index: u64) -> SimResult<StateChunk> {
        self.chunks
            .iter()
            .find(|c| c.index == index)
            .cloned()
            .ok_or_else(|| SimError::StateStore(format!("no chunk {index}")))
    }

    fn write_meta(&mut self, meta: &RunMeta) -> SimResult<()> {
        self.meta = Some(meta.clone());
        Ok(())
    }

    fn read_meta(&self) -> SimResult<RunMeta> {
        self.meta
            .clone()
            .ok_or_else(|| SimError::StateStore("no run metadata".to_string()))
    }
}

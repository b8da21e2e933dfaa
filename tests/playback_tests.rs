use std::collections::BTreeMap;

use chrono::Utc;
use glam::Vec3;
use tempfile::tempdir;
use uuid::Uuid;

use latticeforge::adapters::outbound::{FilesystemStateStore, MemoryStateStore};
use latticeforge::application::PlaybackReader;
use latticeforge::domains::simulation::{
    BotPose, RunMeta, SimState, StateRecorder, StateStore,
};

fn state(frame: u64) -> SimState {
    SimState {
        frame,
        time: frame as f64 / 120.0,
        bots: BTreeMap::from([(
            "b1".to_string(),
            BotPose {
                pos: Vec3::new(frame as f32, 0.0, 0.0),
                rot: 0.0,
            },
        )]),
        rods: BTreeMap::new(),
        stage: Vec3::ZERO,
        scripts: vec!["r.txt".to_string()],
    }
}

fn meta(frames: u64, chunks: u64, chunk_len: usize) -> RunMeta {
    RunMeta {
        run_id: Uuid::new_v4(),
        sim_name: "test".to_string(),
        status: "success".to_string(),
        frames,
        chunks,
        chunk_len,
        bots: vec![("b1".to_string(), "carrier".to_string())],
        created_at: Utc::now(),
    }
}

fn record_run(store: &mut dyn StateStore, frames: u64, chunk_len: usize) -> StateRecorder {
    let mut recorder = StateRecorder::new(chunk_len);
    for f in 0..frames {
        recorder.record(state(f), store).unwrap();
    }
    recorder.finish(store).unwrap();
    recorder
}

#[test]
fn recorder_shards_into_delta_chunks() {
    let mut store = MemoryStateStore::default();
    let recorder = record_run(&mut store, 10, 4);

    assert_eq!(recorder.frames(), 10);
    assert_eq!(recorder.chunks_written(), 3);
    assert_eq!(store.chunks.len(), 3);

    let first = &store.chunks[0];
    assert_eq!(first.index, 0);
    assert_eq!(first.full.frame, 0);
    assert_eq!(first.deltas.len(), 3);
    assert_eq!(first.last_frame(), 3);

    // Trailing partial chunk.
    let last = &store.chunks[2];
    assert_eq!(last.full.frame, 8);
    assert_eq!(last.deltas.len(), 1);

    // Unchanged fields are elided from deltas.
    assert!(first.deltas[0].stage.is_none());
    assert!(first.deltas[0].scripts.is_none());
    assert_eq!(first.deltas[0].bots.len(), 1);
}

#[test]
fn playback_seeks_and_catches_up_across_chunks() {
    let mut store = MemoryStateStore::default();
    let recorder = record_run(&mut store, 10, 4);
    store
        .write_meta(&meta(
            recorder.frames(),
            recorder.chunks_written(),
            recorder.chunk_len(),
        ))
        .unwrap();

    let mut reader = PlaybackReader::open(&store).unwrap();
    assert_eq!(reader.meta().frames, 10);

    // Forward within one chunk, then across a chunk boundary, then backward.
    for frame in [0, 2, 3, 5, 9, 1] {
        let s = reader.get_state(frame).unwrap();
        assert_eq!(s.frame, frame);
        assert_eq!(s.bots["b1"].pos.x, frame as f32);
    }

    assert!(reader.get_state(10).is_err());
}

#[test]
fn filesystem_store_round_trips_a_run() {
    let dir = tempdir().unwrap();
    let run_dir = dir.path().join("paths_test");

    let mut store = FilesystemStateStore::create(&run_dir).unwrap();
    let recorder = record_run(&mut store, 7, 3);
    store
        .write_meta(&meta(
            recorder.frames(),
            recorder.chunks_written(),
            recorder.chunk_len(),
        ))
        .unwrap();

    let store = FilesystemStateStore::open(&run_dir).unwrap();
    let mut reader = PlaybackReader::open(&store).unwrap();
    assert_eq!(reader.meta().chunks, 3);
    for frame in 0..7 {
        assert_eq!(reader.get_state(frame).unwrap(), state(frame));
    }
}

#[test]
fn stale_chunk_files_fail_loudly() {
    let dir = tempdir().unwrap();
    let mut store = FilesystemStateStore::create(dir.path()).unwrap();
    store.write_chunk(&latticeforge::domains::simulation::StateChunk {
        index: 0,
        start_frame: 0,
        full: state(0),
        deltas: Vec::new(),
    })
    .unwrap();

    std::fs::write(dir.path().join("chunk_00000.lfss"), b"not a chunk").unwrap();
    assert!(store.read_chunk(0).is_err());
}

#[test]
fn opening_a_missing_run_directory_fails() {
    let dir = tempdir().unwrap();
    assert!(FilesystemStateStore::open(dir.path().join("nope")).is_err());
}

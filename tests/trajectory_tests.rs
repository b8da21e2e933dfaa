use tempfile::tempdir;

use latticeforge::adapters::outbound::{FilesystemScriptSource, MemoryScriptSource};
use latticeforge::domains::trajectory::{compile_script, DEFAULT_RATE};

fn source(entries: &[(&str, &str)]) -> MemoryScriptSource {
    let mut src = MemoryScriptSource::new();
    for (name, text) in entries {
        src.insert(name, text);
    }
    src
}

#[test]
fn wait_emits_rate_times_seconds_frames() {
    let src = source(&[("r.txt", "wait(0.5)")]);
    let timeline = compile_script(&src, "r.txt").unwrap();
    assert_eq!(timeline.len(), (0.5 * DEFAULT_RATE).round() as usize);
    assert!(timeline.iter().all(|f| f.zones.contains_key("waiting")));
}

#[test]
fn rate_register_persists_into_sub_scripts() {
    let src = source(&[("r.txt", "rate(10)\n<sub"), ("sub.txt", "wait(1)")]);
    let timeline = compile_script(&src, "r.txt").unwrap();
    // One rate frame, then 1 s at 10 fps.
    assert_eq!(timeline.len(), 1 + 10);
    assert_eq!(timeline[0].rate, Some(10.0));
}

#[test]
fn zmove_truncates_steps_and_orders_x_before_y() {
    let src = source(&[("r.txt", "zmove(3, 1.6, -0.7)")]);
    let timeline = compile_script(&src, "r.txt").unwrap();
    // 2 steps/mm: 3.2 truncates to 3 x-steps, -1.4 to one -Y step.
    assert_eq!(timeline.len(), 4);
    for frame in &timeline[..3] {
        assert_eq!(frame.zones["Z03"], "+X");
    }
    assert_eq!(timeline[3].zones["Z03"], "-Y");
}

#[test]
fn simscript_merges_branches_to_the_longest() {
    let src = source(&[("r.txt", "simscript(zmove(1, 1, 0), wait(0.05))")]);
    let timeline = compile_script(&src, "r.txt").unwrap();
    // zmove branch: 2 frames; wait branch: 6 frames at the default rate.
    assert_eq!(timeline.len(), 6);
    assert_eq!(timeline[0].zones["Z01"], "+X");
    assert!(timeline[0].zones.contains_key("waiting"));
    assert!(!timeline[2].zones.contains_key("Z01"));
    assert!(timeline[5].zones.contains_key("waiting"));
}

#[test]
fn missing_final_paren_compiles_identically() {
    let balanced = source(&[("r.txt", "simscript(wait(0.1), zmove(1, 0.5, 0))")]);
    let truncated = source(&[("r.txt", "simscript(wait(0.1), zmove(1, 0.5, 0)")]);
    let a = compile_script(&balanced, "r.txt").unwrap();
    let b = compile_script(&truncated, "r.txt").unwrap();
    assert_eq!(a, b);
}

#[test]
fn frames_record_the_full_script_stack() {
    let src = source(&[("top.txt", "<mid"), ("mid.txt", "wait(0.1)")]);
    let timeline = compile_script(&src, "top.txt").unwrap();
    assert_eq!(timeline[0].script, vec!["top.txt", "mid.txt"]);
}

#[test]
fn filesystem_scripts_resolve_case_insensitively() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("root.txt"), "<Moves\n").unwrap();
    std::fs::write(dir.path().join("moves.txt"), "zmove(1, 1, 0)\n").unwrap();

    let src = FilesystemScriptSource::new(dir.path());
    let timeline = compile_script(&src, "Root.txt").unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].script, vec!["Root.txt", "Moves.txt"]);
}

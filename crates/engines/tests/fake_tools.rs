#![cfg(unix)]

use dp_config::{MetisConfig, ScotchConfig};
use dp_engines::{run_gmap, run_gpmetis, run_tool, EngineError};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perm = std::fs::metadata(&p).unwrap().permissions();
    perm.set_mode(0o755);
    std::fs::set_permissions(&p, perm).unwrap();
    p
}

#[test]
fn fake_partitioner_reports_metrics_and_part_file() {
    let dir = tempfile::tempdir().unwrap();
    // args: -contig -objtype=cut -ptype=kway <file> <k>
    let bin = script(
        dir.path(),
        "gpmetis",
        r#"printf '0\n1\n1\n0\n' > "$4.part.$5"
echo " - Edgecut: 3, communication volume: 5."
echo "warning on stderr" >&2"#,
    );
    let graph = dir.path().join("g.graph");
    std::fs::write(&graph, "4 0 11\n1\n1\n1\n1\n").unwrap();
    let cfg = MetisConfig { binary: bin.display().to_string(), ..MetisConfig::default() };
    let run = run_gpmetis(&cfg, &graph, 2).unwrap();
    assert_eq!(run.edgecut, Some(3));
    assert_eq!(run.comm_volume, Some(5));
    assert_eq!(run.assignment_path, dir.path().join("g.graph.part.2"));
    assert!(run.output.contains("warning on stderr"));
}

#[test]
fn partitioner_without_part_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let bin = script(dir.path(), "gpmetis", "echo 'Edgecut: 1'");
    let cfg = MetisConfig { binary: bin.display().to_string(), ..MetisConfig::default() };
    let err = run_gpmetis(&cfg, &dir.path().join("g.graph"), 3).unwrap_err();
    match err {
        EngineError::MissingOutput { output, .. } => assert!(output.contains("Edgecut: 1")),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn nonzero_exit_carries_output() {
    let dir = tempfile::tempdir().unwrap();
    let bin = script(dir.path(), "boom", "echo 'input file is broken' >&2\nexit 3");
    let err = run_tool(&bin.display().to_string(), &[], None).unwrap_err();
    match err {
        EngineError::Failed { output, status, .. } => {
            assert!(output.contains("input file is broken"));
            assert!(status.contains('3'), "{status}");
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn slow_tool_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let bin = script(dir.path(), "slow", "echo started\nexec sleep 5");
    let err = run_tool(&bin.display().to_string(), &[], Some(Duration::from_millis(200))).unwrap_err();
    assert!(matches!(err, EngineError::TimedOut { .. }), "{err}");
}

#[test]
fn fake_mapper_writes_pairs() {
    let dir = tempfile::tempdir().unwrap();
    // args: -cbr -vm <grf> <arch> <map>
    let bin = script(dir.path(), "gmap", r#"printf '2\n0 1\n1 0\n' > "$5"; echo "mapped $3 onto $4""#);
    let cfg = ScotchConfig {
        binary: bin.display().to_string(),
        arch: dir.path().join("hw.arch"),
        ..ScotchConfig::default()
    };
    let map = dir.path().join("g.map");
    let out = run_gmap(&cfg, &dir.path().join("g.grf"), &map).unwrap();
    assert!(out.contains("hw.arch"));
    assert_eq!(std::fs::read_to_string(&map).unwrap(), "2\n0 1\n1 0\n");
}

//! Black-box invocation of the external partitioner (`gpmetis`) and
//! architecture mapper (`gmap`).
//!
//! Both tools are plain subprocesses. Their combined stdout/stderr is always
//! captured and handed back, on success and on failure.

use dp_config::{MetisConfig, ScotchConfig};
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[cfg(feature = "telemetry")]
use dp_telemetry as telemetry;

const POLL: Duration = Duration::from_millis(20);
/// How long to wait for pipes to drain after killing a timed-out tool.
const DRAIN: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("'{binary}' not found")]
    NotFound { binary: String },
    #[error("cannot start '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{binary}' failed ({status}):\n{output}")]
    Failed {
        binary: String,
        status: String,
        output: String,
    },
    #[error("'{binary}' timed out after {secs}s:\n{output}")]
    TimedOut {
        binary: String,
        secs: u64,
        output: String,
    },
    #[error("'{binary}' finished but wrote no {}:\n{output}", .path.display())]
    MissingOutput {
        binary: String,
        path: PathBuf,
        output: String,
    },
}

/// First candidate resolvable by the shell, if any.
pub fn detect_tool(candidates: &[&str]) -> Option<String> {
    for c in candidates {
        if c.contains('/') {
            if Path::new(c).is_file() {
                return Some((*c).to_string());
            }
            continue;
        }
        if Command::new("sh")
            .arg("-c")
            .arg(format!("command -v {c}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .ok()?
            .success()
        {
            return Some((*c).to_string());
        }
    }
    None
}

/// Captured result of one successful tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}{}", self.stdout, self.stderr)
        }
    }
}

fn drain<R: Read + Send + 'static>(r: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut r) = r {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
    } else {
        let _ = tx.send(String::new());
    }
    rx
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<Option<std::process::ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if timeout.is_some_and(|t| start.elapsed() >= t) {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL);
    }
}

/// Run `binary args..`, capturing both streams. A nonzero exit, a timeout or
/// a spawn failure is an error carrying whatever the tool printed.
pub fn run_tool(binary: &str, args: &[String], timeout: Option<Duration>) -> Result<ToolOutput, EngineError> {
    debug!(binary, ?args, "spawning");
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::NotFound { binary: binary.to_string() },
            _ => EngineError::Spawn { binary: binary.to_string(), source: e },
        })?;
    let out_rx = drain(child.stdout.take());
    let err_rx = drain(child.stderr.take());

    let status = wait_with_timeout(&mut child, timeout)
        .map_err(|e| EngineError::Spawn { binary: binary.to_string(), source: e })?;
    let Some(status) = status else {
        let output = format!(
            "{}{}",
            out_rx.recv_timeout(DRAIN).unwrap_or_default(),
            err_rx.recv_timeout(DRAIN).unwrap_or_default()
        );
        return Err(EngineError::TimedOut {
            binary: binary.to_string(),
            secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            output,
        });
    };
    let out = ToolOutput {
        stdout: out_rx.recv().unwrap_or_default(),
        stderr: err_rx.recv().unwrap_or_default(),
    };
    if !status.success() {
        return Err(EngineError::Failed {
            binary: binary.to_string(),
            status: status.to_string(),
            output: out.combined(),
        });
    }
    Ok(out)
}

fn edgecut_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Edgecut:\s+(\d+)").ok()).as_ref()
}

fn comm_volume_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"communication volume:\s+(\d+)").ok()).as_ref()
}

fn capture_u64(re: Option<&Regex>, text: &str) -> Option<u64> {
    re?.captures(text)?.get(1)?.as_str().parse().ok()
}

/// `Edgecut: <n>` from partitioner output.
pub fn parse_edgecut(text: &str) -> Option<u64> {
    capture_u64(edgecut_re(), text)
}

/// `communication volume: <n>` from partitioner output.
pub fn parse_comm_volume(text: &str) -> Option<u64> {
    capture_u64(comm_volume_re(), text)
}

/// `<graph file>.part.<k>`, where the partitioner leaves its assignment.
pub fn part_file_path(graph_file: &Path, k: u32) -> PathBuf {
    let mut s = graph_file.as_os_str().to_owned();
    s.push(format!(".part.{k}"));
    PathBuf::from(s)
}

/// One k-way partitioner run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetisRun {
    pub k: u32,
    pub output: String,
    /// Absent when the output carried no `Edgecut:` line.
    pub edgecut: Option<u64>,
    pub comm_volume: Option<u64>,
    pub assignment_path: PathBuf,
}

/// Partition a format A file into `k` parts.
pub fn run_gpmetis(cfg: &MetisConfig, graph_file: &Path, k: u32) -> Result<MetisRun, EngineError> {
    #[cfg(feature = "telemetry")]
    let app = std::env::var("DAGPART_PROFILE_JSONL")
        .ok()
        .and_then(|p| telemetry::profiling::Appender::open(p).ok());
    #[cfg(feature = "telemetry")]
    let _timer = app.as_ref().map(|a| {
        let name = graph_file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        a.start_timer("engine.run_ms", telemetry::labels::sweep(name, k, "metis"))
    });

    let out = run_tool(&cfg.binary, &cfg.args(graph_file, k), cfg.timeout())?;
    let output = out.combined();
    let assignment_path = part_file_path(graph_file, k);
    if !assignment_path.is_file() {
        return Err(EngineError::MissingOutput { binary: cfg.binary.clone(), path: assignment_path, output });
    }
    let run = MetisRun {
        k,
        edgecut: parse_edgecut(&output),
        comm_volume: parse_comm_volume(&output),
        output,
        assignment_path,
    };
    info!(k, edgecut = ?run.edgecut, comm_volume = ?run.comm_volume, "partitioner finished");
    Ok(run)
}

/// Map a format B file onto `cfg.arch`, writing pair lines to `map_file`.
/// Returns the mapper's captured output.
pub fn run_gmap(cfg: &ScotchConfig, grf: &Path, map_file: &Path) -> Result<String, EngineError> {
    let mut args = cfg.args.clone();
    args.push(grf.display().to_string());
    args.push(cfg.arch.display().to_string());
    args.push(map_file.display().to_string());
    let out = run_tool(&cfg.binary, &args, cfg.timeout())?;
    let output = out.combined();
    if !map_file.is_file() {
        return Err(EngineError::MissingOutput { binary: cfg.binary.clone(), path: map_file.to_path_buf(), output });
    }
    info!("mapper wrote {}", map_file.display());
    Ok(output)
}

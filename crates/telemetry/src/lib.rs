use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber at `info`, or whatever `RUST_LOG` says.
pub fn init() {
    init_with_verbosity(0);
}

/// Like [`init`], with `-v` raising the default level (`1` debug, `2+` trace).
/// Logs go to stderr so reports on stdout stay clean.
pub fn init_with_verbosity(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub mod profiling {
    use anyhow::{anyhow, Context, Result};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::fs::{File, OpenOptions};
    use std::io::{BufRead, Write};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::{Instant, SystemTime, UNIX_EPOCH};

    /// JSONL record schema (one record per line).
    /// Fields:
    /// - ts_ms: epoch milliseconds
    /// - metric: metric name (e.g., "edgecut", "comm_volume", "imbalance")
    /// - value: numeric value
    /// - labels: key/value tags (graph="fft", k="4", engine="metis")
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ProfileRecord {
        pub ts_ms: u64,
        pub metric: String,
        pub value: f64,
        #[serde(default)]
        pub labels: BTreeMap<String, String>,
    }

    impl ProfileRecord {
        pub fn now(metric: impl Into<String>, value: f64, labels: BTreeMap<String, String>) -> Self {
            Self { ts_ms: now_ms(), metric: metric.into(), value, labels }
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Appends ProfileRecord lines to a JSONL file; provides timer/counter helpers.
    /// Existing content is kept so repeated sweeps build one series file.
    #[derive(Clone)]
    pub struct Appender {
        file: Arc<Mutex<File>>,
    }

    impl Appender {
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            Ok(Self { file: Arc::new(Mutex::new(f)) })
        }

        pub fn log(&self, rec: &ProfileRecord) -> Result<()> {
            let line = serde_json::to_string(rec)?;
            let mut guard = self.file.lock().map_err(|_| anyhow!("profile file lock poisoned"))?;
            writeln!(&mut *guard, "{line}")?;
            Ok(())
        }

        pub fn start_timer(&self, metric: impl Into<String>, labels: BTreeMap<String, String>) -> TimerGuard {
            TimerGuard {
                start: Instant::now(),
                metric: metric.into(),
                labels,
                file: self.file.clone(),
            }
        }

        pub fn counter(&self, metric: impl Into<String>, value: f64, labels: BTreeMap<String, String>) -> Result<()> {
            self.log(&ProfileRecord::now(metric, value, labels))
        }
    }

    /// Records elapsed milliseconds on drop.
    pub struct TimerGuard {
        start: Instant,
        metric: String,
        labels: BTreeMap<String, String>,
        file: Arc<Mutex<File>>,
    }

    impl Drop for TimerGuard {
        fn drop(&mut self) {
            let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
            let rec = ProfileRecord::now(std::mem::take(&mut self.metric), elapsed_ms, std::mem::take(&mut self.labels));
            if let (Ok(mut guard), Ok(line)) = (self.file.lock(), serde_json::to_string(&rec)) {
                let _ = writeln!(&mut *guard, "{line}");
            }
        }
    }

    /// Read every parseable record; blank and malformed lines are skipped.
    pub fn read_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<ProfileRecord>> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let rdr = std::io::BufReader::new(f);
        Ok(rdr
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str::<ProfileRecord>(&l).ok())
            .collect())
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct MetricSummary {
        pub count: usize,
        pub sum: f64,
        pub min: f64,
        pub max: f64,
    }

    impl MetricSummary {
        pub fn avg(&self) -> f64 {
            if self.count == 0 {
                0.0
            } else {
                self.sum / self.count as f64
            }
        }
    }

    /// Per-metric (count, sum, min, max), ordered by metric name.
    pub fn summarize(records: &[ProfileRecord]) -> BTreeMap<String, MetricSummary> {
        let mut stats: BTreeMap<String, MetricSummary> = BTreeMap::new();
        for rec in records {
            let e = stats.entry(rec.metric.clone()).or_insert(MetricSummary {
                count: 0,
                sum: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            });
            e.count += 1;
            e.sum += rec.value;
            e.min = e.min.min(rec.value);
            e.max = e.max.max(rec.value);
        }
        stats
    }

    /// Summarize a JSONL file of ProfileRecord objects.
    pub fn summarize_jsonl<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, MetricSummary>> {
        Ok(summarize(&read_jsonl(path)?))
    }

    /// `metric,count,avg,min,max` CSV, header included.
    pub fn summary_csv(stats: &BTreeMap<String, MetricSummary>) -> String {
        let mut out = String::from("metric,count,avg,min,max\n");
        for (m, s) in stats {
            out.push_str(&format!("{m},{},{:.3},{:.3},{:.3}\n", s.count, s.avg(), s.min, s.max));
        }
        out
    }
}

/// Label constructors for a consistent label schema across the workspace.
/// Keys used consistently:
/// - "graph": input graph name (file stem)
/// - "k": requested partition count
/// - "engine": external partitioner ("metis" or "scotch")
pub mod labels {
    use std::collections::BTreeMap;

    pub const GRAPH: &str = "graph";
    pub const K: &str = "k";
    pub const ENGINE: &str = "engine";

    /// Create labels with graph name.
    pub fn graph(graph: &str) -> BTreeMap<String, String> {
        with(BTreeMap::new(), GRAPH, graph)
    }

    /// Labels for one point of a partition-count sweep.
    pub fn sweep(graph_name: &str, k: u32, engine: &str) -> BTreeMap<String, String> {
        let m = with(graph(graph_name), K, &k.to_string());
        with(m, ENGINE, engine)
    }

    /// Convenience to add or override a single (k,v) pair.
    pub fn with(mut m: BTreeMap<String, String>, key: &str, val: &str) -> BTreeMap<String, String> {
        m.insert(key.to_string(), val.to_string());
        m
    }
}

#[cfg(test)]
mod tests_profile {
    use super::labels;
    use super::profiling::{read_jsonl, summarize_jsonl, summary_csv, Appender, ProfileRecord};

    #[test]
    fn appended_records_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.jsonl");
        let app = Appender::open(&path).unwrap();
        app.counter("edgecut", 12.0, labels::sweep("fft", 2, "metis")).unwrap();
        app.counter("imbalance", 1.05, labels::sweep("fft", 2, "metis")).unwrap();
        let back: Vec<ProfileRecord> = read_jsonl(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].labels["k"], "2");
        assert_eq!(back[1].labels["engine"], "metis");
    }

    #[test]
    fn appender_appends_and_summarizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.jsonl");
        for k in [2u32, 3] {
            let app = Appender::open(&path).unwrap();
            app.counter("edgecut", f64::from(k) * 10.0, labels::sweep("g", k, "metis")).unwrap();
            {
                let _t = app.start_timer("engine_ms", labels::graph("g"));
            }
        }
        std::fs::write(&path, std::fs::read_to_string(&path).unwrap() + "not json\n\n").unwrap();
        let stats = summarize_jsonl(&path).unwrap();
        assert_eq!(stats["edgecut"].count, 2);
        assert_eq!(stats["edgecut"].min, 20.0);
        assert_eq!(stats["edgecut"].max, 30.0);
        assert!((stats["edgecut"].avg() - 25.0).abs() < 1e-9);
        assert_eq!(stats["engine_ms"].count, 2);
        let csv = summary_csv(&stats);
        assert!(csv.starts_with("metric,count,avg,min,max\n"));
        assert!(csv.contains("edgecut,2,25.000,20.000,30.000\n"));
    }

    #[test]
    fn sweep_labels_carry_graph_k_and_engine() {
        let m = labels::sweep("fft", 4, "scotch");
        assert_eq!(m.len(), 3);
        assert_eq!((m["graph"].as_str(), m["k"].as_str(), m["engine"].as_str()), ("fft", "4", "scotch"));
        assert_eq!(labels::with(m, labels::K, "8")["k"], "8");
    }
}

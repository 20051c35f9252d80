use anyhow::{bail, Context};
use serde::Deserialize;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Graph partitioner (format A) invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetisConfig {
    pub binary: String,
    /// Ask for contiguous partitions.
    pub contig: bool,
    pub ptype: String,
    pub objtype: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for MetisConfig {
    fn default() -> Self {
        Self {
            binary: "gpmetis".into(),
            contig: true,
            ptype: "kway".into(),
            objtype: Some("cut".into()),
            timeout_secs: None,
        }
    }
}

impl MetisConfig {
    /// `[-contig] [-objtype=..] -ptype=.. <graph> <k>`
    pub fn args(&self, graph_file: &Path, k: u32) -> Vec<String> {
        let mut a = Vec::new();
        if self.contig {
            a.push("-contig".to_string());
        }
        if let Some(o) = &self.objtype {
            a.push(format!("-objtype={o}"));
        }
        a.push(format!("-ptype={}", self.ptype));
        a.push(graph_file.display().to_string());
        a.push(k.to_string());
        a
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Architecture mapper (format B) invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScotchConfig {
    pub binary: String,
    /// Flags placed before the positional graph, arch and map paths.
    pub args: Vec<String>,
    pub arch: PathBuf,
    pub timeout_secs: Option<u64>,
}

impl Default for ScotchConfig {
    fn default() -> Self {
        Self {
            binary: "gmap".into(),
            args: vec!["-cbr".into(), "-vm".into()],
            arch: PathBuf::from("hardware.arch"),
            timeout_secs: None,
        }
    }
}

impl ScotchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub k_min: u32,
    pub k_max: u32,
    /// Record a k only when both edge cut and communication volume were reported.
    pub require_complete: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { k_min: 2, k_max: 10, require_complete: false }
    }
}

impl SweepConfig {
    pub fn ks(&self) -> RangeInclusive<u32> {
        self.k_min..=self.k_max
    }

    /// Command-line values win; `require_complete` can only be switched on.
    pub fn with_overrides(&self, k_min: Option<u32>, k_max: Option<u32>, require_complete: bool) -> Self {
        Self {
            k_min: k_min.unwrap_or(self.k_min),
            k_max: k_max.unwrap_or(self.k_max),
            require_complete: self.require_complete || require_complete,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.k_min < 2 {
            bail!("sweep.k_min must be >= 2");
        }
        if self.k_min > self.k_max {
            bail!("sweep.k_min must be <= sweep.k_max");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Processor counts for the slackness table.
    pub processors: Vec<u32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { processors: vec![1, 2, 4, 8, 16, 32, 64] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub graph_dir: PathBuf,
    pub scotch_dir: PathBuf,
    pub dot_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            graph_dir: PathBuf::from("graph"),
            scotch_dir: PathBuf::from("scotch"),
            dot_dir: PathBuf::from("dot_output"),
        }
    }
}

/// Tool configuration. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub metis: MetisConfig,
    pub scotch: ScotchConfig,
    pub sweep: SweepConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

pub fn parse_config_str(s: &str) -> Result<ToolConfig, anyhow::Error> {
    let c: ToolConfig = toml::from_str(s)?;
    Ok(c)
}

pub fn parse_config_path<P: AsRef<Path>>(path: P) -> Result<ToolConfig, anyhow::Error> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    parse_config_str(&data).with_context(|| format!("invalid config {}", path.display()))
}

/// Parse and validate `path`, or fall back to defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<ToolConfig, anyhow::Error> {
    let cfg = match path {
        Some(p) => {
            debug!("loading config from {}", p.display());
            parse_config_path(p)?
        }
        None => ToolConfig::default(),
    };
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn load_configs_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<(PathBuf, ToolConfig)>, anyhow::Error> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let p = entry.path();
        if p.extension().and_then(|e| e.to_str()) == Some("toml") {
            let c = parse_config_path(&p)?;
            out.push((p, c));
        }
    }
    Ok(out)
}

/// Validate a configuration for basic consistency.
pub fn validate_config(c: &ToolConfig) -> anyhow::Result<()> {
    if c.metis.binary.trim().is_empty() {
        bail!("metis.binary must be non-empty");
    }
    if c.metis.ptype.trim().is_empty() {
        bail!("metis.ptype must be non-empty");
    }
    if let Some(o) = &c.metis.objtype {
        if o.trim().is_empty() {
            bail!("metis.objtype must be non-empty when set");
        }
    }
    if c.metis.timeout_secs == Some(0) {
        bail!("metis.timeout_secs must be > 0");
    }
    if c.scotch.binary.trim().is_empty() {
        bail!("scotch.binary must be non-empty");
    }
    if c.scotch.arch.as_os_str().is_empty() {
        bail!("scotch.arch must be non-empty");
    }
    if c.scotch.timeout_secs == Some(0) {
        bail!("scotch.timeout_secs must be > 0");
    }
    c.sweep.validate()?;
    if c.analysis.processors.contains(&0) {
        bail!("analysis.processors entries must be > 0");
    }
    for (field, dir) in [
        ("output.graph_dir", &c.output.graph_dir),
        ("output.scotch_dir", &c.output.scotch_dir),
        ("output.dot_dir", &c.output.dot_dir),
    ] {
        if dir.as_os_str().is_empty() {
            bail!("{field} must be non-empty");
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests_configs_dir {
    use std::path::PathBuf;

    #[test]
    fn validate_all_configs_dir() {
        let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let ws_root = crate_dir.parent().and_then(|p| p.parent()).expect("workspace root");
        let dir = ws_root.join("configs");
        let cfgs = super::load_configs_from_dir(&dir).expect("load configs");
        assert!(!cfgs.is_empty(), "no config files found");
        for (p, c) in cfgs {
            super::validate_config(&c).unwrap_or_else(|e| panic!("{}: {e}", p.display()));
        }
    }
}

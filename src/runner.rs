//! Statistical timing runner
//!
//! The driver never times anything itself. It hands a batch of named shell
//! commands to a `TimingRunner`, which repeats each one (after warmup) and
//! writes a machine-readable and a human-readable result file. hyperfine is
//! the production implementation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

/// One named command to be timed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trial {
    /// Stable label, e.g. `paginated-flat-10000-10pages`
    pub name: String,
    /// Shell command line executed by the runner
    pub command: String,
    /// Bucket the command reads
    pub bucket: String,
}

/// Everything the runner needs for one access-pattern phase
#[derive(Debug, Clone)]
pub struct TrialBatch<'a> {
    pub trials: &'a [Trial],
    pub runs: u32,
    pub warmup: u32,
    pub json_out: PathBuf,
    pub markdown_out: PathBuf,
    /// Extra environment for the spawned commands (credentials, endpoint)
    pub env: Vec<(String, String)>,
}

#[async_trait]
pub trait TimingRunner: Send + Sync {
    fn name(&self) -> &str;

    /// Verify the runner can be used before any phase starts
    async fn check_available(&self) -> Result<String>;

    /// Execute the batch and write both result files
    async fn run(&self, batch: &TrialBatch<'_>) -> Result<()>;
}

/// hyperfine invoked as a child process
pub struct HyperfineRunner {
    binary: PathBuf,
}

impl HyperfineRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// Argument vector for one batch, without the executable
    pub fn build_args(batch: &TrialBatch<'_>) -> Vec<String> {
        let mut args = vec![
            "--runs".to_string(),
            batch.runs.to_string(),
            "--warmup".to_string(),
            batch.warmup.to_string(),
            "--style".to_string(),
            "basic".to_string(),
            "--export-json".to_string(),
            batch.json_out.display().to_string(),
            "--export-markdown".to_string(),
            batch.markdown_out.display().to_string(),
        ];
        for trial in batch.trials {
            args.push("--command-name".to_string());
            args.push(trial.name.clone());
            args.push(trial.command.clone());
        }
        args
    }
}

#[async_trait]
impl TimingRunner for HyperfineRunner {
    fn name(&self) -> &str {
        "hyperfine"
    }

    async fn check_available(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| {
                format!(
                    "Required tool '{}' not found. Install hyperfine (https://github.com/sharkdp/hyperfine) or set LISTBENCH_HYPERFINE",
                    self.binary.display()
                )
            })?;
        if !output.status.success() {
            bail!("'{} --version' exited with {}", self.binary.display(), output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run(&self, batch: &TrialBatch<'_>) -> Result<()> {
        if batch.trials.is_empty() {
            bail!("hyperfine invoked with an empty trial batch");
        }
        let args = Self::build_args(batch);
        info!(
            "Running {} trials with hyperfine (runs={}, warmup={})",
            batch.trials.len(),
            batch.runs,
            batch.warmup
        );
        debug!("hyperfine args: {:?}", args);

        let status = Command::new(&self.binary)
            .args(&args)
            .envs(batch.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to launch {}", self.binary.display()))?;

        if !status.success() {
            bail!("hyperfine exited with {}", status);
        }
        if !batch.json_out.exists() {
            bail!("hyperfine finished but {} was not written", batch.json_out.display());
        }
        Ok(())
    }
}

/// Subset of hyperfine's `--export-json` document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HyperfineExport {
    #[serde(default)]
    pub results: Vec<BenchmarkResult>,
}

/// One timed command as exported by hyperfine (seconds)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// The command name when `--command-name` was given
    pub command: String,
    pub mean: f64,
    #[serde(default)]
    pub stddev: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub times: Vec<f64>,
}

impl HyperfineExport {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Quote a word for a POSIX shell, leaving simple words untouched
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

//! Results directory management for list-bench
//!
//! One directory per invocation holds:
//! - `{pattern}.json` / `{pattern}.md` (timing runner exports)
//! - `{pattern}.skipped.json` (trials the driver could not run)
//! - `metadata.json` (run metadata)
//! - `REPORT.md` (combined report)
//!
//! Each phase writes only its own files; the report only reads.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::config::BenchConfig;
use crate::constants::{DEFAULT_LABEL, METADATA_FILE, REPORT_FILE};
use crate::pattern::Pattern;

/// Metadata about a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub label: String,
    pub revision: String,
    pub branch: String,
    pub endpoint: String,
    pub tiers: Vec<u64>,
    pub partitions: usize,
    pub page_size: usize,
    pub runs: u32,
    pub warmup: u32,
    pub seed_strategy: String,
    pub bucket_prefix: String,
    pub hostname: String,
    pub command_line: Vec<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_secs: Option<f64>,
}

impl RunMetadata {
    pub fn new(config: &BenchConfig) -> Self {
        let revision = SourceRevision::detect();
        let label = config
            .label
            .clone()
            .or_else(|| revision.branch.clone())
            .unwrap_or_else(|| DEFAULT_LABEL.to_string());
        let hostname = hostname::get()
            .unwrap_or_else(|_| "unknown".into())
            .to_string_lossy()
            .to_string();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            label,
            revision: revision.commit.unwrap_or_else(|| "unknown".to_string()),
            branch: revision.branch.unwrap_or_else(|| "unknown".to_string()),
            endpoint: config.endpoint.clone(),
            tiers: config.tiers.clone(),
            partitions: config.partitions,
            page_size: config.page_size,
            runs: config.runs,
            warmup: config.warmup,
            seed_strategy: config.seed_strategy.to_string(),
            bucket_prefix: config.bucket_prefix.clone(),
            hostname,
            command_line: redact_args(std::env::args()),
            start_time: Local::now().to_rfc3339(),
            end_time: None,
            duration_secs: None,
        }
    }

    pub fn finalize(&mut self, duration_secs: f64) {
        self.end_time = Some(Local::now().to_rfc3339());
        self.duration_secs = Some(duration_secs);
    }
}

/// Command line with credential flag values masked
fn redact_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    const SECRET_FLAGS: [&str; 2] = ["--access-key", "--secret-key"];
    let mut out = Vec::new();
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            out.push("<redacted>".to_string());
            mask_next = false;
        } else if SECRET_FLAGS.contains(&arg.as_str()) {
            mask_next = true;
            out.push(arg);
        } else if let Some(flag) = SECRET_FLAGS.iter().find(|f| arg.starts_with(&format!("{}=", f))) {
            out.push(format!("{}=<redacted>", flag));
        } else {
            out.push(arg);
        }
    }
    out
}

/// Git commit and branch of the working directory, when available
#[derive(Debug, Clone, Default)]
pub struct SourceRevision {
    pub commit: Option<String>,
    pub branch: Option<String>,
}

impl SourceRevision {
    pub fn detect() -> Self {
        Self {
            commit: git_output(&["rev-parse", "--short", "HEAD"]),
            branch: git_output(&["rev-parse", "--abbrev-ref", "HEAD"]).filter(|b| b != "HEAD"),
        }
    }
}

fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Results directory manager
#[derive(Debug, Clone)]
pub struct ResultsDir {
    path: PathBuf,
}

impl ResultsDir {
    /// Open (creating if absent) a results directory
    pub fn create(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create results directory: {}", path.display()))?;
        tracing::debug!("Using results directory: {}", path.display());
        Ok(Self { path: path.to_path_buf() })
    }

    /// Refer to an existing directory without creating it
    pub fn existing(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            anyhow::bail!("Results directory not found: {}", path.display());
        }
        Ok(Self { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Machine-readable export of one pattern
    pub fn json_path(&self, pattern: Pattern) -> PathBuf {
        self.path.join(format!("{}.json", pattern.slug()))
    }

    /// Human-readable table of one pattern
    pub fn markdown_path(&self, pattern: Pattern) -> PathBuf {
        self.path.join(format!("{}.md", pattern.slug()))
    }

    pub fn skipped_path(&self, pattern: Pattern) -> PathBuf {
        self.path.join(format!("{}.skipped.json", pattern.slug()))
    }

    pub fn report_path(&self) -> PathBuf {
        self.path.join(REPORT_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    /// Remove a phase's previous artifacts so a failed rerun cannot leave
    /// stale numbers behind
    pub fn clear_pattern(&self, pattern: Pattern) -> Result<()> {
        for path in [self.json_path(pattern), self.markdown_path(pattern), self.skipped_path(pattern)] {
            if path.exists() {
                fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }

    pub fn write_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        let json = serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
        fs::write(self.metadata_path(), json).context("Failed to write metadata.json")?;
        Ok(())
    }

    pub fn read_metadata(&self) -> Result<Option<RunMetadata>> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let metadata = serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_results_dir_creation_and_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("results");
        let results = ResultsDir::create(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(results.json_path(Pattern::FullList), root.join("full-list.json"));
        assert_eq!(results.markdown_path(Pattern::Paginated), root.join("paginated.md"));
        assert_eq!(results.skipped_path(Pattern::Prefix), root.join("prefix.skipped.json"));
        assert_eq!(results.report_path(), root.join("REPORT.md"));
    }

    #[test]
    fn test_existing_requires_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ResultsDir::existing(&temp_dir.path().join("missing")).is_err());
        assert!(ResultsDir::existing(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_metadata_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let results = ResultsDir::create(temp_dir.path()).unwrap();
        assert!(results.read_metadata().unwrap().is_none());

        let mut config = BenchConfig::default();
        config.label = Some("baseline".into());
        let mut metadata = RunMetadata::new(&config);
        metadata.finalize(12.5);
        results.write_metadata(&metadata).unwrap();

        let loaded = results.read_metadata().unwrap().unwrap();
        assert_eq!(loaded.label, "baseline");
        assert_eq!(loaded.duration_secs, Some(12.5));
        assert_eq!(loaded.tiers, config.tiers);
    }

    #[test]
    fn test_command_line_redacts_credentials() {
        let argv = ["list-bench", "--secret-key", "s3cr3t", "--access-key=ak", "run", "1000"];
        let redacted = redact_args(argv.iter().map(|s| s.to_string()));
        assert_eq!(
            redacted,
            vec!["list-bench", "--secret-key", "<redacted>", "--access-key=<redacted>", "run", "1000"]
        );
    }

    #[test]
    fn test_clear_pattern_removes_only_that_pattern() {
        let temp_dir = TempDir::new().unwrap();
        let results = ResultsDir::create(temp_dir.path()).unwrap();
        fs::write(results.json_path(Pattern::FullList), "{}").unwrap();
        fs::write(results.json_path(Pattern::Prefix), "{}").unwrap();

        results.clear_pattern(Pattern::FullList).unwrap();
        assert!(!results.json_path(Pattern::FullList).exists());
        assert!(results.json_path(Pattern::Prefix).exists());
    }
}

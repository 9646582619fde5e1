// src/config.rs
//
// Configuration resolution: CLI flags and LISTBENCH_* environment overrides
// are collapsed once into an immutable `BenchConfig` that every component
// receives at construction.

use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use url::Url;

use crate::constants::*;
use crate::layout::parse_tiers;

/// How the seeder materializes objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedStrategy {
    /// One PUT per key, fanned out up to the seeding parallelism
    Direct,
    /// Hard-link every key into a local staging tree, then bulk sync the tree
    Staged,
}

impl fmt::Display for SeedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedStrategy::Direct => write!(f, "direct"),
            SeedStrategy::Staged => write!(f, "staged"),
        }
    }
}

/// Raw configuration flags, each backed by an environment variable
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// S3-compatible endpoint URL
    #[arg(long, env = ENV_ENDPOINT, default_value = DEFAULT_ENDPOINT, global = true)]
    pub endpoint: String,

    /// Signing region
    #[arg(long, env = ENV_REGION, default_value = DEFAULT_REGION, global = true)]
    pub region: String,

    /// Access key passed through to every request
    #[arg(long, env = ENV_ACCESS_KEY, default_value = DEFAULT_ACCESS_KEY, hide_env_values = true, global = true)]
    pub access_key: String,

    /// Secret key passed through to every request
    #[arg(long, env = ENV_SECRET_KEY, default_value = DEFAULT_SECRET_KEY, hide_env_values = true, hide_default_value = true, global = true)]
    pub secret_key: String,

    /// Space-delimited tier list (object counts), e.g. "1000 10000"
    #[arg(long, env = ENV_TIERS, default_value = DEFAULT_TIERS, global = true)]
    pub tiers: String,

    /// Number of partitions in the nested layout
    #[arg(long, env = ENV_PARTITIONS, default_value_t = DEFAULT_PARTITIONS, global = true)]
    pub partitions: usize,

    /// Timed runs per trial
    #[arg(long, env = ENV_RUNS, default_value_t = DEFAULT_RUNS, global = true)]
    pub runs: u32,

    /// Warmup runs per trial
    #[arg(long, env = ENV_WARMUP, default_value_t = DEFAULT_WARMUP, global = true)]
    pub warmup: u32,

    /// Maximum concurrent writes while seeding
    #[arg(long, env = ENV_PARALLEL, default_value_t = DEFAULT_SEED_PARALLELISM, global = true)]
    pub parallel: usize,

    /// Destination for all result artifacts
    #[arg(long, env = ENV_RESULTS_DIR, default_value = DEFAULT_RESULTS_DIR, global = true)]
    pub results_dir: PathBuf,

    /// Objects per page in the paginated benchmark
    #[arg(long, env = ENV_PAGE_SIZE, default_value_t = DEFAULT_PAGE_SIZE, global = true)]
    pub page_size: usize,

    /// Prefix of every generated bucket name
    #[arg(long, env = ENV_BUCKET_PREFIX, default_value = DEFAULT_BUCKET_PREFIX, global = true)]
    pub bucket_prefix: String,

    /// Seeding strategy
    #[arg(long, env = ENV_SEED_STRATEGY, value_enum, default_value_t = SeedStrategy::Direct, global = true)]
    pub seed_strategy: SeedStrategy,

    /// Staging area for the staged strategy (defaults to a temp subdirectory)
    #[arg(long, env = ENV_STAGING_DIR, global = true)]
    pub staging_dir: Option<PathBuf>,

    /// Run label recorded in the report (defaults to the git branch)
    #[arg(long, env = ENV_LABEL, global = true)]
    pub label: Option<String>,

    /// hyperfine executable
    #[arg(long, env = ENV_HYPERFINE, default_value = DEFAULT_HYPERFINE, global = true)]
    pub hyperfine: PathBuf,
}

/// Static credentials. The secret never appears in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Resolved, validated configuration for one invocation
#[derive(Debug, Clone, Serialize)]
pub struct BenchConfig {
    pub endpoint: String,
    pub region: String,
    #[serde(skip)]
    pub credentials: Credentials,
    /// Ascending, de-duplicated
    pub tiers: Vec<u64>,
    pub partitions: usize,
    pub runs: u32,
    pub warmup: u32,
    pub seed_parallelism: usize,
    pub results_dir: PathBuf,
    pub page_size: usize,
    pub bucket_prefix: String,
    pub seed_strategy: SeedStrategy,
    pub staging_dir: PathBuf,
    pub label: Option<String>,
    pub hyperfine: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            credentials: Credentials {
                access_key: DEFAULT_ACCESS_KEY.to_string(),
                secret_key: DEFAULT_SECRET_KEY.to_string(),
            },
            tiers: vec![1_000, 10_000, 100_000],
            partitions: DEFAULT_PARTITIONS,
            runs: DEFAULT_RUNS,
            warmup: DEFAULT_WARMUP,
            seed_parallelism: DEFAULT_SEED_PARALLELISM,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            page_size: DEFAULT_PAGE_SIZE,
            bucket_prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            seed_strategy: SeedStrategy::Direct,
            staging_dir: default_staging_dir(),
            label: None,
            hyperfine: PathBuf::from(DEFAULT_HYPERFINE),
        }
    }
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_STAGING_DIR_NAME)
}

impl BenchConfig {
    /// Resolve flags into a validated config.
    ///
    /// `tier_override` (positional tiers on the command line) replaces the
    /// `--tiers` / LISTBENCH_TIERS list when non-empty.
    pub fn resolve(args: &ConfigArgs, tier_override: &[u64]) -> Result<Self> {
        let tiers = if tier_override.is_empty() {
            parse_tiers(&args.tiers).with_context(|| format!("Failed to parse {}", ENV_TIERS))?
        } else {
            let joined = tier_override.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" ");
            parse_tiers(&joined).context("Failed to parse tier arguments")?
        };

        let config = Self {
            endpoint: args.endpoint.trim_end_matches('/').to_string(),
            region: args.region.clone(),
            credentials: Credentials {
                access_key: args.access_key.clone(),
                secret_key: args.secret_key.clone(),
            },
            tiers,
            partitions: args.partitions,
            runs: args.runs,
            warmup: args.warmup,
            seed_parallelism: args.parallel,
            results_dir: args.results_dir.clone(),
            page_size: args.page_size,
            bucket_prefix: args.bucket_prefix.clone(),
            seed_strategy: args.seed_strategy,
            staging_dir: args.staging_dir.clone().unwrap_or_else(default_staging_dir),
            label: args.label.clone().filter(|l| !l.trim().is_empty()),
            hyperfine: args.hyperfine.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that every component relies on
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid endpoint URL: {}", self.endpoint))?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => bail!("Unsupported endpoint scheme '{}'. Use http:// or https://", scheme),
        }
        if self.tiers.is_empty() {
            bail!("At least one tier is required");
        }
        if self.tiers.iter().any(|&t| t == 0) {
            bail!("Tiers must be positive");
        }
        if self.partitions == 0 {
            bail!("Partition count must be at least 1");
        }
        if self.page_size == 0 || self.page_size > LIST_MAX_KEYS {
            bail!("Page size must be between 1 and {} (the ListObjectsV2 cap), got {}", LIST_MAX_KEYS, self.page_size);
        }
        if self.runs == 0 {
            bail!("Run count must be at least 1");
        }
        if self.seed_parallelism == 0 {
            bail!("Seeding parallelism must be at least 1");
        }
        validate_bucket_prefix(&self.bucket_prefix)?;
        Ok(())
    }

    /// Environment handed to child processes (the timing runner and the
    /// probes it spawns). Credentials travel here, never in command strings.
    pub fn child_env(&self) -> Vec<(String, String)> {
        vec![
            (ENV_ENDPOINT.to_string(), self.endpoint.clone()),
            (ENV_REGION.to_string(), self.region.clone()),
            (ENV_ACCESS_KEY.to_string(), self.credentials.access_key.clone()),
            (ENV_SECRET_KEY.to_string(), self.credentials.secret_key.clone()),
        ]
    }

    /// Tiers rendered the way they are configured: "1000 10000"
    pub fn tiers_display(&self) -> String {
        self.tiers.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" ")
    }
}

/// Bucket names are `{prefix}-{layout}-{tier}`, so the prefix must be a valid
/// bucket-name head: lowercase alphanumerics and '-', starting with a letter
/// or digit, short enough to leave room for the suffix.
fn validate_bucket_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() || prefix.len() > 40 {
        bail!("Bucket prefix must be 1-40 characters, got '{}'", prefix);
    }
    if !prefix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        bail!("Bucket prefix '{}' may only contain lowercase letters, digits and '-'", prefix);
    }
    if prefix.starts_with('-') || prefix.ends_with('-') {
        bail!("Bucket prefix '{}' must not start or end with '-'", prefix);
    }
    Ok(())
}

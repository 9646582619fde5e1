// src/constants.rs
//
// Central location for all constants used throughout list-bench
// This makes tuning and maintenance easier by having all magic numbers in one place

// =============================================================================
// Target Service
// =============================================================================

/// Default S3-compatible endpoint (a local RustFS/MinIO style server)
/// User can override via LISTBENCH_ENDPOINT or --endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9000";

/// Region passed to the SDK; most self-hosted stores ignore it
pub const DEFAULT_REGION: &str = "us-east-1";

/// Static credentials of a freshly installed local server
pub const DEFAULT_ACCESS_KEY: &str = "rustfsadmin";
pub const DEFAULT_SECRET_KEY: &str = "rustfsadmin";

// =============================================================================
// Corpus Shape
// =============================================================================

/// Default scale tiers (object counts), space-delimited like the env override
pub const DEFAULT_TIERS: &str = "1000 10000 100000";

/// Number of `prefix-NNN/` partitions in the nested layout
pub const DEFAULT_PARTITIONS: usize = 100;

/// Prefix of every generated bucket: `{prefix}-{layout}-{tier}`
pub const DEFAULT_BUCKET_PREFIX: &str = "listbench";

/// Size of the shared object payload. Content is irrelevant to listing,
/// only the key space matters.
pub const PAYLOAD_SIZE: usize = 1024;

/// Key templates are zero padded to these widths
pub const OBJECT_INDEX_WIDTH: usize = 6;
pub const PARTITION_INDEX_WIDTH: usize = 3;

// =============================================================================
// Seeding
// =============================================================================

/// Upper bound on concurrent PUTs while seeding
pub const DEFAULT_SEED_PARALLELISM: usize = 64;

/// Directory name (under the system temp dir) used by the staged strategy
pub const DEFAULT_STAGING_DIR_NAME: &str = "list-bench-staging";

/// Name of the single payload file every staged key is hard-linked to
pub const STAGING_PAYLOAD_FILE: &str = ".payload";

// =============================================================================
// Listing
// =============================================================================

/// Objects requested per page in the paginated benchmark
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Server-side page cap of ListObjectsV2. Used for counting and cleanup, and
/// the upper bound of the paginated page size.
pub const LIST_MAX_KEYS: usize = 1000;

/// Path delimiter for directory-style enumeration
pub const DEFAULT_DELIMITER: &str = "/";

/// Maximum number of keys in a single DeleteObjects request
pub const DELETE_BATCH_SIZE: usize = 1000;

// =============================================================================
// Timing Runner
// =============================================================================

/// Timed runs per trial, forwarded to hyperfine `--runs`
pub const DEFAULT_RUNS: u32 = 10;

/// Warmup runs per trial, forwarded to hyperfine `--warmup`
pub const DEFAULT_WARMUP: u32 = 2;

/// Default hyperfine executable (looked up on PATH)
pub const DEFAULT_HYPERFINE: &str = "hyperfine";

// =============================================================================
// Results
// =============================================================================

/// Default results directory, created if absent
pub const DEFAULT_RESULTS_DIR: &str = "bench-results";

/// Combined report file name inside the results directory
pub const REPORT_FILE: &str = "REPORT.md";

/// Run metadata file name inside the results directory
pub const METADATA_FILE: &str = "metadata.json";

/// Label used when no LISTBENCH_LABEL is set and git has no branch
pub const DEFAULT_LABEL: &str = "unlabeled";

// =============================================================================
// Environment Variables
// =============================================================================

pub const ENV_ENDPOINT: &str = "LISTBENCH_ENDPOINT";
pub const ENV_REGION: &str = "LISTBENCH_REGION";
pub const ENV_ACCESS_KEY: &str = "LISTBENCH_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "LISTBENCH_SECRET_KEY";
pub const ENV_TIERS: &str = "LISTBENCH_TIERS";
pub const ENV_PARTITIONS: &str = "LISTBENCH_PARTITIONS";
pub const ENV_RUNS: &str = "LISTBENCH_RUNS";
pub const ENV_WARMUP: &str = "LISTBENCH_WARMUP";
pub const ENV_PARALLEL: &str = "LISTBENCH_PARALLEL";
pub const ENV_RESULTS_DIR: &str = "LISTBENCH_RESULTS_DIR";
pub const ENV_PAGE_SIZE: &str = "LISTBENCH_PAGE_SIZE";
pub const ENV_BUCKET_PREFIX: &str = "LISTBENCH_BUCKET_PREFIX";
pub const ENV_SEED_STRATEGY: &str = "LISTBENCH_SEED_STRATEGY";
pub const ENV_STAGING_DIR: &str = "LISTBENCH_STAGING_DIR";
pub const ENV_LABEL: &str = "LISTBENCH_LABEL";
pub const ENV_HYPERFINE: &str = "LISTBENCH_HYPERFINE";

// -----------------------------------------------------------------------------
// list-bench - ListObjectsV2 benchmark orchestration for S3-compatible servers
// -----------------------------------------------------------------------------

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::runtime::Builder as RtBuilder;
use tracing::{error, info, warn};

use list_bench::cleanup::cleanup;
use list_bench::compare;
use list_bench::config::{BenchConfig, ConfigArgs};
use list_bench::constants::DEFAULT_DELIMITER;
use list_bench::driver::{Driver, ProbeCommand, ProbeMode, ProbeSpec};
use list_bench::pattern::Pattern;
use list_bench::preflight::run_preflight;
use list_bench::report::write_report;
use list_bench::results_dir::{ResultsDir, RunMetadata};
use list_bench::runner::{HyperfineRunner, TimingRunner};
use list_bench::seed::Seeder;
use list_bench::store::{ObjectStore, S3Store};

// -----------------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------------
#[derive(Parser)]
#[command(
    name = "list-bench",
    version,
    about = "Seed fixed-size buckets and benchmark ListObjectsV2 access patterns with hyperfine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed, run all three patterns, and write the combined report
    ///
    /// Examples:
    ///   list-bench run
    ///   list-bench run 1000 5000 --skip-seed
    Run {
        /// Tier overrides (object counts); replaces --tiers when given
        #[arg(value_name = "TIERS")]
        tier_args: Vec<u64>,

        /// Benchmark whatever is already in the containers
        #[arg(long)]
        skip_seed: bool,
    },
    /// Only seed the benchmark containers
    Seed {
        #[arg(value_name = "TIERS")]
        tier_args: Vec<u64>,
    },
    /// Run a single access pattern against already seeded containers
    ///
    /// Examples:
    ///   list-bench bench paginated
    ///   list-bench bench prefix 100000
    Bench {
        #[arg(value_enum)]
        pattern: Pattern,
        #[arg(value_name = "TIERS")]
        tier_args: Vec<u64>,
    },
    /// Regenerate REPORT.md from the artifacts in the results directory
    Report,
    /// Compare two results directories by trial name
    Compare {
        baseline: PathBuf,
        candidate: PathBuf,
    },
    /// Delete every benchmark container and the results directory
    Cleanup {
        /// Leave the results directory in place
        #[arg(long)]
        keep_results: bool,
    },
    /// One logical listing, the unit timed by the runner
    #[command(hide = true)]
    Probe(ProbeArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ProbeModeArg {
    Full,
    Paginate,
    Prefix,
    Delimiter,
}

#[derive(clap::Args)]
struct ProbeArgs {
    #[arg(long)]
    bucket: String,

    #[arg(long, value_enum)]
    mode: ProbeModeArg,

    /// Stop after this many objects (full mode)
    #[arg(long)]
    max_items: Option<u64>,

    #[arg(long, default_value = "")]
    prefix: String,

    #[arg(long, default_value = DEFAULT_DELIMITER)]
    delimiter: String,

    /// Fail unless exactly this many objects (common prefixes in delimiter mode) are listed
    #[arg(long)]
    expect: Option<u64>,

    /// Fail unless exactly this many requests are issued
    #[arg(long)]
    expect_pages: Option<u64>,
}

impl ProbeArgs {
    /// Paginate mode takes its page size from the global --page-size
    fn into_spec(self, page_size: usize) -> ProbeSpec {
        let mode = match self.mode {
            ProbeModeArg::Full => ProbeMode::Full {
                max_items: self.max_items.unwrap_or(u64::MAX),
            },
            ProbeModeArg::Paginate => ProbeMode::Paginate { page_size },
            ProbeModeArg::Prefix => ProbeMode::Prefix { prefix: self.prefix },
            ProbeModeArg::Delimiter => ProbeMode::Delimiter { delimiter: self.delimiter },
        };
        ProbeSpec {
            bucket: self.bucket,
            mode,
            expect: self.expect,
            expect_pages: self.expect_pages,
        }
    }
}

fn main() -> Result<()> {
    // .env must be loaded before clap reads the LISTBENCH_* variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // -v: info for list-bench, -vv: debug (SDK info), -vvv: trace (SDK debug)
    let (bench_level, sdk_level) = match cli.verbose {
        0 => ("warn", "warn"),
        1 => ("info", "warn"),
        2 => ("debug", "info"),
        _ => ("trace", "debug"),
    };

    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "list_bench={},aws_sdk_s3={},aws_config={},aws_smithy_runtime={}",
            bench_level, sdk_level, sdk_level, sdk_level
        ))
    });
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let rt = RtBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    rt.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { tier_args, skip_seed } => {
            let config = BenchConfig::resolve(&cli.config, &tier_args)?;
            run_cmd(config, skip_seed).await
        }
        Commands::Seed { tier_args } => {
            let config = BenchConfig::resolve(&cli.config, &tier_args)?;
            seed_cmd(config).await
        }
        Commands::Bench { pattern, tier_args } => {
            let config = BenchConfig::resolve(&cli.config, &tier_args)?;
            bench_cmd(config, pattern).await
        }
        Commands::Report => {
            let config = BenchConfig::resolve(&cli.config, &[])?;
            let results = ResultsDir::existing(&config.results_dir)?;
            let path = write_report(&results)?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Compare { baseline, candidate } => {
            let comparison = compare::compare(&ResultsDir::existing(&baseline)?, &ResultsDir::existing(&candidate)?)?;
            print!("{}", compare::render(&comparison));
            Ok(())
        }
        Commands::Cleanup { keep_results } => {
            let config = BenchConfig::resolve(&cli.config, &[])?;
            cleanup_cmd(config, keep_results).await
        }
        Commands::Probe(args) => {
            let config = BenchConfig::resolve(&cli.config, &[])?;
            let spec = args.into_spec(config.page_size);
            probe_cmd(config, spec).await
        }
    }
}

/// Connect to the store and build the runner, then validate both
async fn connect(config: &BenchConfig, need_runner: bool) -> Result<(Arc<dyn ObjectStore>, Arc<dyn TimingRunner>)> {
    info!("Connecting to {}", config.endpoint);
    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::connect(config).await?);
    let runner: Arc<dyn TimingRunner> = Arc::new(HyperfineRunner::new(&config.hyperfine));
    let summary = run_preflight(config, store.as_ref(), runner.as_ref(), need_runner).await?;
    for result in &summary.results {
        info!("{} [{}] {}", result.icon(), result.test_phase, result.message);
    }
    Ok((store, runner))
}

async fn seed_with(store: Arc<dyn ObjectStore>, config: &BenchConfig) -> Result<()> {
    let summary = Seeder::new(store, config.clone()).with_progress(true).seed_all().await?;
    for c in &summary.containers {
        println!(
            "{:<32} existing {:>8}  written {:>8}  failed {:>6}  count {:>8}  {:?}",
            c.bucket, c.existing, c.written, c.failed, c.final_count, c.status
        );
    }
    Ok(())
}

async fn seed_cmd(config: BenchConfig) -> Result<()> {
    let (store, _) = connect(&config, false).await?;
    seed_with(store, &config).await
}

async fn run_cmd(config: BenchConfig, skip_seed: bool) -> Result<()> {
    let t0 = Instant::now();
    let (store, runner) = connect(&config, true).await?;

    let results = ResultsDir::create(&config.results_dir)?;
    let mut metadata = RunMetadata::new(&config);
    results.write_metadata(&metadata)?;

    if skip_seed {
        info!("Skipping seeding (--skip-seed)");
    } else {
        seed_with(store.clone(), &config).await?;
    }

    let driver = Driver::new(store, runner, config.clone(), ProbeCommand::current_exe()?);
    let mut failed = Vec::new();
    for pattern in Pattern::ALL {
        if let Err(e) = driver.run(pattern, &results).await {
            error!("{} benchmark failed: {:#}", pattern, e);
            failed.push(pattern.slug());
        }
    }

    metadata.finalize(t0.elapsed().as_secs_f64());
    results.write_metadata(&metadata)?;
    let report = write_report(&results)?;
    println!("Report: {}", report.display());

    if !failed.is_empty() {
        bail!("{} of {} benchmarks failed: {}", failed.len(), Pattern::ALL.len(), failed.join(", "));
    }
    Ok(())
}

async fn bench_cmd(config: BenchConfig, pattern: Pattern) -> Result<()> {
    let t0 = Instant::now();
    let (store, runner) = connect(&config, true).await?;
    let results = ResultsDir::create(&config.results_dir)?;

    // Keep the metadata of an earlier full run; start one otherwise
    let mut metadata = match results.read_metadata()? {
        Some(existing) => existing,
        None => RunMetadata::new(&config),
    };

    let driver = Driver::new(store, runner, config.clone(), ProbeCommand::current_exe()?);
    let outcome = driver.run(pattern, &results).await?;
    println!("{}: {} trials, {} skipped", pattern, outcome.trials.len(), outcome.skipped.len());

    if metadata.duration_secs.is_none() {
        metadata.finalize(t0.elapsed().as_secs_f64());
    }
    results.write_metadata(&metadata)?;
    write_report(&results)?;
    Ok(())
}

async fn cleanup_cmd(config: BenchConfig, keep_results: bool) -> Result<()> {
    let (store, _) = connect(&config, false).await?;
    let summary = cleanup(store.as_ref(), &config.bucket_prefix, &config.results_dir, keep_results).await?;
    println!(
        "Removed {} containers ({} objects){}",
        summary.buckets_removed.len(),
        summary.objects_deleted,
        if summary.results_removed { ", results directory deleted" } else { "" }
    );
    if !summary.failures.is_empty() {
        for (bucket, reason) in &summary.failures {
            warn!("{}: {}", bucket, reason);
        }
        bail!("{} containers could not be removed", summary.failures.len());
    }
    Ok(())
}

async fn probe_cmd(config: BenchConfig, spec: ProbeSpec) -> Result<()> {
    let store = S3Store::connect(&config).await?;
    let outcome = spec.execute(&store).await?;
    println!(
        "{} mode={} objects={} prefixes={} pages={}",
        spec.bucket,
        spec.mode_name(),
        outcome.objects,
        outcome.common_prefixes,
        outcome.pages
    );
    Ok(())
}

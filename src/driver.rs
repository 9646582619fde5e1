//! Benchmark driver
//!
//! For one access pattern the driver:
//! 1. builds the candidate trial matrix (layout x tier, pattern specific)
//! 2. drops trials whose container is missing, does not hold exactly
//!    `tier` objects, or (prefix pattern) is partitioned differently from
//!    the configuration, logging each one
//! 3. hands the remaining trials to the timing runner in a single batch
//!
//! Each trial command is a `list-bench probe` invocation, so the runner
//! times one complete logical listing, including the whole manual
//! pagination loop for the paginated pattern.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::constants::DEFAULT_DELIMITER;
use crate::layout::{container_name, partition_counts, partition_prefix, populated_partitions, Layout};
use crate::listing::{
    expected_pages, list_all, list_delimited, list_prefix, paginate, survey_container, ContainerSurvey, ListOutcome,
};
use crate::pattern::Pattern;
use crate::results_dir::ResultsDir;
use crate::runner::{shell_quote, HyperfineExport, TimingRunner, Trial, TrialBatch};
use crate::store::ObjectStore;

/// What a probe invocation does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeMode {
    Full { max_items: u64 },
    Paginate { page_size: usize },
    Prefix { prefix: String },
    Delimiter { delimiter: String },
}

/// A probe invocation plus the counts it must observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub bucket: String,
    pub mode: ProbeMode,
    pub expect: Option<u64>,
    pub expect_pages: Option<u64>,
}

/// Renders probe specs into shell commands for the timing runner
#[derive(Debug, Clone)]
pub struct ProbeCommand {
    exe: PathBuf,
}

impl ProbeCommand {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    /// Probe through the currently running binary
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to resolve the list-bench executable path")?;
        Ok(Self::new(exe))
    }

    pub fn render(&self, spec: &ProbeSpec) -> String {
        let mut words = vec![
            self.exe.display().to_string(),
            "probe".to_string(),
            "--bucket".to_string(),
            spec.bucket.clone(),
        ];
        words.extend(["--mode".into(), spec.mode_name().into()]);
        match &spec.mode {
            ProbeMode::Full { max_items } => words.extend(["--max-items".into(), max_items.to_string()]),
            ProbeMode::Paginate { page_size } => words.extend(["--page-size".into(), page_size.to_string()]),
            ProbeMode::Prefix { prefix } => words.extend(["--prefix".into(), prefix.clone()]),
            ProbeMode::Delimiter { delimiter } => words.extend(["--delimiter".into(), delimiter.clone()]),
        }
        if let Some(expect) = spec.expect {
            words.extend(["--expect".into(), expect.to_string()]);
        }
        if let Some(pages) = spec.expect_pages {
            words.extend(["--expect-pages".into(), pages.to_string()]);
        }
        words.iter().map(|w| shell_quote(w)).collect::<Vec<_>>().join(" ")
    }
}

impl ProbeSpec {
    /// Perform the listing once and check the observed counts.
    ///
    /// Objects are compared against `expect`, except in delimiter mode where
    /// the common prefixes are and no leaf object may appear. A mismatch is
    /// an error so that the timing runner sees a failing command.
    pub async fn execute(&self, store: &dyn ObjectStore) -> Result<ListOutcome> {
        let outcome = match &self.mode {
            ProbeMode::Full { max_items } => list_all(store, &self.bucket, *max_items).await?,
            ProbeMode::Paginate { page_size } => paginate(store, &self.bucket, *page_size).await?,
            ProbeMode::Prefix { prefix } => list_prefix(store, &self.bucket, prefix).await?,
            ProbeMode::Delimiter { delimiter } => list_delimited(store, &self.bucket, delimiter).await?,
        };

        let observed = match self.mode {
            ProbeMode::Delimiter { .. } => {
                if outcome.objects != 0 {
                    bail!("{}: expected no leaf objects at the top level, listed {}", self.bucket, outcome.objects);
                }
                outcome.common_prefixes
            }
            _ => outcome.objects,
        };
        if let Some(expect) = self.expect {
            if observed != expect {
                bail!("{}: expected {} entries, listed {}", self.bucket, expect, observed);
            }
        }
        if let Some(pages) = self.expect_pages {
            if outcome.pages != pages {
                bail!("{}: expected {} pages, issued {} requests", self.bucket, pages, outcome.pages);
            }
        }
        Ok(outcome)
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            ProbeMode::Full { .. } => "full",
            ProbeMode::Paginate { .. } => "paginate",
            ProbeMode::Prefix { .. } => "prefix",
            ProbeMode::Delimiter { .. } => "delimiter",
        }
    }
}

/// A trial before its container has been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub layout: Layout,
    pub tier: u64,
    pub probe: ProbeSpec,
}

/// Build every candidate trial of a pattern from configuration alone
pub fn candidate_trials(pattern: Pattern, config: &BenchConfig) -> Vec<Candidate> {
    let mut out = Vec::new();
    for &tier in &config.tiers {
        match pattern {
            Pattern::FullList => {
                for layout in Layout::ALL {
                    let bucket = container_name(&config.bucket_prefix, layout, tier);
                    out.push(Candidate {
                        name: format!("full-list-{}-{}", layout, tier),
                        layout,
                        tier,
                        probe: ProbeSpec {
                            bucket,
                            mode: ProbeMode::Full { max_items: tier },
                            expect: Some(tier),
                            expect_pages: None,
                        },
                    });
                }
            }
            Pattern::Paginated => {
                if tier <= config.page_size as u64 {
                    continue;
                }
                let pages = expected_pages(tier, config.page_size);
                for layout in Layout::ALL {
                    let bucket = container_name(&config.bucket_prefix, layout, tier);
                    out.push(Candidate {
                        name: format!("paginated-{}-{}-{}pages", layout, tier, pages),
                        layout,
                        tier,
                        probe: ProbeSpec {
                            bucket,
                            mode: ProbeMode::Paginate { page_size: config.page_size },
                            expect: Some(tier),
                            expect_pages: Some(pages),
                        },
                    });
                }
            }
            Pattern::Prefix => {
                let layout = Layout::Nested;
                let bucket = container_name(&config.bucket_prefix, layout, tier);
                let first = partition_counts(tier, config.partitions).first().copied().unwrap_or(0);
                out.push(Candidate {
                    name: format!("prefix-filter-{}-{}", layout, tier),
                    layout,
                    tier,
                    probe: ProbeSpec {
                        bucket: bucket.clone(),
                        mode: ProbeMode::Prefix { prefix: partition_prefix(0) },
                        expect: Some(first),
                        expect_pages: None,
                    },
                });
                out.push(Candidate {
                    name: format!("delimiter-{}-{}", layout, tier),
                    layout,
                    tier,
                    probe: ProbeSpec {
                        bucket,
                        mode: ProbeMode::Delimiter { delimiter: DEFAULT_DELIMITER.to_string() },
                        expect: Some(populated_partitions(tier, config.partitions) as u64),
                        expect_pages: None,
                    },
                });
            }
        }
    }
    out
}

/// A trial removed from the matrix, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTrial {
    pub name: String,
    pub bucket: String,
    pub reason: String,
}

/// Eligible and skipped trials of one pattern
#[derive(Debug, Clone, Default)]
pub struct PhasePlan {
    pub trials: Vec<Trial>,
    pub skipped: Vec<SkippedTrial>,
}

/// Result of running one pattern
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub pattern: Pattern,
    pub trials: Vec<Trial>,
    pub skipped: Vec<SkippedTrial>,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ContainerState {
    Missing,
    Surveyed(ContainerSurvey),
    Unreadable(String),
}

/// Why a correctly sized container still cannot satisfy a prefix-pattern
/// probe, judged from its survey
fn layout_mismatch(probe: &ProbeSpec, survey: &ContainerSurvey) -> Option<String> {
    let expect = probe.expect?;
    match &probe.mode {
        ProbeMode::Prefix { prefix } => {
            let held = survey.prefix_counts.get(prefix).copied().unwrap_or(0);
            (held != expect).then(|| {
                format!(
                    "layout mismatch: {} holds {} objects, expected {} (seeded with a different partition count?)",
                    prefix, held, expect
                )
            })
        }
        ProbeMode::Delimiter { .. } => {
            if survey.top_level_objects != 0 {
                Some(format!("layout mismatch: {} objects outside any partition", survey.top_level_objects))
            } else if survey.prefix_counts.len() as u64 != expect {
                Some(format!(
                    "layout mismatch: {} partitions, expected {} (seeded with a different partition count?)",
                    survey.prefix_counts.len(),
                    expect
                ))
            } else {
                None
            }
        }
        _ => None,
    }
}

pub struct Driver {
    store: Arc<dyn ObjectStore>,
    runner: Arc<dyn TimingRunner>,
    config: BenchConfig,
    probe: ProbeCommand,
    /// Per-bucket state, shared by the phases of one run
    containers: Mutex<HashMap<String, ContainerState>>,
}

impl Driver {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        runner: Arc<dyn TimingRunner>,
        config: BenchConfig,
        probe: ProbeCommand,
    ) -> Self {
        Self {
            store,
            runner,
            config,
            probe,
            containers: Mutex::new(HashMap::new()),
        }
    }

    async fn container_state(&self, bucket: &str) -> ContainerState {
        let cached = self.containers.lock().get(bucket).cloned();
        if let Some(state) = cached {
            return state;
        }

        let state = match self.store.bucket_exists(bucket).await {
            Ok(false) => ContainerState::Missing,
            Ok(true) => match survey_container(self.store.as_ref(), bucket, DEFAULT_DELIMITER).await {
                Ok(survey) => ContainerState::Surveyed(survey),
                Err(e) => ContainerState::Unreadable(format!("{:#}", e)),
            },
            Err(e) => ContainerState::Unreadable(format!("{:#}", e)),
        };
        self.containers.lock().insert(bucket.to_string(), state.clone());
        state
    }

    /// Check every candidate's container and split the matrix
    pub async fn plan(&self, pattern: Pattern) -> Result<PhasePlan> {
        let mut plan = PhasePlan::default();

        for candidate in candidate_trials(pattern, &self.config) {
            let bucket = candidate.probe.bucket.clone();
            let reason = match self.container_state(&bucket).await {
                ContainerState::Surveyed(survey) if survey.objects == candidate.tier => {
                    layout_mismatch(&candidate.probe, &survey)
                }
                ContainerState::Surveyed(survey) if survey.objects < candidate.tier => Some(format!(
                    "under-populated: holds {} of {} objects",
                    survey.objects, candidate.tier
                )),
                ContainerState::Surveyed(survey) => Some(format!(
                    "holds {} objects, expected exactly {}",
                    survey.objects, candidate.tier
                )),
                ContainerState::Missing => Some("container does not exist".to_string()),
                ContainerState::Unreadable(err) => Some(format!("container could not be counted: {}", err)),
            };

            match reason {
                None => plan.trials.push(Trial {
                    name: candidate.name,
                    command: self.probe.render(&candidate.probe),
                    bucket,
                }),
                Some(reason) => {
                    warn!("Skipping trial {} ({}): {}", candidate.name, bucket, reason);
                    plan.skipped.push(SkippedTrial {
                        name: candidate.name,
                        bucket,
                        reason,
                    });
                }
            }
        }

        Ok(plan)
    }

    /// Plan, run and persist one pattern.
    ///
    /// Fails when no trial is eligible: a phase without measurements has
    /// nothing to report.
    pub async fn run(&self, pattern: Pattern, results: &ResultsDir) -> Result<PhaseOutcome> {
        info!("=== {} ===", pattern.title());
        results.clear_pattern(pattern)?;

        let plan = self.plan(pattern).await?;
        let skipped_json = serde_json::to_string_pretty(&plan.skipped).context("Failed to serialize skipped trials")?;
        fs::write(results.skipped_path(pattern), skipped_json)
            .with_context(|| format!("Failed to write {}", results.skipped_path(pattern).display()))?;

        if plan.trials.is_empty() {
            bail!(
                "No eligible work for the {} benchmark ({} candidate trials skipped)",
                pattern,
                plan.skipped.len()
            );
        }

        info!("{}: {} trials, {} skipped", pattern, plan.trials.len(), plan.skipped.len());

        let json_path = results.json_path(pattern);
        let markdown_path = results.markdown_path(pattern);
        let batch = TrialBatch {
            trials: &plan.trials,
            runs: self.config.runs,
            warmup: self.config.warmup,
            json_out: json_path.clone(),
            markdown_out: markdown_path.clone(),
            env: self.config.child_env(),
        };
        self.runner
            .run(&batch)
            .await
            .with_context(|| format!("{} failed for the {} benchmark", self.runner.name(), pattern))?;

        match HyperfineExport::load(&json_path) {
            Ok(export) => {
                for result in &export.results {
                    info!("  {:<40} mean {:>10.3} ms", result.command, result.mean * 1000.0);
                }
            }
            Err(e) => warn!("Could not summarize {}: {:#}", json_path.display(), e),
        }

        Ok(PhaseOutcome {
            pattern,
            trials: plan.trials,
            skipped: plan.skipped,
            json_path,
            markdown_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tiers: &[u64], partitions: usize, page_size: usize) -> BenchConfig {
        BenchConfig {
            tiers: tiers.to_vec(),
            partitions,
            page_size,
            ..BenchConfig::default()
        }
    }

    #[test]
    fn test_full_list_candidates_cover_matrix() {
        let names: Vec<_> = candidate_trials(Pattern::FullList, &config(&[100, 1000], 10, 50))
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(
            names,
            vec!["full-list-flat-100", "full-list-nested-100", "full-list-flat-1000", "full-list-nested-1000"]
        );
    }

    #[test]
    fn test_paginated_only_above_page_size() {
        let candidates = candidate_trials(Pattern::Paginated, &config(&[100, 1000, 2500], 10, 1000));
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["paginated-flat-2500-3pages", "paginated-nested-2500-3pages"]);
        assert_eq!(candidates[0].probe.expect_pages, Some(3));
        assert_eq!(candidates[0].probe.expect, Some(2500));
    }

    #[test]
    fn test_prefix_candidates_expectations() {
        let candidates = candidate_trials(Pattern::Prefix, &config(&[105], 10, 1000));
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "prefix-filter-nested-105");
        assert_eq!(candidates[0].probe.mode, ProbeMode::Prefix { prefix: "prefix-000/".into() });
        assert_eq!(candidates[0].probe.expect, Some(11));
        assert_eq!(candidates[1].name, "delimiter-nested-105");
        assert_eq!(candidates[1].probe.expect, Some(10));
        assert!(candidates.iter().all(|c| c.layout == Layout::Nested));
    }

    #[test]
    fn test_layout_mismatch_detects_other_partition_count() {
        // 100 objects seeded over 10 partitions, now expected over 20
        let survey = ContainerSurvey {
            objects: 100,
            top_level_objects: 0,
            prefix_counts: (0..10).map(|p| (partition_prefix(p), 10)).collect(),
        };
        let candidates = candidate_trials(Pattern::Prefix, &config(&[100], 20, 1000));
        let reasons: Vec<_> = candidates.iter().map(|c| layout_mismatch(&c.probe, &survey)).collect();
        assert!(reasons[0].as_deref().unwrap().contains("prefix-000/ holds 10 objects, expected 5"));
        assert!(reasons[1].as_deref().unwrap().contains("10 partitions, expected 20"));

        let matching = candidate_trials(Pattern::Prefix, &config(&[100], 10, 1000));
        assert!(matching.iter().all(|c| layout_mismatch(&c.probe, &survey).is_none()));

        let full = candidate_trials(Pattern::FullList, &config(&[100], 20, 1000));
        assert!(full.iter().all(|c| layout_mismatch(&c.probe, &survey).is_none()));
    }

    #[test]
    fn test_probe_render() {
        let probe = ProbeCommand::new("/opt/list bench/list-bench");
        let cmd = probe.render(&ProbeSpec {
            bucket: "listbench-flat-5000".into(),
            mode: ProbeMode::Paginate { page_size: 1000 },
            expect: Some(5000),
            expect_pages: Some(5),
        });
        assert_eq!(
            cmd,
            "'/opt/list bench/list-bench' probe --bucket listbench-flat-5000 --mode paginate --page-size 1000 --expect 5000 --expect-pages 5"
        );
    }

    #[test]
    fn test_probe_render_never_contains_credentials() {
        let cfg = BenchConfig::default();
        let probe = ProbeCommand::new("list-bench");
        for pattern in Pattern::ALL {
            for candidate in candidate_trials(pattern, &cfg) {
                let cmd = probe.render(&candidate.probe);
                assert!(!cmd.contains(&cfg.credentials.secret_key), "{}", cmd);
            }
        }
    }
}

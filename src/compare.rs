//! Cross-run comparison
//!
//! Trial names are stable across runs, so two results directories can be
//! joined by name. Only the mean is compared; raw samples stay in the JSON.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::pattern::Pattern;
use crate::results_dir::ResultsDir;
use crate::runner::HyperfineExport;

/// One trial present in both runs
#[derive(Debug, Clone, PartialEq)]
pub struct TrialDelta {
    pub name: String,
    pub pattern: Pattern,
    pub baseline_mean: f64,
    pub candidate_mean: f64,
}

impl TrialDelta {
    /// Relative change of the candidate against the baseline; negative is faster
    pub fn relative_change(&self) -> Option<f64> {
        (self.baseline_mean > 0.0).then(|| (self.candidate_mean - self.baseline_mean) / self.baseline_mean)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Comparison {
    pub matched: Vec<TrialDelta>,
    pub baseline_only: Vec<String>,
    pub candidate_only: Vec<String>,
}

/// Trial name -> (pattern, mean) for every export found in `results`
fn load_means(results: &ResultsDir) -> BTreeMap<String, (Pattern, f64)> {
    let mut means = BTreeMap::new();
    for pattern in Pattern::ALL {
        let path = results.json_path(pattern);
        if !path.exists() {
            debug!("{} has no {} export", results.path().display(), pattern);
            continue;
        }
        match HyperfineExport::load(&path) {
            Ok(export) => {
                for result in export.results {
                    means.insert(result.command, (pattern, result.mean));
                }
            }
            Err(e) => warn!("Skipping unreadable export: {:#}", e),
        }
    }
    means
}

pub fn compare(baseline: &ResultsDir, candidate: &ResultsDir) -> Result<Comparison> {
    let base = load_means(baseline);
    let mut cand = load_means(candidate);
    if base.is_empty() && cand.is_empty() {
        bail!(
            "Neither {} nor {} contains benchmark results",
            baseline.path().display(),
            candidate.path().display()
        );
    }

    let mut comparison = Comparison::default();
    for (name, (pattern, baseline_mean)) in base {
        match cand.remove(&name) {
            Some((_, candidate_mean)) => comparison.matched.push(TrialDelta {
                name,
                pattern,
                baseline_mean,
                candidate_mean,
            }),
            None => comparison.baseline_only.push(name),
        }
    }
    comparison.candidate_only = cand.into_keys().collect();
    comparison
        .matched
        .sort_by(|a, b| (a.pattern as u8, &a.name).cmp(&(b.pattern as u8, &b.name)));
    Ok(comparison)
}

fn format_ms(secs: f64) -> String {
    format!("{:.2} ms", secs * 1000.0)
}

/// Plain-text table for the terminal
pub fn render(comparison: &Comparison) -> String {
    let width = comparison
        .matched
        .iter()
        .map(|d| d.name.len())
        .max()
        .unwrap_or(5)
        .max(5);

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:>12}  {:>12}  {:>8}", "Trial", "Baseline", "Candidate", "Change");
    for delta in &comparison.matched {
        let change = delta
            .relative_change()
            .map(|c| format!("{:+.1}%", c * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "{:<width$}  {:>12}  {:>12}  {:>8}",
            delta.name,
            format_ms(delta.baseline_mean),
            format_ms(delta.candidate_mean),
            change
        );
    }
    if !comparison.baseline_only.is_empty() {
        let _ = writeln!(out, "\nOnly in baseline:");
        for name in &comparison.baseline_only {
            let _ = writeln!(out, "  {}", name);
        }
    }
    if !comparison.candidate_only.is_empty() {
        let _ = writeln!(out, "\nOnly in candidate:");
        for name in &comparison.candidate_only {
            let _ = writeln!(out, "  {}", name);
        }
    }
    out
}

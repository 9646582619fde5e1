//! Combined report
//!
//! Pure text composition over artifacts already in the results directory.
//! A missing pattern artifact becomes a placeholder, never an error.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::driver::SkippedTrial;
use crate::pattern::Pattern;
use crate::results_dir::{ResultsDir, RunMetadata};

/// Render the report for `results`, using `metadata` for the run header
pub fn render(results: &ResultsDir, metadata: Option<&RunMetadata>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# ListObjectsV2 Benchmark Report");
    let _ = writeln!(out);

    render_metadata(&mut out, metadata);

    for pattern in Pattern::ALL {
        let _ = writeln!(out, "## {}", pattern.title());
        let _ = writeln!(out);
        render_pattern(&mut out, results, pattern);
    }

    render_comparison_guide(&mut out, results);
    out
}

fn render_metadata(out: &mut String, metadata: Option<&RunMetadata>) {
    let _ = writeln!(out, "## Run");
    let _ = writeln!(out);
    let Some(m) = metadata else {
        let _ = writeln!(out, "_No run metadata recorded._");
        let _ = writeln!(out);
        return;
    };

    let tiers = m.tiers.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" ");
    let elapsed = m
        .duration_secs
        .map(format_elapsed)
        .unwrap_or_else(|| "in progress".to_string());

    let rows: [(&str, String); 13] = [
        ("Timestamp", m.start_time.clone()),
        ("Finished", m.end_time.clone().unwrap_or_else(|| "-".to_string())),
        ("Label", m.label.clone()),
        ("Revision", m.revision.clone()),
        ("Branch", m.branch.clone()),
        ("Endpoint", m.endpoint.clone()),
        ("Tiers", tiers),
        ("Nested partitions", m.partitions.to_string()),
        ("Page size", m.page_size.to_string()),
        ("Runs / warmup", format!("{} / {}", m.runs, m.warmup)),
        ("Seed strategy", m.seed_strategy.clone()),
        ("Host", m.hostname.clone()),
        ("Elapsed", elapsed),
    ];

    let _ = writeln!(out, "| | |");
    let _ = writeln!(out, "|---|---|");
    for (key, value) in rows {
        let _ = writeln!(out, "| {} | `{}` |", key, value);
    }
    let _ = writeln!(out);
}

fn render_pattern(out: &mut String, results: &ResultsDir, pattern: Pattern) {
    let table = results.markdown_path(pattern);
    match fs::read_to_string(&table) {
        Ok(text) if !text.trim().is_empty() => {
            let _ = writeln!(out, "{}", text.trim_end());
        }
        _ => {
            let _ = writeln!(
                out,
                "_No results: `{}` was not produced by this run._",
                table.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default()
            );
        }
    }
    let _ = writeln!(out);

    let skipped = read_skipped(results, pattern);
    if !skipped.is_empty() {
        let _ = writeln!(out, "Skipped trials:");
        let _ = writeln!(out);
        for s in skipped {
            let _ = writeln!(out, "- `{}` ({}): {}", s.name, s.bucket, s.reason);
        }
        let _ = writeln!(out);
    }
}

fn read_skipped(results: &ResultsDir, pattern: Pattern) -> Vec<SkippedTrial> {
    let path = results.skipped_path(pattern);
    let Ok(data) = fs::read_to_string(&path) else {
        return Vec::new();
    };
    match serde_json::from_str(&data) {
        Ok(skipped) => skipped,
        Err(e) => {
            warn!("Ignoring unreadable {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn render_comparison_guide(out: &mut String, results: &ResultsDir) {
    let _ = writeln!(out, "## Comparing runs");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Trial names are stable across runs. To compare two builds or servers, run the suite once per \
         target with a different results directory, then compare the two directories by trial name:"
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "```sh");
    let _ = writeln!(out, "LISTBENCH_RESULTS_DIR=results-baseline list-bench run --skip-seed");
    let _ = writeln!(out, "LISTBENCH_RESULTS_DIR=results-candidate list-bench run --skip-seed");
    let _ = writeln!(out, "list-bench compare results-baseline results-candidate");
    let _ = writeln!(out, "```");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Raw per-run samples for every trial are in the `*.json` files of `{}`.",
        results.path().display()
    );
}

fn format_elapsed(secs: f64) -> String {
    let total = secs.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Regenerate `REPORT.md` from the directory's artifacts
pub fn write_report(results: &ResultsDir) -> Result<PathBuf> {
    let metadata = results.read_metadata()?;
    let text = render(results, metadata.as_ref());
    let path = results.report_path();
    fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(path)
}

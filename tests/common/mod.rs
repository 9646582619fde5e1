// tests/common/mod.rs
//
// Shared fixtures: an in-memory store, a small config and a timing runner
// double that records batches and writes hyperfine-shaped artifacts.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use list_bench::config::BenchConfig;
use list_bench::runner::{TimingRunner, TrialBatch};
use list_bench::store::{MemoryStore, ObjectStore};

pub fn small_config(tiers: &[u64], partitions: usize, page_size: usize, staging: &Path) -> BenchConfig {
    BenchConfig {
        tiers: tiers.to_vec(),
        partitions,
        page_size,
        seed_parallelism: 8,
        staging_dir: staging.to_path_buf(),
        ..BenchConfig::default()
    }
}

pub fn memory_store() -> (Arc<MemoryStore>, Arc<dyn ObjectStore>) {
    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn ObjectStore> = memory.clone();
    (memory, store)
}

/// What the driver handed to the runner
#[derive(Debug, Clone)]
pub struct RecordedBatch {
    pub names: Vec<String>,
    pub commands: Vec<String>,
    pub runs: u32,
    pub warmup: u32,
    pub env: Vec<(String, String)>,
}

#[derive(Default)]
pub struct RecordingRunner {
    pub batches: Mutex<Vec<RecordedBatch>>,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<RecordedBatch> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl TimingRunner for RecordingRunner {
    fn name(&self) -> &str {
        "recording"
    }

    async fn check_available(&self) -> Result<String> {
        Ok("recording 1.0".to_string())
    }

    async fn run(&self, batch: &TrialBatch<'_>) -> Result<()> {
        let results: Vec<_> = batch
            .trials
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mean = 0.010 * (i + 1) as f64;
                serde_json::json!({
                    "command": t.name,
                    "mean": mean,
                    "stddev": 0.001,
                    "median": mean,
                    "min": mean,
                    "max": mean,
                    "times": vec![mean; batch.runs as usize],
                })
            })
            .collect();
        std::fs::write(&batch.json_out, serde_json::json!({ "results": results }).to_string())?;

        let mut md = String::from("| Command | Mean [ms] |\n|:---|---:|\n");
        for (i, t) in batch.trials.iter().enumerate() {
            md.push_str(&format!("| `{}` | {:.1} |\n", t.name, 10.0 * (i + 1) as f64));
        }
        std::fs::write(&batch.markdown_out, md)?;

        self.batches.lock().push(RecordedBatch {
            names: batch.trials.iter().map(|t| t.name.clone()).collect(),
            commands: batch.trials.iter().map(|t| t.command.clone()).collect(),
            runs: batch.runs,
            warmup: batch.warmup,
            env: batch.env.clone(),
        });
        Ok(())
    }
}

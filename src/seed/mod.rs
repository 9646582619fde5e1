//! Corpus seeding: make every (layout, tier) container hold its objects
//!
//! For each container the seeder:
//! - creates the bucket if absent
//! - lists existing keys (a full paginated walk)
//! - skips the container when it already holds at least `tier` objects
//! - otherwise writes only the missing keys with the configured strategy
//! - recounts, and flags the container as short if writes were lost
//!
//! Individual write failures are never retried here. The recount is the
//! only verification; a short container is skipped later by the driver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{BenchConfig, SeedStrategy};
use crate::constants::PAYLOAD_SIZE;
use crate::layout::{container_name, generate_keys, Layout};
use crate::listing::{count_objects, existing_keys};
use crate::store::ObjectStore;

mod direct;
mod staged;

pub use direct::write_keys;
pub use staged::stage_and_sync;

/// Outcome of writing a batch of keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub written: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStatus {
    /// Nothing written, the container already held enough objects
    AlreadyPopulated,
    /// Missing objects written and the recount reached the tier
    Seeded,
    /// The recount is still below the tier
    Short,
}

/// Per-container seeding record
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSeed {
    pub bucket: String,
    pub layout: Layout,
    pub tier: u64,
    pub existing: u64,
    pub written: u64,
    pub failed: u64,
    pub final_count: u64,
    pub status: SeedStatus,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedSummary {
    pub containers: Vec<ContainerSeed>,
    pub wall_seconds: f64,
}

impl SeedSummary {
    pub fn total_written(&self) -> u64 {
        self.containers.iter().map(|c| c.written).sum()
    }

    pub fn short_containers(&self) -> Vec<&ContainerSeed> {
        self.containers.iter().filter(|c| c.status == SeedStatus::Short).collect()
    }
}

/// Fixed payload shared by every generated object
pub fn random_payload(size: usize) -> Bytes {
    let mut buf = vec![0u8; size];
    rand::rng().fill(&mut buf[..]);
    Bytes::from(buf)
}

pub struct Seeder {
    store: Arc<dyn ObjectStore>,
    config: BenchConfig,
    payload: Bytes,
    show_progress: bool,
}

impl Seeder {
    pub fn new(store: Arc<dyn ObjectStore>, config: BenchConfig) -> Self {
        Self {
            store,
            config,
            payload: random_payload(PAYLOAD_SIZE),
            show_progress: false,
        }
    }

    /// Draw an indicatif progress bar while writing
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Seed every layout at every configured tier, smallest tier first
    pub async fn seed_all(&self) -> Result<SeedSummary> {
        let t0 = Instant::now();
        let mut summary = SeedSummary::default();

        info!(
            "Seeding {} containers (tiers: {}, partitions: {}, strategy: {})",
            self.config.tiers.len() * Layout::ALL.len(),
            self.config.tiers_display(),
            self.config.partitions,
            self.config.seed_strategy
        );

        for &tier in &self.config.tiers {
            for layout in Layout::ALL {
                summary.containers.push(self.seed_container(layout, tier).await?);
            }
        }

        summary.wall_seconds = t0.elapsed().as_secs_f64();
        let short = summary.short_containers();
        if short.is_empty() {
            info!("Seeding complete: {} objects written in {:.1}s", summary.total_written(), summary.wall_seconds);
        } else {
            warn!(
                "Seeding finished with {} short container(s); their trials will be skipped: {}",
                short.len(),
                short.iter().map(|c| c.bucket.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
        Ok(summary)
    }

    /// Ensure one container holds `tier` objects of `layout`
    pub async fn seed_container(&self, layout: Layout, tier: u64) -> Result<ContainerSeed> {
        let t0 = Instant::now();
        let bucket = container_name(&self.config.bucket_prefix, layout, tier);

        self.store
            .create_bucket(&bucket)
            .await
            .with_context(|| format!("Failed to create bucket {}", bucket))?;

        let existing = existing_keys(self.store.as_ref(), &bucket)
            .await
            .with_context(|| format!("Failed to list existing objects in {}", bucket))?;
        let existing_count = existing.len() as u64;

        if existing_count >= tier {
            info!("  {} already holds {} objects (need {}), skipping", bucket, existing_count, tier);
            return Ok(ContainerSeed {
                bucket,
                layout,
                tier,
                existing: existing_count,
                written: 0,
                failed: 0,
                final_count: existing_count,
                status: SeedStatus::AlreadyPopulated,
                elapsed_secs: t0.elapsed().as_secs_f64(),
            });
        }

        let missing: Vec<String> = generate_keys(layout, tier, self.config.partitions)
            .into_iter()
            .filter(|k| !existing.contains(k))
            .collect();
        info!(
            "  {}: {} existing, writing {} missing objects ({})",
            bucket,
            existing_count,
            missing.len(),
            self.config.seed_strategy
        );

        let pb = self.progress_bar(&bucket, missing.len() as u64)?;
        let outcome = match self.config.seed_strategy {
            SeedStrategy::Direct => {
                write_keys(
                    self.store.clone(),
                    &bucket,
                    missing,
                    self.payload.clone(),
                    self.config.seed_parallelism,
                    &pb,
                )
                .await?
            }
            SeedStrategy::Staged => {
                stage_and_sync(
                    self.store.as_ref(),
                    &bucket,
                    missing,
                    self.payload.clone(),
                    &self.config.staging_dir,
                    self.config.seed_parallelism,
                )
                .await?
            }
        };
        pb.finish_and_clear();

        if outcome.failed > 0 {
            warn!("  {}: {} writes failed (not retried)", bucket, outcome.failed);
        }

        let final_count = count_objects(self.store.as_ref(), &bucket)
            .await
            .with_context(|| format!("Failed to recount {}", bucket))?;
        let status = if final_count >= tier {
            SeedStatus::Seeded
        } else {
            warn!("  {} holds {} of {} objects after seeding", bucket, final_count, tier);
            SeedStatus::Short
        };

        Ok(ContainerSeed {
            bucket,
            layout,
            tier,
            existing: existing_count,
            written: outcome.written,
            failed: outcome.failed,
            final_count,
            status,
            elapsed_secs: t0.elapsed().as_secs_f64(),
        })
    }

    /// Object bar for direct writes; a spinner for staged seeding, whose
    /// uploads happen inside one bulk sync
    fn progress_bar(&self, bucket: &str, len: u64) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        if self.config.seed_strategy == SeedStrategy::Staged {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?);
            pb.set_message(format!("staging and syncing {} objects into {}", len, bucket));
            pb.enable_steady_tick(Duration::from_millis(100));
            return Ok(pb);
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} objects ({eta_precise}) {msg}",
            )?
            .progress_chars("#>-"),
        );
        pb.set_message(format!("seeding {}", bucket));
        Ok(pb)
    }
}

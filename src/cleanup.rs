//! Cleanup of benchmark containers and results
//!
//! Removes every bucket whose name carries the benchmark prefix, emptying it
//! page by page first, and optionally the results directory. Other buckets on
//! the same server are never touched.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::constants::DELETE_BATCH_SIZE;
use crate::store::{ListRequest, ObjectStore};

#[derive(Debug, Clone, Default)]
pub struct CleanupSummary {
    pub buckets_removed: Vec<String>,
    pub objects_deleted: u64,
    /// Buckets that could not be fully removed, with the reason
    pub failures: Vec<(String, String)>,
    pub results_removed: bool,
}

/// Buckets created by this tool for `prefix`
pub fn is_benchmark_bucket(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .map(|rest| rest.starts_with('-'))
        .unwrap_or(false)
}

/// Delete every object of `bucket` in batches, returning how many were deleted
pub async fn empty_bucket(store: &dyn ObjectStore, bucket: &str) -> Result<u64> {
    let mut deleted = 0u64;
    let mut previous_first: Option<String> = None;
    loop {
        // Always list from the start: the previous batch is gone, so no token is needed
        let request = ListRequest::new(bucket).with_max_keys(DELETE_BATCH_SIZE);
        let page = store.list_page(&request).await?;
        let Some(first) = page.keys.first().cloned() else {
            return Ok(deleted);
        };
        if previous_first.as_deref() == Some(first.as_str()) {
            anyhow::bail!("{}: objects remain after DeleteObjects (first key {})", bucket, first);
        }
        previous_first = Some(first);
        store
            .delete_objects(bucket, &page.keys)
            .await
            .with_context(|| format!("DeleteObjects on {}", bucket))?;
        deleted += page.keys.len() as u64;
        debug!("{}: deleted {} objects so far", bucket, deleted);
    }
}

async fn remove_bucket(store: &dyn ObjectStore, bucket: &str) -> Result<u64> {
    let deleted = empty_bucket(store, bucket).await?;
    store
        .delete_bucket(bucket)
        .await
        .with_context(|| format!("DeleteBucket {}", bucket))?;
    Ok(deleted)
}

/// Remove all benchmark containers for `prefix`, and `results_dir` unless kept
pub async fn cleanup(
    store: &dyn ObjectStore,
    prefix: &str,
    results_dir: &Path,
    keep_results: bool,
) -> Result<CleanupSummary> {
    let mut summary = CleanupSummary::default();

    let buckets: Vec<String> = store
        .list_buckets()
        .await
        .context("Failed to list buckets")?
        .into_iter()
        .filter(|b| is_benchmark_bucket(b, prefix))
        .collect();
    info!("Removing {} benchmark containers with prefix '{}-'", buckets.len(), prefix);

    for bucket in buckets {
        match remove_bucket(store, &bucket).await {
            Ok(deleted) => {
                info!("Removed {} ({} objects)", bucket, deleted);
                summary.objects_deleted += deleted;
                summary.buckets_removed.push(bucket);
            }
            Err(e) => {
                warn!("Could not remove {}: {:#}", bucket, e);
                summary.failures.push((bucket, format!("{:#}", e)));
            }
        }
    }

    if !keep_results && results_dir.exists() {
        std::fs::remove_dir_all(results_dir)
            .with_context(|| format!("Failed to remove {}", results_dir.display()))?;
        info!("Removed results directory {}", results_dir.display());
        summary.results_removed = true;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_benchmark_bucket() {
        assert!(is_benchmark_bucket("listbench-flat-1000", "listbench"));
        assert!(!is_benchmark_bucket("listbench", "listbench"));
        assert!(!is_benchmark_bucket("listbenchx-flat-1", "listbench"));
        assert!(!is_benchmark_bucket("photos", "listbench"));
    }
}

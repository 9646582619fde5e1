//! Stage-then-bulk-sync strategy
//!
//! Every missing key becomes a hard link to one payload file inside
//! `{staging_root}/{bucket}/`, so staging a tier costs directory entries,
//! not payload bytes. The tree is then pushed with a single `sync_dir` call
//! and removed, freeing local disk before the next tier is staged.
//!
//! Building and removing the tree runs on the blocking pool; a 100k-key tier
//! is that many `hard_link` calls.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{debug, info, warn};

use super::WriteOutcome;
use crate::constants::STAGING_PAYLOAD_FILE;
use crate::store::ObjectStore;

/// Stage `keys` for `bucket` under `staging_root`, sync, then clean up.
pub async fn stage_and_sync(
    store: &dyn ObjectStore,
    bucket: &str,
    keys: Vec<String>,
    payload: Bytes,
    staging_root: &Path,
    parallelism: usize,
) -> Result<WriteOutcome> {
    if keys.is_empty() {
        return Ok(WriteOutcome::default());
    }

    let staged = keys.len();
    let tree = {
        let bucket = bucket.to_string();
        let root = staging_root.to_path_buf();
        tokio::task::spawn_blocking(move || stage_tree(&bucket, &keys, &payload, &root))
            .await
            .context("Staging task panicked")??
    };
    info!("  staged {} keys under {}", staged, tree.display());

    let synced = store.sync_dir(&tree, bucket, parallelism).await;

    let doomed = tree.clone();
    match tokio::task::spawn_blocking(move || fs::remove_dir_all(&doomed)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to remove staging tree {}: {}", tree.display(), e),
        Err(e) => warn!("Staging cleanup task for {} failed: {}", tree.display(), e),
    }

    let sync = synced.with_context(|| format!("Bulk sync of {} failed", bucket))?;
    Ok(WriteOutcome {
        written: sync.uploaded,
        failed: sync.failed,
    })
}

/// Materialize the staging tree and return its root.
///
/// The payload file lives next to (not inside) the tree so it is never
/// uploaded as an object.
pub(crate) fn stage_tree(bucket: &str, keys: &[String], payload: &Bytes, staging_root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(staging_root)
        .with_context(|| format!("Failed to create staging area {}", staging_root.display()))?;

    let payload_path = staging_root.join(STAGING_PAYLOAD_FILE);
    fs::write(&payload_path, payload)
        .with_context(|| format!("Failed to write staging payload {}", payload_path.display()))?;

    let tree = staging_root.join(bucket);
    if tree.exists() {
        debug!("removing stale staging tree {}", tree.display());
        fs::remove_dir_all(&tree)
            .with_context(|| format!("Failed to clear stale staging tree {}", tree.display()))?;
    }
    fs::create_dir_all(&tree).with_context(|| format!("Failed to create {}", tree.display()))?;

    for key in keys {
        let path = tree.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::hard_link(&payload_path, &path)
            .with_context(|| format!("Failed to link {} -> {}", path.display(), payload_path.display()))?;
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_tree_links_every_key() {
        let tmp = TempDir::new().unwrap();
        let keys = vec!["prefix-000/obj-000000".to_string(), "prefix-001/obj-000000".to_string()];
        let payload = Bytes::from_static(b"payload");

        let tree = stage_tree("bucket-a", &keys, &payload, tmp.path()).unwrap();
        assert_eq!(tree, tmp.path().join("bucket-a"));
        for key in &keys {
            assert_eq!(fs::read(tree.join(key)).unwrap(), b"payload");
        }
        assert!(tmp.path().join(STAGING_PAYLOAD_FILE).exists());
        assert!(!tree.join(STAGING_PAYLOAD_FILE).exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_staging_leaves_the_runtime_responsive() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        use crate::layout::{generate_keys, Layout};
        use crate::store::MemoryStore;

        let tmp = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.create_bucket("bucket-a").await.unwrap();

        // On a single-threaded runtime this task only runs when seeding yields
        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        let keys = generate_keys(Layout::Nested, 2_000, 10);
        let outcome = stage_and_sync(&store, "bucket-a", keys, Bytes::from_static(b"x"), tmp.path(), 4)
            .await
            .unwrap();
        ticker.abort();

        assert_eq!(outcome, WriteOutcome { written: 2_000, failed: 0 });
        assert_eq!(store.object_count("bucket-a"), 2_000);
        assert!(ticks.load(Ordering::Relaxed) > 0);
        assert!(!tmp.path().join("bucket-a").exists());
    }

    #[test]
    fn test_stage_tree_replaces_stale_tree() {
        let tmp = TempDir::new().unwrap();
        let stale = tmp.path().join("bucket-a").join("leftover");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"old").unwrap();

        let tree = stage_tree("bucket-a", &["obj-000000".to_string()], &Bytes::from_static(b"x"), tmp.path()).unwrap();
        assert!(!tree.join("leftover").exists());
        assert!(tree.join("obj-000000").exists());
    }
}

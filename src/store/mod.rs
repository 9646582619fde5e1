//! Object store capability used by the seeder, the probe and cleanup
//!
//! The benchmark only needs a narrow slice of S3: ListObjectsV2 pages,
//! single-object PUT, bucket lifecycle and batch delete. Keeping that slice
//! behind a trait lets the driver and seeder run unchanged against the real
//! SDK client (`s3::S3Store`) or the in-process model (`memory::MemoryStore`).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

/// One ListObjectsV2 request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    /// Requested page size; the server may cap it
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

impl ListRequest {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// One ListObjectsV2 response page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub common_prefixes: Vec<String>,
    /// Entries on this page (keys plus common prefixes)
    pub key_count: usize,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

impl ListPage {
    /// Whether another page has to be requested.
    ///
    /// A page is final when it is not truncated, or when the server omits
    /// (or empties) the continuation token.
    pub fn has_more(&self) -> bool {
        self.is_truncated
            && self
                .next_continuation_token
                .as_deref()
                .map(|t| !t.is_empty())
                .unwrap_or(false)
    }
}

/// Result of a local-tree to bucket synchronization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub uploaded: u64,
    pub failed: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human readable backend description for logs and reports
    fn describe(&self) -> String;

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create a bucket. Succeeds if the bucket already exists.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    async fn list_buckets(&self) -> Result<Vec<String>>;

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;

    /// Delete an empty bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Upload every file under `local_root` into `bucket`, keyed by its path
    /// relative to `local_root` with '/' separators.
    ///
    /// Individual upload failures are logged and counted, not retried.
    async fn sync_dir(&self, local_root: &Path, bucket: &str, parallelism: usize) -> Result<SyncOutcome> {
        let root = local_root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || collect_sync_entries(&root))
            .await
            .context("Staging walk task panicked")??;
        debug!("sync {} -> {}: {} files", local_root.display(), bucket, files.len());

        let sem = Arc::new(Semaphore::new(parallelism.max(1)));
        let mut futs = FuturesUnordered::new();
        for (key, path) in files {
            let sem = sem.clone();
            futs.push(async move {
                let _permit = sem.acquire_owned().await.context("Sync semaphore closed")?;
                let body = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read staged file {}", path.display()))?;
                self.put_object(bucket, &key, Bytes::from(body))
                    .await
                    .with_context(|| format!("PUT {}/{}", bucket, key))
            });
        }

        let mut outcome = SyncOutcome::default();
        while let Some(result) = futs.next().await {
            match result {
                Ok(()) => outcome.uploaded += 1,
                Err(e) => {
                    outcome.failed += 1;
                    warn!("sync upload failed: {:#}", e);
                }
            }
        }
        Ok(outcome)
    }
}

/// Walk a staging tree and map each regular file to its object key
fn collect_sync_entries(local_root: &Path) -> Result<Vec<(String, std::path::PathBuf)>> {
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(local_root).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", local_root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(local_root)
            .with_context(|| format!("{} is outside {}", entry.path().display(), local_root.display()))?;
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((key, entry.path().to_path_buf()));
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_more_requires_token() {
        let mut page = ListPage {
            is_truncated: true,
            next_continuation_token: Some("abc".into()),
            ..Default::default()
        };
        assert!(page.has_more());

        page.next_continuation_token = Some(String::new());
        assert!(!page.has_more());

        page.next_continuation_token = None;
        assert!(!page.has_more());

        page.is_truncated = false;
        page.next_continuation_token = Some("abc".into());
        assert!(!page.has_more());
    }

    #[test]
    fn test_collect_sync_entries_uses_slash_keys() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("prefix-000")).unwrap();
        std::fs::write(tmp.path().join("prefix-000").join("obj-000000"), b"x").unwrap();
        std::fs::write(tmp.path().join("obj-000001"), b"y").unwrap();

        let entries = collect_sync_entries(tmp.path()).unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["obj-000001", "prefix-000/obj-000000"]);
    }
}

//! In-process object store with ListObjectsV2 semantics
//!
//! Used by the test suite and the listing micro-benchmark. Keys are kept
//! sorted per bucket; pagination, prefix filtering and delimiter grouping
//! follow the S3 rules the probe depends on.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{ListPage, ListRequest, ObjectStore};
use crate::constants::LIST_MAX_KEYS;

#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Bytes>>>,
    list_calls: AtomicU64,
    put_calls: AtomicU64,
    /// Keys whose PUT is rejected, to simulate partial write failures
    failing_keys: Mutex<HashSet<String>>,
    offline: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `list_page` calls served so far
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    pub fn reset_list_calls(&self) {
        self.list_calls.store(0, Ordering::Relaxed);
    }

    /// Number of successful `put_object` calls served so far
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::Relaxed)
    }

    /// Make PUTs of the given keys fail until cleared
    pub fn fail_puts_for<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut failing = self.failing_keys.lock();
        failing.extend(keys.into_iter().map(Into::into));
    }

    pub fn clear_failures(&self) {
        self.failing_keys.lock().clear();
    }

    /// Simulate an unreachable endpoint: every call errors
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Object count of a bucket (test helper, not a listing call)
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.lock().get(bucket).map(|b| b.len()).unwrap_or(0)
    }

    /// Sorted keys of a bucket (test helper, not a listing call)
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::Relaxed) {
            bail!("connection refused (memory store offline)");
        }
        Ok(())
    }
}

enum Entry {
    Key(String),
    CommonPrefix(String),
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        self.check_online()?;
        self.list_calls.fetch_add(1, Ordering::Relaxed);

        let buckets = self.buckets.lock();
        let objects = buckets
            .get(&request.bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", request.bucket))?;

        let prefix = request.prefix.as_deref().unwrap_or("");
        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let max_keys = request.max_keys.unwrap_or(LIST_MAX_KEYS).min(LIST_MAX_KEYS);
        let token = request.continuation_token.as_deref().filter(|t| !t.is_empty());

        let mut entries: Vec<Entry> = Vec::new();
        let mut truncated = false;
        let mut last_prefix: Option<String> = None;

        for key in objects.keys() {
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(token) = token {
                // Resume strictly after the last returned entry; a returned
                // common prefix also covers every key beneath it.
                let covered = delimiter
                    .map(|d| token.ends_with(d) && key.starts_with(token))
                    .unwrap_or(false);
                if key.as_str() <= token || covered {
                    continue;
                }
            }

            let entry = match delimiter {
                Some(delim) => match key[prefix.len()..].find(delim) {
                    Some(pos) => {
                        let cp = key[..prefix.len() + pos + delim.len()].to_string();
                        if last_prefix.as_deref() == Some(cp.as_str()) {
                            continue;
                        }
                        last_prefix = Some(cp.clone());
                        Entry::CommonPrefix(cp)
                    }
                    None => Entry::Key(key.clone()),
                },
                None => Entry::Key(key.clone()),
            };

            if entries.len() == max_keys {
                truncated = true;
                break;
            }
            entries.push(entry);
        }

        let next_continuation_token = if truncated {
            entries.last().map(|e| match e {
                Entry::Key(k) => k.clone(),
                Entry::CommonPrefix(p) => p.clone(),
            })
        } else {
            None
        };

        let mut page = ListPage {
            key_count: entries.len(),
            is_truncated: truncated,
            next_continuation_token,
            ..Default::default()
        };
        for entry in entries {
            match entry {
                Entry::Key(k) => page.keys.push(k),
                Entry::CommonPrefix(p) => page.common_prefixes.push(p),
            }
        }
        Ok(page)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.check_online()?;
        if self.failing_keys.lock().contains(key) {
            bail!("InternalError: injected PUT failure for {}", key);
        }
        let mut buckets = self.buckets.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;
        objects.insert(key.to_string(), body);
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.check_online()?;
        Ok(self.buckets.lock().contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.check_online()?;
        self.buckets.lock().entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.check_online()?;
        Ok(self.buckets.lock().keys().cloned().collect())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        self.check_online()?;
        let mut buckets = self.buckets.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| anyhow!("NoSuchBucket: {}", bucket))?;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.check_online()?;
        let mut buckets = self.buckets.lock();
        match buckets.get(bucket) {
            None => bail!("NoSuchBucket: {}", bucket),
            Some(objects) if !objects.is_empty() => {
                bail!("BucketNotEmpty: {} still holds {} objects", bucket, objects.len())
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(keys: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_bucket("b").await.unwrap();
        for key in keys {
            store.put_object("b", key, Bytes::from_static(b"x")).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_pages_follow_continuation_token() {
        let store = store_with(&["a", "b", "c", "d", "e"]).await;
        let first = store.list_page(&ListRequest::new("b").with_max_keys(2)).await.unwrap();
        assert_eq!(first.keys, vec!["a", "b"]);
        assert!(first.has_more());

        let second = store
            .list_page(&ListRequest::new("b").with_max_keys(2).with_continuation_token(first.next_continuation_token))
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["c", "d"]);

        let third = store
            .list_page(&ListRequest::new("b").with_max_keys(2).with_continuation_token(second.next_continuation_token))
            .await
            .unwrap();
        assert_eq!(third.keys, vec!["e"]);
        assert!(!third.is_truncated);
        assert!(third.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_exact_multiple_is_not_truncated() {
        let store = store_with(&["a", "b"]).await;
        let page = store.list_page(&ListRequest::new("b").with_max_keys(2)).await.unwrap();
        assert_eq!(page.key_count, 2);
        assert!(!page.is_truncated);
    }

    #[tokio::test]
    async fn test_delimiter_groups_common_prefixes() {
        let store = store_with(&["p-0/a", "p-0/b", "p-1/a", "top"]).await;
        let page = store.list_page(&ListRequest::new("b").with_delimiter("/")).await.unwrap();
        assert_eq!(page.common_prefixes, vec!["p-0/", "p-1/"]);
        assert_eq!(page.keys, vec!["top"]);
        assert_eq!(page.key_count, 3);
    }

    #[tokio::test]
    async fn test_delimiter_pagination_skips_covered_keys() {
        let store = store_with(&["p-0/a", "p-0/b", "p-1/a", "p-2/a"]).await;
        let first = store
            .list_page(&ListRequest::new("b").with_delimiter("/").with_max_keys(1))
            .await
            .unwrap();
        assert_eq!(first.common_prefixes, vec!["p-0/"]);
        let second = store
            .list_page(
                &ListRequest::new("b")
                    .with_delimiter("/")
                    .with_max_keys(1)
                    .with_continuation_token(first.next_continuation_token),
            )
            .await
            .unwrap();
        assert_eq!(second.common_prefixes, vec!["p-1/"]);
    }

    #[tokio::test]
    async fn test_delete_bucket_requires_empty() {
        let store = store_with(&["a"]).await;
        assert!(store.delete_bucket("b").await.is_err());
        store.delete_objects("b", &["a".to_string()]).await.unwrap();
        store.delete_bucket("b").await.unwrap();
        assert!(!store.bucket_exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_failures_and_offline() {
        let store = store_with(&[]).await;
        store.fail_puts_for(["bad"]);
        assert!(store.put_object("b", "bad", Bytes::new()).await.is_err());
        assert!(store.put_object("b", "good", Bytes::new()).await.is_ok());

        store.set_offline(true);
        assert!(store.list_buckets().await.is_err());
    }
}

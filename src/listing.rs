//! Listing operations against an `ObjectStore`
//!
//! These are the units the probe executes (and hyperfine times), plus the
//! recursive count the seeder and the driver use to verify containers.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::constants::LIST_MAX_KEYS;
use crate::store::{ListPage, ListRequest, ObjectStore};

/// What one logical listing operation observed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListOutcome {
    /// ListObjectsV2 requests issued
    pub pages: u64,
    /// Leaf objects returned across all pages
    pub objects: u64,
    /// Common prefixes returned across all pages
    pub common_prefixes: u64,
    /// Item count of every page, in request order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub page_counts: Vec<u64>,
}

impl ListOutcome {
    fn record(&mut self, page: &ListPage) {
        self.pages += 1;
        self.objects += page.keys.len() as u64;
        self.common_prefixes += page.common_prefixes.len() as u64;
        self.page_counts.push(page.key_count as u64);
    }
}

/// Follow continuation tokens from `base` until the listing is exhausted or
/// `limit` entries were collected. Each page is handed to `on_page`.
async fn drive_pages<F>(
    store: &dyn ObjectStore,
    base: ListRequest,
    limit: Option<u64>,
    mut on_page: F,
) -> Result<ListOutcome>
where
    F: FnMut(&[String]),
{
    let mut outcome = ListOutcome::default();
    let mut token: Option<String> = None;

    loop {
        let mut request = base.clone().with_continuation_token(token.take());
        if let Some(limit) = limit {
            let remaining = limit.saturating_sub(outcome.objects + outcome.common_prefixes);
            let page = request.max_keys.unwrap_or(LIST_MAX_KEYS) as u64;
            request.max_keys = Some(remaining.min(page) as usize);
        }

        let page = store
            .list_page(&request)
            .await
            .with_context(|| format!("Listing {} failed after {} pages", base.bucket, outcome.pages))?;

        outcome.record(&page);
        on_page(&page.keys);

        if let Some(limit) = limit {
            if outcome.objects + outcome.common_prefixes >= limit {
                break;
            }
        }
        if !page.has_more() {
            break;
        }
        token = page.next_continuation_token;
    }

    Ok(outcome)
}

/// Count every object in a bucket by paging through it
pub async fn count_objects(store: &dyn ObjectStore, bucket: &str) -> Result<u64> {
    let t0 = Instant::now();
    let outcome = drive_pages(store, ListRequest::new(bucket).with_max_keys(LIST_MAX_KEYS), None, |_| {}).await?;
    debug!("counted {} objects in {} ({} pages, {:?})", outcome.objects, bucket, outcome.pages, t0.elapsed());
    Ok(outcome.objects)
}

/// Object totals of a container, grouped by the first delimiter of each key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSurvey {
    pub objects: u64,
    /// Keys without the delimiter, i.e. leaves at the top level
    pub top_level_objects: u64,
    /// Objects under each top-level common prefix
    pub prefix_counts: BTreeMap<String, u64>,
}

/// Count a container and tally its top-level prefixes in one recursive walk.
///
/// Issues the same requests as `count_objects`.
pub async fn survey_container(store: &dyn ObjectStore, bucket: &str, delimiter: &str) -> Result<ContainerSurvey> {
    let mut survey = ContainerSurvey::default();
    let outcome = drive_pages(store, ListRequest::new(bucket).with_max_keys(LIST_MAX_KEYS), None, |page| {
        for key in page {
            match key.find(delimiter).filter(|_| !delimiter.is_empty()) {
                Some(pos) => {
                    *survey
                        .prefix_counts
                        .entry(key[..pos + delimiter.len()].to_string())
                        .or_default() += 1;
                }
                None => survey.top_level_objects += 1,
            }
        }
    })
    .await?;
    survey.objects = outcome.objects;
    debug!(
        "surveyed {}: {} objects, {} top-level prefixes ({} pages)",
        bucket,
        survey.objects,
        survey.prefix_counts.len(),
        outcome.pages
    );
    Ok(survey)
}

/// Collect every key of a bucket (gap-aware seeding)
pub async fn existing_keys(store: &dyn ObjectStore, bucket: &str) -> Result<HashSet<String>> {
    let mut keys = HashSet::new();
    drive_pages(store, ListRequest::new(bucket).with_max_keys(LIST_MAX_KEYS), None, |page| {
        keys.extend(page.iter().cloned());
    })
    .await?;
    Ok(keys)
}

/// Full list: one logical call returning up to `max_items` objects.
///
/// Pages internally at the server cap; the caller measures the whole call.
pub async fn list_all(store: &dyn ObjectStore, bucket: &str, max_items: u64) -> Result<ListOutcome> {
    drive_pages(store, ListRequest::new(bucket), Some(max_items), |_| {}).await
}

/// Manual pagination: request `page_size` objects at a time, following the
/// continuation token until the server reports no further pages.
pub async fn paginate(store: &dyn ObjectStore, bucket: &str, page_size: usize) -> Result<ListOutcome> {
    drive_pages(store, ListRequest::new(bucket).with_max_keys(page_size), None, |_| {}).await
}

/// Objects under one prefix, all pages
pub async fn list_prefix(store: &dyn ObjectStore, bucket: &str, prefix: &str) -> Result<ListOutcome> {
    drive_pages(store, ListRequest::new(bucket).with_prefix(prefix), None, |_| {}).await
}

/// Top-level enumeration with a delimiter: returns common prefixes rather
/// than every leaf object
pub async fn list_delimited(store: &dyn ObjectStore, bucket: &str, delimiter: &str) -> Result<ListOutcome> {
    drive_pages(store, ListRequest::new(bucket).with_delimiter(delimiter), None, |_| {}).await
}

/// Number of requests a manual pagination over `objects` needs
pub fn expected_pages(objects: u64, page_size: usize) -> u64 {
    let page_size = page_size.max(1) as u64;
    objects.div_ceil(page_size).max(1)
}

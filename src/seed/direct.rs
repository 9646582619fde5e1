//! Direct-write strategy: one PUT per key, bounded by a semaphore

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::WriteOutcome;
use crate::store::ObjectStore;

/// Write `keys` into `bucket`, at most `parallelism` PUTs in flight.
///
/// Failed PUTs are logged and counted; the batch always runs to the end.
pub async fn write_keys(
    store: Arc<dyn ObjectStore>,
    bucket: &str,
    keys: Vec<String>,
    payload: Bytes,
    parallelism: usize,
    pb: &ProgressBar,
) -> Result<WriteOutcome> {
    let sem = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut futs = FuturesUnordered::new();

    for key in keys {
        let sem = sem.clone();
        let store = store.clone();
        let bucket = bucket.to_string();
        let payload = payload.clone();
        let pb = pb.clone();

        futs.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.context("Seed semaphore closed")?;
            let result = store.put_object(&bucket, &key, payload).await;
            pb.inc(1);
            result.with_context(|| format!("PUT {}/{}", bucket, key))
        }));
    }

    let mut outcome = WriteOutcome::default();
    while let Some(joined) = futs.next().await {
        match joined.context("Seed task join error")? {
            Ok(()) => outcome.written += 1,
            Err(e) => {
                outcome.failed += 1;
                warn!("write failed: {:#}", e);
            }
        }
    }

    debug!("{}: {} written, {} failed", bucket, outcome.written, outcome.failed);
    Ok(outcome)
}

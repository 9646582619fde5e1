//! S3 client backed by the AWS Rust SDK
//!
//! Path-style addressing against a custom endpoint with static credentials.
//! SDK retries are disabled: a failed call surfaces immediately and is
//! handled (or reported) by the caller.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier};
use bytes::Bytes;
use tracing::debug;

use super::{ListPage, ListRequest, ObjectStore};
use crate::config::BenchConfig;

pub struct S3Store {
    client: s3::Client,
    endpoint: String,
    region: String,
}

impl S3Store {
    /// Build a client for the configured endpoint and credentials
    pub async fn connect(config: &BenchConfig) -> Result<Self> {
        let credentials = s3::config::Credentials::new(
            config.credentials.access_key.clone(),
            config.credentials.secret_key.clone(),
            None,
            None,
            "list-bench",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        debug!("S3 client configured for {} (region {})", config.endpoint, config.region);

        Ok(Self {
            client: s3::Client::from_conf(s3_config),
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        let mut req = self.client.list_objects_v2().bucket(&request.bucket);
        if let Some(prefix) = request.prefix.as_deref() {
            req = req.prefix(prefix);
        }
        if let Some(delimiter) = request.delimiter.as_deref() {
            req = req.delimiter(delimiter);
        }
        if let Some(max_keys) = request.max_keys {
            let max_keys = i32::try_from(max_keys).context("max-keys out of range")?;
            req = req.max_keys(max_keys);
        }
        if let Some(token) = request.continuation_token.as_deref() {
            req = req.continuation_token(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| anyhow!("ListObjectsV2 {} failed: {}", request.bucket, DisplayErrorContext(&e)))?;

        let keys: Vec<String> = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();
        let common_prefixes: Vec<String> = resp
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(str::to_string))
            .collect();
        let key_count = resp
            .key_count()
            .and_then(|c| usize::try_from(c).ok())
            .unwrap_or(keys.len() + common_prefixes.len());

        Ok(ListPage {
            keys,
            common_prefixes,
            key_count,
            is_truncated: resp.is_truncated().unwrap_or(false),
            next_continuation_token: resp.next_continuation_token().map(str::to_string),
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| anyhow!("PUT {}/{} failed: {}", bucket, key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    return Ok(false);
                }
                // HEAD responses carry no body; a bare 404 may not map to NotFound
                if e.raw_response().map(|r| r.status().as_u16() == 404).unwrap_or(false) {
                    return Ok(false);
                }
                Err(anyhow!("HEAD bucket {} failed: {}", bucket, DisplayErrorContext(&e)))
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut req = self.client.create_bucket().bucket(bucket);
        if self.region != "us-east-1" {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        match req.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let already = e
                    .as_service_error()
                    .map(|se| se.is_bucket_already_owned_by_you() || se.is_bucket_already_exists())
                    .unwrap_or(false);
                if already {
                    debug!("bucket {} already exists", bucket);
                    Ok(())
                } else {
                    Err(anyhow!("Create bucket {} failed: {}", bucket, DisplayErrorContext(&e)))
                }
            }
        }
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| anyhow!("ListBuckets failed: {}", DisplayErrorContext(&e)))?;
        Ok(resp
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let objects = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to build delete request")?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .context("Failed to build delete request")?;

        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| anyhow!("DeleteObjects {} failed: {}", bucket, DisplayErrorContext(&e)))?;

        let errors = resp.errors();
        if let Some(first) = errors.first() {
            bail!(
                "DeleteObjects {}: {} keys failed, first {} ({})",
                bucket,
                errors.len(),
                first.key().unwrap_or("?"),
                first.message().unwrap_or("no message")
            );
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| anyhow!("Delete bucket {} failed: {}", bucket, DisplayErrorContext(&e)))?;
        Ok(())
    }
}

//! AWS collaborators: credential/identity checks, the S3 state store, and
//! availability-zone discovery.
//!
//! The SDK config is loaded once into an [`AwsContext`] and service clients
//! are created from it.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, BucketVersioningStatus,
    CreateBucketConfiguration, ServerSideEncryption, ServerSideEncryptionByDefault,
    ServerSideEncryptionConfiguration, ServerSideEncryptionRule, VersioningConfiguration,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::context::Context;
use crate::error::Error;
use crate::workflow::{ClusterDirectory, OperatorPrompt, NOT_FOUND};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Region from the environment, or the build default. Called once in `main`;
/// the resolved value is threaded through explicitly from there.
pub fn resolve_region() -> String {
    std::env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string())
}

/// Shared AWS configuration for creating service clients.
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(&self.config)
    }

    fn sts_client(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(&self.config)
    }

    fn ec2_client(&self) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(&self.config)
    }

    /// Validate the resolved credentials and return the account id.
    ///
    /// STS GetCallerIdentity needs no special permissions, so a failure here
    /// means the credentials themselves are unusable.
    pub async fn verify_credentials(&self) -> Result<String> {
        let identity = self
            .sts_client()
            .get_caller_identity()
            .send()
            .await
            .context("get AWS caller identity; check credentials and AWS_PROFILE")?;

        let account = identity
            .account()
            .context("no account id returned by STS")?;

        info!(account_id = %account, region = %self.region, "AWS credentials validated");
        Ok(account.to_string())
    }

    /// Comma-joined availability zones of the configured region, as the
    /// backend's `--zones` argument expects them.
    pub async fn availability_zones(&self) -> Result<String> {
        let filter = aws_sdk_ec2::types::Filter::builder()
            .name("region-name")
            .values(self.region.clone())
            .build();

        let resp = self
            .ec2_client()
            .describe_availability_zones()
            .filters(filter)
            .send()
            .await
            .with_context(|| format!("describe {} availability zones", self.region))?;

        let zones: Vec<&str> = resp
            .availability_zones()
            .iter()
            .filter_map(|z| z.zone_name())
            .collect();

        debug!(region = %self.region, zones = %zones.join(","), "resolved availability zones");
        Ok(zones.join(","))
    }
}

/// Bucket identifier scoped to the operator and account.
pub fn state_bucket_name(user: &str, account: &str) -> String {
    format!("{user}-cumulus-state-store-{account}")
}

/// The S3 bucket recording which clusters exist and their configuration.
#[derive(Clone)]
pub struct StateStore {
    client: aws_sdk_s3::Client,
    region: String,
}

impl StateStore {
    pub fn new(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
            region: ctx.region().to_string(),
        }
    }

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let buckets = self
            .client
            .list_buckets()
            .send()
            .await
            .context("list S3 buckets")?;

        Ok(buckets
            .buckets()
            .iter()
            .any(|b| b.name() == Some(bucket)))
    }

    /// Create the state bucket: private, AES-256 server-side encryption,
    /// versioning enabled.
    pub async fn create_state_bucket(&self, bucket: &str) -> Result<()> {
        info!(bucket = %bucket, region = %self.region, "creating state bucket");

        let mut create = self
            .client
            .create_bucket()
            .bucket(bucket)
            .acl(BucketCannedAcl::Private);

        // us-east-1 rejects an explicit location constraint.
        if self.region != DEFAULT_REGION {
            create = create.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        create.send().await.context("create state bucket")?;

        let sse = ServerSideEncryptionByDefault::builder()
            .sse_algorithm(ServerSideEncryption::Aes256)
            .build()
            .context("build encryption settings")?;
        let sse_config = ServerSideEncryptionConfiguration::builder()
            .rules(
                ServerSideEncryptionRule::builder()
                    .apply_server_side_encryption_by_default(sse)
                    .build(),
            )
            .build()
            .context("build encryption configuration")?;

        self.client
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(sse_config)
            .send()
            .await
            .context("encrypt state bucket")?;

        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .context("enable state bucket versioning")?;

        Ok(())
    }

    /// Cluster identifiers recorded in the store: one `<name>/` prefix per
    /// cluster.
    pub async fn list_clusters(&self, bucket: &str) -> Result<Vec<String>> {
        let objects = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .delimiter("/")
            .send()
            .await
            .context("list state store entries")?;

        let clusters: Vec<String> = objects
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(|p| p.trim_end_matches('/').to_string())
            .collect();

        debug!(bucket = %bucket, count = clusters.len(), "listed clusters");
        Ok(clusters)
    }

    /// Creation timestamp of a cluster's config entry, for display.
    pub async fn config_last_modified(&self, bucket: &str, cluster: &str) -> Option<i64> {
        self.client
            .head_object()
            .bucket(bucket)
            .key(config_key(cluster))
            .send()
            .await
            .ok()
            .and_then(|head| head.last_modified().map(|t| t.secs()))
    }

    /// Record a cluster's configuration object after a successful create.
    pub async fn put_config(&self, bucket: &str, cluster: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(config_key(cluster))
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("record state entry for {cluster}"))?;
        Ok(())
    }

    /// Remove a cluster's bookkeeping entry; returns the removed key.
    pub async fn remove_config(&self, bucket: &str, cluster: &str) -> Result<String> {
        let key = config_key(cluster);
        self.client
            .delete_object()
            .bucket(bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("remove state entry for {cluster}"))?;
        Ok(key)
    }
}

fn config_key(cluster: &str) -> String {
    format!("{cluster}/config")
}

fn format_creation_date(secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => NOT_FOUND.to_string(),
    }
}

#[async_trait]
impl ClusterDirectory for StateStore {
    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        self.list_clusters(bucket).await
    }

    async fn creation_date(&self, bucket: &str, name: &str) -> String {
        match self.config_last_modified(bucket, name).await {
            Some(secs) => format_creation_date(secs),
            None => NOT_FOUND.to_string(),
        }
    }
}

/// Idempotent bucket bootstrap: reuse the operator's bucket if present,
/// otherwise create it after a y/n prompt. Declining is a bootstrap failure.
pub async fn ensure_state_bucket(
    ctx: &Context,
    store: &StateStore,
    user: &str,
    account: &str,
) -> Result<String, Error> {
    let bucket = state_bucket_name(user, account);

    let exists = store
        .bucket_exists(&bucket)
        .await
        .map_err(|e| Error::dependency("look up state bucket", e))?;

    if exists {
        ctx.info(&format!("Using s3://{bucket} for provisioning state"));
        return Ok(bucket);
    }

    ctx.warn(&format!("S3 bucket {bucket} for provisioning state does not exist"));
    let approved = ctx
        .confirm(&format!("Create S3 bucket {bucket}?"))
        .map_err(|e| Error::dependency("read bucket confirmation", e))?;

    if !approved {
        return Err(Error::dependency(
            "bootstrap state bucket",
            anyhow::anyhow!("an S3 state bucket is required for cluster provisioning"),
        ));
    }

    store
        .create_state_bucket(&bucket)
        .await
        .map_err(|e| Error::dependency("create state bucket", e))?;
    ctx.success(&format!("Created s3://{bucket}"));

    Ok(bucket)
}

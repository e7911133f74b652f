//! Bucket provisioning for static website hosting
//!
//! A run is four provider calls executed strictly in order:
//!
//! 1. create the bucket (with a location constraint outside `us-east-1`)
//! 2. lift the public access block
//! 3. enable website hosting
//! 4. attach a public-read bucket policy
//!
//! and then reports the website endpoint. The first failure ends the run.
//! Nothing is retried or rolled back, so the bucket keeps whatever the earlier
//! steps applied; running again converges because steps 2-4 are idempotent and
//! an already-owned bucket is accepted at step 1.

use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

use crate::config::BucketConfig;
use crate::s3::{
    BucketApi, BucketPolicy, CreateBucketConfiguration, PublicAccessBlockConfiguration, S3Error,
    WebsiteConfiguration,
};

/// The one region where CreateBucket must not carry a location constraint
pub const IMPLICIT_LOCATION_REGION: &str = "us-east-1";

/// Returned by CreateBucket when the caller already owns the bucket
pub const BUCKET_ALREADY_OWNED: &str = "BucketAlreadyOwnedByYou";

/// Error code for a config rejected before any request
pub const INVALID_CONFIG: &str = "InvalidBucketConfig";

/// CreateBucket body for `region`, or `None` for the implicit default region
pub fn location_constraint(region: &str) -> Option<CreateBucketConfiguration> {
    if region == IMPLICIT_LOCATION_REGION {
        None
    } else {
        Some(CreateBucketConfiguration::new(region))
    }
}

/// Website endpoint S3 assigns to `bucket` in `region`
pub fn website_endpoint(bucket: &str, region: &str) -> String {
    format!("http://{}.s3-website-{}.amazonaws.com", bucket, region)
}

/// A side-effecting provisioning step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CreateBucket,
    PublicAccessBlock,
    WebsiteHosting,
    BucketPolicy,
}

impl Step {
    /// Every step, in execution order
    pub const ALL: [Step; 4] = [
        Step::CreateBucket,
        Step::PublicAccessBlock,
        Step::WebsiteHosting,
        Step::BucketPolicy,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Step::CreateBucket => "create bucket",
            Step::PublicAccessBlock => "relax public access block",
            Step::WebsiteHosting => "enable static website hosting",
            Step::BucketPolicy => "attach public-read bucket policy",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Why a run stopped, and how far it got
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProvisioningFailure {
    /// Step that failed; `None` when the config was rejected up front
    pub step: Option<Step>,
    /// Provider error code, verbatim
    pub code: String,
    /// Provider error message, verbatim
    pub message: String,
    /// Steps whose effects remain applied
    pub completed_steps: Vec<Step>,
}

/// Outcome of one provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisioningResult {
    Provisioned {
        bucket: String,
        website_url: String,
        completed_steps: Vec<Step>,
        /// The bucket was already owned by the caller before this run
        bucket_preexisting: bool,
    },
    Failed(ProvisioningFailure),
}

impl ProvisioningResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProvisioningResult::Provisioned { .. })
    }

    pub fn website_url(&self) -> Option<&str> {
        match self {
            ProvisioningResult::Provisioned { website_url, .. } => Some(website_url),
            ProvisioningResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ProvisioningFailure> {
        match self {
            ProvisioningResult::Failed(failure) => Some(failure),
            ProvisioningResult::Provisioned { .. } => None,
        }
    }

    pub fn completed_steps(&self) -> &[Step] {
        match self {
            ProvisioningResult::Provisioned {
                completed_steps, ..
            } => completed_steps,
            ProvisioningResult::Failed(failure) => &failure.completed_steps,
        }
    }

    /// The website URL on success, the failure otherwise
    pub fn into_result(self) -> Result<String, ProvisioningFailure> {
        match self {
            ProvisioningResult::Provisioned { website_url, .. } => Ok(website_url),
            ProvisioningResult::Failed(failure) => Err(failure),
        }
    }
}

/// Runs the provisioning steps against a [`BucketApi`]
#[derive(Debug)]
pub struct Provisioner<A> {
    api: A,
}

impl<A: BucketApi> Provisioner<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Provision `config.bucket_name` in `config.region` for website hosting
    pub async fn provision(&self, config: &BucketConfig) -> ProvisioningResult {
        if let Err(e) = config.validate() {
            error!(error = %e, "invalid bucket configuration");
            return ProvisioningResult::Failed(ProvisioningFailure {
                step: None,
                code: INVALID_CONFIG.to_string(),
                message: e.to_string(),
                completed_steps: Vec::new(),
            });
        }

        let bucket = config.bucket_name.as_str();
        let region = config.region.as_str();
        let mut completed = Vec::with_capacity(Step::ALL.len());
        let mut bucket_preexisting = false;

        info!(bucket, region, step = %Step::CreateBucket, "provisioning step");
        match self
            .api
            .create_bucket(bucket, location_constraint(region))
            .await
        {
            Ok(()) => {}
            Err(e) if e.code() == BUCKET_ALREADY_OWNED => {
                warn!(bucket, "bucket already owned by this account, reusing it");
                bucket_preexisting = true;
            }
            Err(e) => return Self::failed(Step::CreateBucket, &e, completed),
        }
        completed.push(Step::CreateBucket);

        info!(bucket, step = %Step::PublicAccessBlock, "provisioning step");
        if let Err(e) = self
            .api
            .put_public_access_block(bucket, &PublicAccessBlockConfiguration::allow_all())
            .await
        {
            return Self::failed(Step::PublicAccessBlock, &e, completed);
        }
        completed.push(Step::PublicAccessBlock);

        info!(bucket, step = %Step::WebsiteHosting, "provisioning step");
        let website = WebsiteConfiguration::new(&config.index_document, &config.error_document);
        if let Err(e) = self.api.put_bucket_website(bucket, &website).await {
            return Self::failed(Step::WebsiteHosting, &e, completed);
        }
        completed.push(Step::WebsiteHosting);

        info!(bucket, step = %Step::BucketPolicy, "provisioning step");
        if let Err(e) = self
            .api
            .put_bucket_policy(bucket, &BucketPolicy::public_read(bucket))
            .await
        {
            return Self::failed(Step::BucketPolicy, &e, completed);
        }
        completed.push(Step::BucketPolicy);

        let website_url = website_endpoint(bucket, region);
        info!(bucket, url = %website_url, "bucket provisioned");

        ProvisioningResult::Provisioned {
            bucket: bucket.to_string(),
            website_url,
            completed_steps: completed,
            bucket_preexisting,
        }
    }

    fn failed(step: Step, err: &S3Error, completed_steps: Vec<Step>) -> ProvisioningResult {
        error!(
            step = %step,
            code = %err.code(),
            status = ?err.status().map(|s| s.as_u16()),
            completed = completed_steps.len(),
            "provisioning failed"
        );
        ProvisioningResult::Failed(ProvisioningFailure {
            step: Some(step),
            code: err.code(),
            message: err.message(),
            completed_steps,
        })
    }
}

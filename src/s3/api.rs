//! The provider operations the provisioner depends on.
//!
//! [`S3Client`](crate::s3::S3Client) talks to a real endpoint; tests swap in
//! `MockBucketApi` (generated by `mockall`, exported with the default
//! `test-export-mocks` feature) or an in-memory fake.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::s3::client::Result;
use crate::s3::types::{
    BucketPolicy, CreateBucketConfiguration, PublicAccessBlockConfiguration, WebsiteConfiguration,
};

/// Bucket-level control-plane operations
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BucketApi: Send + Sync {
    /// CreateBucket. `configuration` is `None` for the implicit default region.
    async fn create_bucket(
        &self,
        bucket: &str,
        configuration: Option<CreateBucketConfiguration>,
    ) -> Result<()>;

    /// PutPublicAccessBlock
    async fn put_public_access_block(
        &self,
        bucket: &str,
        configuration: &PublicAccessBlockConfiguration,
    ) -> Result<()>;

    /// PutBucketWebsite
    async fn put_bucket_website(
        &self,
        bucket: &str,
        configuration: &WebsiteConfiguration,
    ) -> Result<()>;

    /// PutBucketPolicy
    async fn put_bucket_policy(&self, bucket: &str, policy: &BucketPolicy) -> Result<()>;
}

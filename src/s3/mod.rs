//! S3 control-plane access with AWS SigV4 signing
//!
//! This module provides:
//! - AWS Signature Version 4 signing
//! - Bucket configuration payloads (website, public access block, policy)
//! - The [`BucketApi`] seam and its HTTP implementation, [`S3Client`]

pub mod api;
pub mod client;
pub mod signer;
pub mod types;

pub use api::BucketApi;
#[cfg(any(test, feature = "test-export-mocks"))]
pub use api::MockBucketApi;
pub use client::{regional_endpoint, Result, S3Client, S3Error};
pub use signer::SignerV4;
pub use types::{
    object_arn, BucketPolicy, CreateBucketConfiguration, ErrorDocument, PolicyStatement,
    PublicAccessBlockConfiguration, WebsiteConfiguration,
};

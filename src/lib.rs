//! sitebucket - provision an S3 bucket for public static website hosting

pub mod cli;
pub mod config;
pub mod core;
pub mod provision;
pub mod s3;

pub use config::{BucketConfig, Config};
pub use crate::core::Core;
pub use provision::{Provisioner, ProvisioningFailure, ProvisioningResult, Step};

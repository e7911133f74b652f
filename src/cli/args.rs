use clap::{Args, Parser, Subcommand};

use crate::config::BucketConfig;

/// sitebucket - provision an S3 bucket to serve a static website
#[derive(Parser, Debug)]
#[command(name = "sitebucket")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path (YAML). Without one, credentials come from the environment
    #[arg(long, global = true, env = "SITEBUCKET_CONFIG")]
    pub config: Option<String>,

    /// Profile to use from the config file
    #[arg(long, global = true, env = "SITEBUCKET_PROFILE")]
    pub profile: Option<String>,

    /// S3-compatible endpoint overriding the regional AWS endpoint
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Disable TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the bucket and configure it for public website hosting
    Provision {
        #[command(flatten)]
        bucket: BucketArgs,
    },

    /// Print the website URL for a bucket without contacting the provider
    Endpoint {
        #[command(flatten)]
        bucket: BucketArgs,
    },
}

/// Per-field overrides of the bucket configuration
#[derive(Args, Debug, Clone, Default)]
pub struct BucketArgs {
    /// Region to create the bucket in (default: sa-east-1)
    #[arg(long)]
    pub region: Option<String>,

    /// Bucket name (default: cloud-app-project-1)
    #[arg(long, value_name = "NAME")]
    pub bucket: Option<String>,

    /// Index document (default: index.html)
    #[arg(long, value_name = "KEY")]
    pub index_document: Option<String>,

    /// Error document (default: error.html)
    #[arg(long, value_name = "KEY")]
    pub error_document: Option<String>,
}

impl BucketArgs {
    /// Apply the flags that were given on top of `base`
    pub fn apply(&self, base: &BucketConfig) -> BucketConfig {
        let mut config = base.clone();
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(bucket) = &self.bucket {
            config.bucket_name = bucket.clone();
        }
        if let Some(index) = &self.index_document {
            config.index_document = index.clone();
        }
        if let Some(error) = &self.error_document {
            config.error_document = error.clone();
        }
        config
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn bucket_args(&self) -> &BucketArgs {
        match &self.command {
            Commands::Provision { bucket } | Commands::Endpoint { bucket } => bucket,
        }
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Bucket name used when neither the config file nor the CLI names one
pub const DEFAULT_BUCKET_NAME: &str = "cloud-app-project-1";

/// Region used when neither the config file nor the CLI names one
pub const DEFAULT_REGION: &str = "sa-east-1";

pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";
pub const DEFAULT_ERROR_DOCUMENT: &str = "error.html";

/// Name of the profile built from environment variables
pub const ENV_PROFILE: &str = "default";

/// What gets provisioned: the bucket, where it lives and which documents it serves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Globally unique bucket name
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,

    /// Region the bucket is created in (default: sa-east-1)
    #[serde(default = "default_region")]
    pub region: String,

    /// Document served for requests to a directory root
    #[serde(default = "default_index_document")]
    pub index_document: String,

    /// Document served for 4xx responses
    #[serde(default = "default_error_document")]
    pub error_document: String,
}

fn default_bucket_name() -> String {
    DEFAULT_BUCKET_NAME.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_index_document() -> String {
    DEFAULT_INDEX_DOCUMENT.to_string()
}

fn default_error_document() -> String {
    DEFAULT_ERROR_DOCUMENT.to_string()
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            bucket_name: default_bucket_name(),
            region: default_region(),
            index_document: default_index_document(),
            error_document: default_error_document(),
        }
    }
}

impl BucketConfig {
    /// Create a config for `bucket_name` in `region` with the default documents
    pub fn new(bucket_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    pub fn with_index_document(mut self, index_document: impl Into<String>) -> Self {
        self.index_document = index_document.into();
        self
    }

    pub fn with_error_document(mut self, error_document: impl Into<String>) -> Self {
        self.error_document = error_document.into();
        self
    }

    /// Check the config before any request is made.
    ///
    /// Bucket names follow the S3 general purpose bucket naming rules.
    pub fn validate(&self) -> Result<()> {
        validate_bucket_name(&self.bucket_name)?;
        validate_region(&self.region)?;
        validate_document("index document", &self.index_document)?;
        validate_document("error document", &self.error_document)?;
        Ok(())
    }
}

fn validate_bucket_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("bucket name is not set");
    }
    if !(3..=63).contains(&name.len()) {
        anyhow::bail!(
            "bucket name '{}' must be between 3 and 63 characters long",
            name
        );
    }
    if !name
        .bytes()
        .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-'))
    {
        anyhow::bail!(
            "bucket name '{}' may only contain lowercase letters, digits, '.' and '-'",
            name
        );
    }
    let bytes = name.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        anyhow::bail!(
            "bucket name '{}' must start and end with a letter or digit",
            name
        );
    }
    if name.contains("..") {
        anyhow::bail!("bucket name '{}' must not contain two adjacent periods", name);
    }
    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        anyhow::bail!("bucket name '{}' must not be formatted as an IP address", name);
    }
    Ok(())
}

fn validate_region(region: &str) -> Result<()> {
    if region.is_empty() {
        anyhow::bail!("region is not set");
    }
    if !region
        .bytes()
        .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-'))
        || region.starts_with('-')
        || region.ends_with('-')
    {
        anyhow::bail!("'{}' is not a valid region identifier", region);
    }
    Ok(())
}

fn validate_document(kind: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        anyhow::bail!("{} is not set", kind);
    }
    if key.starts_with('/') {
        anyhow::bail!("{} '{}' must not start with '/'", kind, key);
    }
    Ok(())
}

/// Credentials and endpoint for talking to the storage provider
#[derive(Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Endpoint override for S3-compatible services (default: regional AWS endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// AWS access key ID
    pub access_key: String,

    /// AWS secret access key
    pub secret_key: String,

    /// Session token for temporary credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Named credential profiles
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    /// Profile used when none is requested explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// The bucket to provision
    #[serde(default)]
    pub bucket: BucketConfig,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Config {
    /// Create a configuration with no profiles and the default bucket
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            default_profile: None,
            bucket: BucketConfig::default(),
            request_timeout: default_request_timeout(),
        }
    }

    /// Get a profile by name, or the default profile if not specified
    pub fn get_profile(&self, name: Option<&str>) -> Option<&Profile> {
        if let Some(name) = name {
            self.profiles.get(name)
        } else if let Some(default) = &self.default_profile {
            self.profiles.get(default)
        } else {
            self.profiles.values().next()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// Supports both AWS standard variables and the short S3_* form:
/// - AWS_ACCESS_KEY_ID / S3_KEY
/// - AWS_SECRET_ACCESS_KEY / S3_SECRET
/// - AWS_SESSION_TOKEN (optional)
/// - S3_ENDPOINT (optional)
/// - SITEBUCKET_REQUEST_TIMEOUT (optional, seconds)
///
/// The bucket itself keeps its defaults; the CLI overrides them.
pub fn load_from_env() -> Result<Config> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let mut config = Config::new();

    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("S3_KEY"))
        .context("Neither AWS_ACCESS_KEY_ID nor S3_KEY environment variable is set")?;

    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("S3_SECRET"))
        .context("Neither AWS_SECRET_ACCESS_KEY nor S3_SECRET environment variable is set")?;

    let session_token = std::env::var("AWS_SESSION_TOKEN")
        .ok()
        .filter(|t| !t.is_empty());

    let endpoint = std::env::var("S3_ENDPOINT")
        .ok()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    let profile = Profile {
        endpoint,
        access_key,
        secret_key,
        session_token,
    };

    config.profiles.insert(ENV_PROFILE.to_string(), profile);
    config.default_profile = Some(ENV_PROFILE.to_string());

    if let Ok(timeout) = std::env::var("SITEBUCKET_REQUEST_TIMEOUT") {
        match timeout.trim().parse() {
            Ok(val) => config.request_timeout = val,
            Err(e) => tracing::warn!(
                value = %timeout,
                error = %e,
                default = config.request_timeout,
                "ignoring invalid SITEBUCKET_REQUEST_TIMEOUT"
            ),
        }
    }

    Ok(config)
}

/// Load configuration from file or environment
///
/// Tries the YAML file first when one is given, otherwise falls back to
/// environment variables.
///
/// # Arguments
/// * `config_path` - Optional path to YAML config file
/// * `profile_name` - Optional profile name to use. The environment only
///   provides `"default"`, so any other name requires a config file.
pub fn load_config(config_path: Option<&str>, profile_name: Option<&str>) -> Result<Config> {
    if let Some(path) = config_path {
        let mut config = load_from_yaml(path)?;

        if let Some(name) = profile_name {
            if !config.profiles.contains_key(name) {
                anyhow::bail!("Profile '{}' not found in config file", name);
            }
            config.default_profile = Some(name.to_string());
        }

        Ok(config)
    } else {
        if let Some(name) = profile_name.filter(|name| *name != ENV_PROFILE) {
            anyhow::bail!(
                "Profile '{}' requires --config; environment credentials only provide the '{}' profile",
                name,
                ENV_PROFILE
            );
        }
        load_from_env()
    }
}

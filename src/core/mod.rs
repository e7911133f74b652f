use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BucketConfig, Config, Profile};
use crate::provision::{Provisioner, ProvisioningResult};
use crate::s3::S3Client;

/// Everything a provisioning run needs, resolved from configuration
///
/// The S3 client is bound to the bucket's region: SigV4 signs with it and the
/// regional endpoint is derived from it.
#[derive(Clone, Debug)]
pub struct Core {
    pub config: Arc<Config>,
    provisioner: Arc<Provisioner<S3Client>>,
}

impl Core {
    /// Resolve the profile and build the client.
    ///
    /// `profile_name` selects a named profile; otherwise the config's default is used.
    pub fn new(config: Config, profile_name: Option<&str>, insecure: bool) -> Result<Self> {
        let profile = config
            .get_profile(profile_name)
            .ok_or_else(|| anyhow::anyhow!("No profile found in configuration"))?;

        let client = build_client(profile, &config.bucket, config.request_timeout, insecure)?;
        tracing::debug!(endpoint = %client.endpoint(), region = %client.region(), "S3 client ready");

        Ok(Self {
            config: Arc::new(config),
            provisioner: Arc::new(Provisioner::new(client)),
        })
    }

    pub fn bucket(&self) -> &BucketConfig {
        &self.config.bucket
    }

    /// Provision the configured bucket
    pub async fn provision(&self) -> ProvisioningResult {
        self.provisioner.provision(&self.config.bucket).await
    }
}

fn build_client(
    profile: &Profile,
    bucket: &BucketConfig,
    request_timeout: u64,
    insecure: bool,
) -> Result<S3Client> {
    let mut client = S3Client::new(
        profile.access_key.clone(),
        &profile.secret_key,
        &bucket.region,
        insecure,
    )
    .context("Failed to build S3 client")?
    .with_session_token(profile.session_token.clone());

    if let Some(endpoint) = &profile.endpoint {
        client = client.with_endpoint(endpoint.clone());
    }
    if request_timeout > 0 {
        client = client.with_timeout(Duration::from_secs(request_timeout));
    }

    Ok(client)
}

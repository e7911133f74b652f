//! CLI module for sitebucket
//!
//! # Usage
//!
//! ```bash
//! # Provision the default bucket (cloud-app-project-1 in sa-east-1)
//! sitebucket provision
//!
//! # Another bucket and region, JSON report
//! sitebucket provision --bucket my-site --region us-east-1 --format json
//!
//! # Only compute the website URL
//! sitebucket endpoint --bucket my-site --region eu-west-1
//! ```

pub mod args;
pub mod commands;

use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::debug;

use crate::config::{self, Config};
use crate::core::Core;
use args::{Cli, Commands};

/// Run the CLI application.
///
/// A failed provisioning run is reported on stdout and mapped to exit code 1;
/// configuration problems surface as errors.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    debug!("CLI arguments: {:?}", cli);

    let mut stdout = std::io::stdout().lock();
    let bucket = cli.bucket_args();

    match &cli.command {
        Commands::Provision { .. } => {
            let mut config = config::load_config(cli.config.as_deref(), cli.profile.as_deref())
                .context("Failed to load configuration")?;
            apply_overrides(&mut config, &cli);
            config.bucket = bucket.apply(&config.bucket);

            let core = Core::new(config, None, cli.insecure)?;
            let ok = commands::cmd_provision(&core, cli.format, &mut stdout).await?;

            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Endpoint { .. } => {
            // No credentials needed; only the file's bucket section matters
            let base = match cli.config.as_deref() {
                Some(path) => config::load_from_yaml(path)?.bucket,
                None => Config::new().bucket,
            };
            commands::cmd_endpoint(&bucket.apply(&base), cli.format, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Apply global CLI overrides to the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(endpoint) = &cli.endpoint {
        for profile in config.profiles.values_mut() {
            profile.endpoint = Some(endpoint.clone());
        }
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use clap::Parser;

    #[test]
    fn test_endpoint_override_applies_to_profiles() {
        let mut config = Config::new();
        config.profiles.insert(
            "default".to_string(),
            Profile {
                endpoint: None,
                access_key: "key".to_string(),
                secret_key: "secret".to_string(),
                session_token: None,
            },
        );
        let cli = Cli::try_parse_from([
            "sitebucket",
            "--endpoint",
            "http://localhost:4566",
            "provision",
        ])
        .unwrap();

        apply_overrides(&mut config, &cli);

        assert_eq!(
            config.profiles["default"].endpoint.as_deref(),
            Some("http://localhost:4566")
        );
    }
}

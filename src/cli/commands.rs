use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::cli::args::OutputFormat;
use crate::config::BucketConfig;
use crate::core::Core;
use crate::provision::{website_endpoint, ProvisioningResult};

/// Endpoint command output
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport<'a> {
    pub bucket: &'a str,
    pub region: &'a str,
    pub website_url: String,
}

/// Provision command. Returns whether provisioning succeeded.
pub async fn cmd_provision(core: &Core, format: OutputFormat, out: &mut dyn Write) -> Result<bool> {
    if format == OutputFormat::Text {
        writeln!(out, "Creating bucket {}", core.bucket().bucket_name)?;
        out.flush()?;
    }

    let result = core.provision().await;
    render_provisioning(&result, format, out)?;

    Ok(result.is_success())
}

/// Write the outcome of a run in the requested format
pub fn render_provisioning(
    result: &ProvisioningResult,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, result)?;
            writeln!(out)?;
        }
        OutputFormat::Text => match result {
            ProvisioningResult::Provisioned {
                website_url,
                bucket_preexisting,
                ..
            } => {
                if *bucket_preexisting {
                    writeln!(out, "Bucket already existed in this account; configuration reapplied")?;
                }
                writeln!(out, "Bucket configured successfully!")?;
                writeln!(out, "URL: {}", website_url)?;
            }
            ProvisioningResult::Failed(failure) => {
                writeln!(out, "Error: {}", failure)?;
                if let Some(step) = failure.step {
                    writeln!(out, "Failed step: {}", step)?;
                }
                if !failure.completed_steps.is_empty() {
                    let applied: Vec<String> =
                        failure.completed_steps.iter().map(|s| s.to_string()).collect();
                    writeln!(out, "Already applied: {}", applied.join(", "))?;
                }
            }
        },
    }
    Ok(())
}

/// Endpoint command: website URL from bucket name and region alone
pub fn cmd_endpoint(bucket: &BucketConfig, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    bucket.validate()?;

    let report = EndpointReport {
        bucket: &bucket.bucket_name,
        region: &bucket.region,
        website_url: website_endpoint(&bucket.bucket_name, &bucket.region),
    };

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
        OutputFormat::Text => writeln!(out, "{}", report.website_url)?,
    }
    Ok(())
}

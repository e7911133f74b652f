use anyhow::Result;
use std::process::ExitCode;

use sitebucket::cli::{self, args::Cli};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    cli::init_logging(&cli.log_level);

    // Provisioning is a handful of sequential requests; one thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(cli::run(cli))
}

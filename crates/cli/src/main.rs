use std::process::ExitCode;

use annocurate_cli::{run, Cli, CliConfig};
use annocurate_core::platform::{HostDetector, PlatformDetector};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "annocurate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let platform = HostDetector.detect();
    tracing::debug!(platform = %platform.summary(), "Host platform");

    let result = CliConfig::from_env().and_then(|config| {
        let mut stdout = std::io::stdout().lock();
        run(cli.command, &config, &mut stdout)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

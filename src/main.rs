use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use plugin_smoketest::config;
use plugin_smoketest::harness::{self, RunVerdict};

#[derive(Parser, Debug)]
#[command(name = "plugin-smoketest")]
#[command(about = "Smoke-test the newest untested launcher plugin", long_about = None)]
struct Args {
    /// Path or URL of the plugin manifest
    #[arg(short, long, value_name = "FILE_OR_URL")]
    manifest: Option<String>,

    /// Implementation language to test (manifest `Language` field)
    #[arg(short, long)]
    language: Option<String>,

    /// Interpreter used to run the plugin
    #[arg(short, long)]
    interpreter: Option<String>,

    /// Override the user-data root directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Override the application-data root directory
    #[arg(long, value_name = "DIR")]
    app_data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("plugin_smoketest={log_level}").parse().unwrap()),
        )
        .init();

    let mut config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(manifest) = args.manifest {
        config.manifest = manifest;
    }
    if let Some(language) = args.language {
        config.language = language;
    }
    if let Some(interpreter) = args.interpreter {
        config.interpreter = interpreter;
    }
    if let Some(dir) = args.user_data_dir {
        config.user_data_dir = Some(dir);
    }
    if let Some(dir) = args.app_data_dir {
        config.app_data_dir = Some(dir);
    }

    let client = match reqwest::Client::builder()
        .user_agent(concat!("plugin-smoketest/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match harness::run(&config, &client).await {
        Ok(RunVerdict::Passed) => ExitCode::SUCCESS,
        Ok(RunVerdict::NothingToTest { name }) => {
            info!("Skipped {name}: unsupported hosting platform");
            ExitCode::SUCCESS
        }
        Ok(RunVerdict::NoCandidate) => ExitCode::FAILURE,
        Ok(RunVerdict::Failed { exit_code }) => ExitCode::from(exit_code.clamp(1, 255) as u8),
        Err(e) => {
            error!("Smoke test aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

// Mind2Code
// Main entry point for the mind2code binary

use clap::Parser;
use mind2code_engine::cli::{Cli, Command};
use mind2code_engine::config::Config;
use mind2code_engine::handlers::{handle_config, handle_run, handle_status, OutputFormat};
use mind2code_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!("Mind2Code v{}", env!("CARGO_PKG_VERSION"));

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Run {
            requirement,
            repo_context,
            profile,
            session,
        } => {
            tracing::info!("Running requirement: {}", requirement);
            handle_run(requirement, repo_context, profile, session, &config, format).await
        }

        Command::Status => handle_status(&config, format).await,

        Command::Config { action } => {
            handle_config(action, &config, cli.config.as_deref(), format)
        }
    }
}

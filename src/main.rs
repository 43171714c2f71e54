//! SmartEd CLI entry point.

use anyhow::Result;
use clap::Parser;
use smarted::cli::{commands, Cli, Commands};
use smarted::config::Settings;
use smarted::credential::{with_credential, Credential};
use smarted::orchestrator::ContentOrchestrator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&Settings::expand_path(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging; -v overrides the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("smarted={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match &cli.command {
        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, cli.config.as_deref())?;
        }

        command => {
            let Some(credential) = cli.api_key.as_deref().and_then(Credential::new) else {
                anyhow::bail!("No API key. Pass --api-key or set SMARTED_API_KEY.");
            };
            let orchestrator = ContentOrchestrator::new(&settings)?;
            with_credential(credential, run_feature(command, &orchestrator)).await?;
        }
    }

    Ok(())
}

/// Commands that need a credential.
async fn run_feature(command: &Commands, orchestrator: &ContentOrchestrator) -> Result<()> {
    match command {
        Commands::Transcript { url, output } => {
            commands::run_transcript(url, output.clone(), orchestrator).await
        }

        Commands::Summarize { url, max_length } => {
            commands::run_summarize(url, *max_length, orchestrator).await
        }

        Commands::Quiz { url, questions, json } => {
            commands::run_quiz(url, *questions, *json, orchestrator).await
        }

        Commands::Ask { url, question } => {
            commands::run_ask(url, question.clone(), orchestrator).await
        }

        Commands::Serve { .. } | Commands::Config { .. } => Ok(()),
    }
}

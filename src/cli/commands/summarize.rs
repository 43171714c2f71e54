//! Summarize command implementation.

use crate::cli::Output;
use crate::orchestrator::ContentOrchestrator;
use anyhow::Result;

/// Run the summarize command.
pub async fn run_summarize(
    url: &str,
    max_length: Option<u32>,
    orchestrator: &ContentOrchestrator,
) -> Result<()> {
    let max_length = max_length.unwrap_or(orchestrator.defaults().summary_max_length);

    let spinner = Output::spinner("Summarizing video...");
    let result = orchestrator.summarize(url, max_length).await;
    spinner.finish_and_clear();

    println!("\n{}\n", result?);
    Ok(())
}

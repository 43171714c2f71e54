//! Transcript command implementation.

use crate::cli::Output;
use crate::orchestrator::ContentOrchestrator;
use anyhow::Result;

/// Print or save the acquired content of a video.
pub async fn run_transcript(
    url: &str,
    output: Option<String>,
    orchestrator: &ContentOrchestrator,
) -> Result<()> {
    let spinner = Output::spinner("Fetching video content...");
    let result = orchestrator.transcript(url).await;
    spinner.finish_and_clear();
    let record = result?;

    if let Some(strategy) = &record.strategy {
        Output::info(&format!("Acquired via {}", strategy));
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &record.content)?;
            Output::success(&format!("Transcript written to {}", path));
        }
        None => println!("{}", record.content),
    }

    Ok(())
}

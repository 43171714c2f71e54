//! Quiz command implementation.

use crate::cli::Output;
use crate::orchestrator::ContentOrchestrator;
use anyhow::Result;

/// Run the quiz command.
pub async fn run_quiz(
    url: &str,
    questions: Option<u32>,
    json: bool,
    orchestrator: &ContentOrchestrator,
) -> Result<()> {
    let questions = questions.unwrap_or(orchestrator.defaults().quiz_questions);

    let spinner = Output::spinner(&format!("Writing {} questions...", questions));
    let result = orchestrator.quiz(url, questions).await;
    spinner.finish_and_clear();
    let quiz = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&quiz)?);
    } else {
        Output::header("Quiz");
        Output::quiz(&quiz);
        println!();
    }
    Ok(())
}

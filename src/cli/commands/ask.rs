//! Ask command implementation.
//!
//! With a question, answers once. Without one, runs an interactive session
//! that carries the conversation forward.

use crate::cli::Output;
use crate::orchestrator::{ContentOrchestrator, ConversationTurn};
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the ask command.
pub async fn run_ask(
    url: &str,
    question: Option<String>,
    orchestrator: &ContentOrchestrator,
) -> Result<()> {
    if let Some(question) = question {
        let spinner = Output::spinner("Thinking...");
        let result = orchestrator.ask(url, &question, &[]).await;
        spinner.finish_and_clear();
        println!("\n{}\n", result?);
        return Ok(());
    }

    // Load once up front so a bad video fails before the prompt.
    let spinner = Output::spinner("Loading video content...");
    let loaded = orchestrator.transcript(url).await;
    spinner.finish_and_clear();
    loaded?;

    println!("\n{}", style("SmartEd Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask about the video, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut history: Vec<ConversationTurn> = Vec::new();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            history.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        match orchestrator.ask(url, input, &history).await {
            Ok(answer) => {
                println!("\n{} {}\n", style("SmartEd:").cyan().bold(), answer);
                history.push(ConversationTurn {
                    question: input.to_string(),
                    answer,
                });
            }
            Err(e) => Output::error(&format!("Error: {}", e)),
        }
    }

    Ok(())
}

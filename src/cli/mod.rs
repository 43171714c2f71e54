//! CLI module for SmartEd.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// SmartEd - Video Study Assistant
///
/// Summaries, quizzes and answers for YouTube videos, from the command line
/// or over HTTP.
#[derive(Parser, Debug)]
#[command(name = "smarted")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// API key for the generation backend
    #[arg(long, env = "SMARTED_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the timestamped transcript of a video
    Transcript {
        /// YouTube URL or video id
        url: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Summarize a video
    Summarize {
        /// YouTube URL or video id
        url: String,

        /// Target length in words
        #[arg(short, long)]
        max_length: Option<u32>,
    },

    /// Generate a multiple-choice quiz for a video
    Quiz {
        /// YouTube URL or video id
        url: String,

        /// Number of questions
        #[arg(short = 'n', long)]
        questions: Option<u32>,

        /// Print the quiz as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a question about a video (interactive if no question is given)
    Ask {
        /// YouTube URL or video id
        url: String,

        /// The question to ask
        question: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration file if none exists
    Init,

    /// Show configuration file path
    Path,
}

//! SmartEd - Video Study Assistant
//!
//! Turns a YouTube video into study material: summaries, multiple-choice
//! quizzes and answers to questions about it.
//!
//! # Overview
//!
//! Video content is acquired once per video (captions first, with several
//! fallbacks down to having the generation backend transcribe the video
//! itself), cached in memory, and then reused by every feature. Every call
//! runs with the caller's own API key, established per request.
//!
//! # Architecture
//!
//! - `video` - Video reference parsing and normalization
//! - `credential` - Request-scoped API key
//! - `captions` - Caption track access
//! - `generation` - Generation backends (Gemini, OpenAI-compatible)
//! - `content` - Multi-strategy acquisition and the content cache
//! - `quiz` - Quiz payloads and validation
//! - `orchestrator` - Feature facade
//! - `config` - Settings and prompt templates
//! - `cli` - Command line and HTTP front ends
//!
//! # Example
//!
//! ```rust,no_run
//! use smarted::config::Settings;
//! use smarted::credential::{with_credential, Credential};
//! use smarted::orchestrator::ContentOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = ContentOrchestrator::new(&settings)?;
//!
//!     let key = Credential::new(std::env::var("SMARTED_API_KEY")?)
//!         .ok_or_else(|| anyhow::anyhow!("empty key"))?;
//!     let summary = with_credential(key, orchestrator.summarize("dQw4w9WgXcQ", 400)).await?;
//!     println!("{}", summary);
//!
//!     Ok(())
//! }
//! ```

pub mod captions;
pub mod cli;
pub mod config;
pub mod content;
pub mod credential;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod quiz;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, SmartEdError};

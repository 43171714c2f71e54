//! CLI command implementations.

mod ask;
mod config;
mod quiz;
mod serve;
mod summarize;
mod transcript;

pub use ask::run_ask;
pub use config::run_config;
pub use quiz::run_quiz;
pub use serve::{router, run_serve};
pub use summarize::run_summarize;
pub use transcript::run_transcript;

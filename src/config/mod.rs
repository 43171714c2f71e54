//! Configuration module for SmartEd.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{PromptPair, Prompts};
pub use settings::{
    CacheSettings, CaptionSettings, FeatureDefaults, GeneralSettings, GenerationProvider,
    GenerationSettings, PromptSettings, ServerSettings, Settings,
};

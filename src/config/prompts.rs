//! Prompt templates for SmartEd.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory
//! (`transcribe.toml`, `summary.toml`, `quiz.toml`, `ask.toml`).

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid regex"))
}

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// Generative fallback that turns the video itself into a transcript.
    pub transcribe: PromptPair,
    pub summary: PromptPair,
    pub quiz: PromptPair,
    pub ask: PromptPair,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// A system instruction and a user prompt template.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            transcribe: PromptPair {
                system: r#"You are a careful transcriber. You receive a video and return what is said in it.

Rules:
- Output spoken words only. No visual descriptions, no commentary, no summary.
- Start every utterance on a new line with a [MM:SS] timestamp (use [HH:MM:SS] past one hour).
- Label speakers as "Speaker 1:", "Speaker 2:" and so on, or by name when the video states it.
- Keep the original language. Do not translate.
- If a passage is inaudible, write [inaudible] instead of guessing."#
                    .to_string(),
                user: "Transcribe the spoken content of this video ({{video_url}}) following the rules above."
                    .to_string(),
            },

            summary: PromptPair {
                system: r#"You are a study assistant that writes well-structured markdown summaries of videos.

Content:
- Capture the most important concepts, facts and conclusions in their original order.
- Keep names, numbers, dates and technical terms.
- Do not add opinions that are not in the source.

Format:
- One short # title.
- A two to three sentence introduction with **bold** key terms.
- ## Overview, ## Key Points, ## Important Details and ## Key Takeaways sections.
- Bullet points for lists, nested bullets for examples, > for crucial quotes.
- No horizontal rules."#
                    .to_string(),
                user: r#"Summarize the following video content.

VIDEO CONTENT:
{{content}}

Keep the summary under and close to {{max_length}} words. End with 3-5 key takeaways."#
                    .to_string(),
            },

            quiz: PromptPair {
                system: r#"You write multiple-choice quizzes that check understanding of a video.

Rules:
- Every question must be answerable from the video content.
- Mix recall, application and analysis questions; include at least one analysis question.
- Each question has exactly four options labeled A, B, C and D, exactly one of which is correct.
- Distractors must be plausible.
- Give a one or two sentence explanation of the correct answer.
- Respond with JSON only: {"questions": [{"question", "options": {"A","B","C","D"}, "correct_answer", "explanation"}]}."#
                    .to_string(),
                user: r#"Write exactly {{question_count}} multiple-choice questions about this video content.

VIDEO CONTENT:
{{content}}"#
                    .to_string(),
            },

            ask: PromptPair {
                system: r#"You are SmartEd AI, an educational assistant. Answer every question the user asks.

- If the question is about the video, base the answer strictly on the video content provided.
- If the question is not about the video, answer from general knowledge.
- Use the previous conversation to keep answers consistent.
- If it is unclear whether the question concerns the video, say which interpretation you answered."#
                    .to_string(),
                user: r#"VIDEO CONTENT:
{{content}}

CONVERSATION SO FAR:
{{history}}

QUESTION:
{{question}}"#
                    .to_string(),
            },

            variables: HashMap::new(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            load_override(&custom_path.join("transcribe.toml"), &mut prompts.transcribe)?;
            load_override(&custom_path.join("summary.toml"), &mut prompts.summary)?;
            load_override(&custom_path.join("quiz.toml"), &mut prompts.quiz)?;
            load_override(&custom_path.join("ask.toml"), &mut prompts.ask)?;
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// One pass over the template: substituted values are never rescanned,
    /// and unknown placeholders are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        placeholder_regex()
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

/// Replace the non-empty fields of `target` with those found in `path`.
fn load_override(path: &Path, target: &mut PromptPair) -> crate::error::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let content = std::fs::read_to_string(path)?;
    let custom: PromptPair = toml::from_str(&content)?;
    if !custom.system.is_empty() {
        target.system = custom.system;
    }
    if !custom.user.is_empty() {
        target.user = custom.user;
    }
    Ok(())
}

//! Multiple-choice quiz payloads.
//!
//! Generation output is parsed and validated as a whole: a quiz either has
//! exactly the requested number of well-formed questions or it is rejected.

use crate::error::{Result, SmartEdError};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Option label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerLabel {
    A,
    B,
    C,
    D,
}

impl std::fmt::Display for AnswerLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AnswerLabel::A => "A",
            AnswerLabel::B => "B",
            AnswerLabel::C => "C",
            AnswerLabel::D => "D",
        };
        write!(f, "{}", label)
    }
}

/// The four answer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuizOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl QuizOptions {
    pub fn get(&self, label: AnswerLabel) -> &str {
        match label {
            AnswerLabel::A => &self.a,
            AnswerLabel::B => &self.b,
            AnswerLabel::C => &self.c,
            AnswerLabel::D => &self.d,
        }
    }

    /// Options in label order.
    pub fn iter(&self) -> impl Iterator<Item = (AnswerLabel, &str)> {
        [AnswerLabel::A, AnswerLabel::B, AnswerLabel::C, AnswerLabel::D]
            .into_iter()
            .map(move |label| (label, self.get(label)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: QuizOptions,
    pub correct_answer: AnswerLabel,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Parse generator output and check it holds exactly `expected` valid questions.
    ///
    /// Markdown code fences around the JSON are tolerated.
    pub fn parse(response: &str, expected: usize) -> Result<Self> {
        let json_str = strip_code_fence(response);

        let quiz: Quiz = serde_json::from_str(json_str).map_err(|e| {
            SmartEdError::MalformedGenerationOutput(format!(
                "quiz is not valid JSON: {}. Response was: {}",
                e,
                preview(response)
            ))
        })?;

        quiz.validate(expected)?;
        Ok(quiz)
    }

    fn validate(&self, expected: usize) -> Result<()> {
        if self.questions.len() != expected {
            return Err(SmartEdError::MalformedGenerationOutput(format!(
                "expected {} questions, got {}",
                expected,
                self.questions.len()
            )));
        }

        for (i, q) in self.questions.iter().enumerate() {
            let n = i + 1;
            if q.question.trim().is_empty() {
                return Err(malformed(n, "empty question text"));
            }
            if let Some((label, _)) = q.options.iter().find(|(_, text)| text.trim().is_empty()) {
                return Err(malformed(n, &format!("option {} is empty", label)));
            }
            if q.explanation.trim().is_empty() {
                return Err(malformed(n, "missing explanation"));
            }
        }
        Ok(())
    }

    /// JSON schema for structured generation output.
    pub fn response_schema() -> serde_json::Value {
        let text = json!({ "type": "string" });
        json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "question": text,
                            "options": {
                                "type": "object",
                                "properties": { "A": text, "B": text, "C": text, "D": text },
                                "required": ["A", "B", "C", "D"],
                                "additionalProperties": false
                            },
                            "correct_answer": { "type": "string", "enum": ["A", "B", "C", "D"] },
                            "explanation": text
                        },
                        "required": ["question", "options", "correct_answer", "explanation"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["questions"],
            "additionalProperties": false
        })
    }
}

fn malformed(question: usize, problem: &str) -> SmartEdError {
    SmartEdError::MalformedGenerationOutput(format!("question {}: {}", question, problem))
}

/// Strip a surrounding ```json ... ``` fence if present.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn preview(response: &str) -> String {
    response.chars().take(300).collect()
}

//! Output-side data model: generation modes, flashcards, quiz items and
//! per-run statistics.
//!
//! [`GenerationResult`] serialises with serde's external tagging, which
//! produces exactly the wire shape the frontend expects:
//! `{"flashcards": [...]}` or `{"quiz": [...]}`.

use crate::document::SourceFormat;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The requested output kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Flashcards,
    Quiz,
}

impl GenerationMode {
    /// Top-level JSON key the model must emit for this mode.
    pub fn key(&self) -> &'static str {
        match self {
            GenerationMode::Flashcards => "flashcards",
            GenerationMode::Quiz => "quiz",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for GenerationMode {
    type Err = PipelineError;

    /// Parse a mode field. Only `flashcards` and `quiz` are accepted; there is
    /// no default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "flashcards" => Ok(GenerationMode::Flashcards),
            "quiz" => Ok(GenerationMode::Quiz),
            other => Err(PipelineError::InvalidRequest(format!(
                "Invalid mode '{other}': expected 'flashcards' or 'quiz'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct: String,
}

/// Validated study material, matching the requested [`GenerationMode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationResult {
    Flashcards(Vec<Flashcard>),
    Quiz(Vec<QuizItem>),
}

impl GenerationResult {
    pub fn mode(&self) -> GenerationMode {
        match self {
            GenerationResult::Flashcards(_) => GenerationMode::Flashcards,
            GenerationResult::Quiz(_) => GenerationMode::Quiz,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            GenerationResult::Flashcards(cards) => cards.len(),
            GenerationResult::Quiz(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Statistics for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStats {
    pub source_format: SourceFormat,
    /// Extraction strategy that produced the text.
    pub extraction_strategy: String,
    /// Characters of text extracted from the document.
    pub extracted_chars: usize,
    /// Whether the text was cut to fit the prompt budget.
    pub truncated: bool,
    /// Items present in the model's JSON before validation.
    pub items_received: usize,
    /// Items removed by the validation gate.
    pub items_dropped: usize,
    /// Gateway calls made, including retries.
    pub attempts: u32,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub result: GenerationResult,
    pub stats: GenerationStats,
}

//! Prompts for flashcard and quiz generation.
//!
//! Each mode's JSON schema is spelled out once, in its system prompt, and
//! must match the keys [`crate::pipeline::postprocess`] checks for.
//!
//! [`PromptBuilder::build`] is a pure function of its inputs: no I/O, and
//! identical inputs always render identical prompts.

use crate::config::{DEFAULT_MAX_INPUT_CHARS, DEFAULT_MIN_ITEMS};
use crate::output::GenerationMode;

/// Placeholder replaced with the requested minimum item count.
const MIN_ITEMS_PLACEHOLDER: &str = "{min_items}";

/// System prompt for flashcard mode.
pub const FLASHCARDS_SYSTEM_PROMPT: &str = r#"You are an AI that creates study flashcards from any given text.

Follow these rules precisely:

1. CONTENT
   - Create at least {min_items} flashcards covering the key facts, definitions and concepts
   - Each question must be answerable from the text alone
   - Keep answers short and precise

2. OUTPUT FORMAT
   - Respond in strict JSON with exactly this structure:
     {"flashcards": [{"question": "string", "answer": "string"}]}
   - Output ONLY the JSON object
   - Do NOT wrap it in markdown code fences (no ```json)
   - Do NOT add commentary or explanations before or after the JSON"#;

/// System prompt for quiz mode.
pub const QUIZ_SYSTEM_PROMPT: &str = r#"You are an AI that creates multiple-choice quizzes from any given text.

Follow these rules precisely:

1. CONTENT
   - Create at least {min_items} questions covering the key facts and concepts
   - Give every question 4 distinct options
   - Exactly one option is correct; "correct" must repeat that option's text verbatim

2. OUTPUT FORMAT
   - Respond in strict JSON with exactly this structure:
     {"quiz": [{"question": "string", "options": ["string", "string", "string", "string"], "correct": "string"}]}
   - Output ONLY the JSON object
   - Do NOT wrap it in markdown code fences (no ```json)
   - Do NOT add commentary or explanations before or after the JSON"#;

/// A rendered system/user instruction pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Whether the input text was cut to fit the budget.
    pub truncated: bool,
}

/// Renders prompts with a fixed text budget and item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    pub max_input_chars: usize,
    pub min_items: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            min_items: DEFAULT_MIN_ITEMS,
        }
    }
}

impl PromptBuilder {
    pub fn new(max_input_chars: usize, min_items: usize) -> Self {
        Self {
            max_input_chars,
            min_items,
        }
    }

    /// Render the prompt pair for `text` in `mode`.
    pub fn build(&self, text: &str, mode: GenerationMode) -> Prompt {
        let (content, truncated) = truncate_chars(text.trim(), self.max_input_chars);
        let template = match mode {
            GenerationMode::Flashcards => FLASHCARDS_SYSTEM_PROMPT,
            GenerationMode::Quiz => QUIZ_SYSTEM_PROMPT,
        };
        let system = template.replace(MIN_ITEMS_PLACEHOLDER, &self.min_items.to_string());
        let task = match mode {
            GenerationMode::Flashcards => {
                format!("Generate at least {} clear flashcards", self.min_items)
            }
            GenerationMode::Quiz => format!(
                "Generate at least {} quiz questions with options and the correct answer",
                self.min_items
            ),
        };
        let user = format!(
            "{task} from the following study material. Respond in JSON format only.\n\nContent:\n\"\"\"\n{content}\n\"\"\""
        );
        Prompt {
            system,
            user,
            truncated,
        }
    }
}

/// Render a prompt with the default budget and item count.
pub fn build_prompt(text: &str, mode: GenerationMode) -> Prompt {
    PromptBuilder::default().build(text, mode)
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

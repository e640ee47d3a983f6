//! Validation gate: turn the model's untyped item list into typed
//! [`Flashcard`]s or [`QuizItem`]s.
//!
//! Individual bad items are dropped, not fatal. The response as a whole only
//! fails when nothing survives, or when a quiz answer is missing from its
//! options under [`CorrectAnswerPolicy::Reject`].

use crate::config::CorrectAnswerPolicy;
use crate::error::PipelineError;
use crate::output::{Flashcard, GenerationMode, GenerationResult, QuizItem};
use serde_json::Value;
use tracing::debug;

/// Minimum number of answer options a quiz item must carry.
pub const MIN_QUIZ_OPTIONS: usize = 2;

/// Output of [`gate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub result: GenerationResult,
    /// Items present before validation.
    pub received: usize,
    /// Items removed by validation.
    pub dropped: usize,
}

/// Why a single item was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    Invalid(&'static str),
    AnswerNotInOptions,
}

/// Validate `items` for `mode`, applying `policy` to quiz answers.
///
/// `raw` is the original completion, used only for the error preview.
pub fn gate(
    items: Vec<Value>,
    mode: GenerationMode,
    policy: CorrectAnswerPolicy,
    raw: &str,
) -> Result<Validated, PipelineError> {
    let received = items.len();

    let result = match mode {
        GenerationMode::Flashcards => {
            let cards: Vec<Flashcard> = items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match flashcard(item) {
                    Ok(card) => Some(card),
                    Err(reason) => {
                        debug!("dropping flashcard {i}: {reason:?}");
                        None
                    }
                })
                .collect();
            GenerationResult::Flashcards(cards)
        }
        GenerationMode::Quiz => {
            let mut kept = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match quiz_item(item, policy) {
                    Ok(q) => kept.push(q),
                    Err(Rejection::AnswerNotInOptions) if policy == CorrectAnswerPolicy::Reject => {
                        return Err(PipelineError::malformed(
                            format!("quiz item {} has a correct answer that is not one of its options", i + 1),
                            raw,
                        ));
                    }
                    Err(reason) => debug!("dropping quiz item {i}: {reason:?}"),
                }
            }
            GenerationResult::Quiz(kept)
        }
    };

    if result.is_empty() {
        let reason = if received == 0 {
            format!("'{}' list is empty", mode.key())
        } else {
            format!("none of the {received} {} items were valid", mode.key())
        };
        return Err(PipelineError::malformed(reason, raw));
    }

    let dropped = received - result.len();
    Ok(Validated {
        result,
        received,
        dropped,
    })
}

fn flashcard(item: &Value) -> Result<Flashcard, Rejection> {
    Ok(Flashcard {
        question: required_str(item, "question")?,
        answer: required_str(item, "answer")?,
    })
}

fn quiz_item(item: &Value, policy: CorrectAnswerPolicy) -> Result<QuizItem, Rejection> {
    let question = required_str(item, "question")?;
    let options: Vec<String> = item
        .get("options")
        .and_then(Value::as_array)
        .ok_or(Rejection::Invalid("options is not a list"))?
        .iter()
        .map(|o| non_empty(o).ok_or(Rejection::Invalid("option is not a non-empty string")))
        .collect::<Result<_, _>>()?;
    if options.len() < MIN_QUIZ_OPTIONS {
        return Err(Rejection::Invalid("fewer than two options"));
    }
    let correct = required_str(item, "correct")?;

    if policy != CorrectAnswerPolicy::Ignore
        && !options.iter().any(|o| o.trim() == correct.trim())
    {
        return Err(Rejection::AnswerNotInOptions);
    }
    Ok(QuizItem {
        question,
        options,
        correct,
    })
}

fn required_str(item: &Value, field: &'static str) -> Result<String, Rejection> {
    item.get(field)
        .and_then(non_empty)
        .ok_or(Rejection::Invalid(field))
}

/// Blank-after-trim strings count as missing; kept strings are returned as sent.
fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

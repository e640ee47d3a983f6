//! Response normalisation: recover a strict JSON object from a completion.
//!
//! ## Why is normalisation necessary?
//!
//! Even when told to emit bare JSON, chat models regularly:
//!
//! - wrap the object in ` ```json ... ``` ` fences
//! - prefix it with "Sure! Here are your flashcards:" or append a closing remark
//! - add a trailing sentence that happens to contain a brace
//!
//! The stages below undo those habits without guessing at content. Each is
//! a pure function, and they run in a fixed order with early exit on the
//! first stage that yields a JSON object:
//!
//! 1. Strip every fence marker (` ```json ` and bare ` ``` `), wherever it appears
//! 2. Trim boundary noise before the first `{`/`[` and after the last `}`/`]`
//! 3. Parse the trimmed text directly
//! 4. Fall back to the first balanced `{...}` in the fence-stripped text
//!
//! Only then is the schema checked: the object must carry the mode's
//! top-level key holding a list, and the items go through the
//! [validation gate](crate::pipeline::validate).

use crate::config::CorrectAnswerPolicy;
use crate::error::PipelineError;
use crate::output::GenerationMode;
use crate::pipeline::validate::{gate, Validated};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// Normalise `raw` into a validated result for `mode`.
pub fn normalize(
    raw: &str,
    mode: GenerationMode,
    policy: CorrectAnswerPolicy,
) -> Result<Validated, PipelineError> {
    let object = parse_completion(raw)?;
    let items = schema_items(object, mode, raw)?;
    gate(items, mode, policy, raw)
}

/// Stages 1–4: recover the first JSON object the completion contains.
pub fn parse_completion(raw: &str) -> Result<Map<String, Value>, PipelineError> {
    if raw.trim().is_empty() {
        return Err(PipelineError::malformed("completion was empty", raw));
    }

    let stripped = strip_fences(raw);
    let trimmed = trim_boundary(&stripped);

    match parse_direct(trimmed) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => debug!("direct parse yielded {}, not an object", json_type(&other)),
        Err(e) => debug!("direct parse failed: {e}"),
    }

    extract_balanced_object(&stripped).ok_or_else(|| {
        PipelineError::malformed("no JSON object found in the completion", raw)
    })
}

/// Check the top-level key for `mode` and return its items.
fn schema_items(
    mut object: Map<String, Value>,
    mode: GenerationMode,
    raw: &str,
) -> Result<Vec<Value>, PipelineError> {
    match object.remove(mode.key()) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(PipelineError::malformed(
            format!("'{}' is {}, expected a list", mode.key(), json_type(&other)),
            raw,
        )),
        None => Err(PipelineError::malformed(
            format!("missing '{}' key", mode.key()),
            raw,
        )),
    }
}

// ── Stage 1: Strip fence markers ─────────────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```[ \t]*(?:json)?").unwrap());

pub fn strip_fences(input: &str) -> String {
    RE_FENCE.replace_all(input, "").into_owned()
}

// ── Stage 2: Trim boundary noise ─────────────────────────────────────────

/// Cut everything before the first `{`/`[` and after the last `}`/`]`.
///
/// Input without a plausible JSON span is returned trimmed but otherwise
/// unchanged, so the direct parse reports the real problem.
pub fn trim_boundary(input: &str) -> &str {
    let start = input.find(['{', '[']);
    let end = input.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if s < e => &input[s..=e],
        _ => input.trim(),
    }
}

// ── Stage 3: Direct parse ────────────────────────────────────────────────

pub fn parse_direct(input: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(input)
}

// ── Stage 4: Balanced-object fallback ────────────────────────────────────

/// The first `{...}` span with balanced braces that parses as an object.
///
/// Braces inside JSON strings are skipped, so `"a } b"` does not close the
/// span early. Each `{` is tried as a start in turn; a stray brace in
/// leading commentary does not hide a valid object after it.
pub fn extract_balanced_object(input: &str) -> Option<Map<String, Value>> {
    let mut from = 0;
    while let Some(offset) = input[from..].find('{') {
        let start = from + offset;
        if let Some(end) = balanced_end(&input[start..]) {
            if let Ok(Value::Object(map)) = parse_direct(&input[start..start + end]) {
                return Some(map);
            }
        }
        from = start + 1;
    }
    None
}

/// Byte length of the balanced span opening at `s[0] == '{'`.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

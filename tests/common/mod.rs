//! Shared fixtures and scripted model providers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use flashgen::{CompletionProvider, PipelineConfig, PipelineError, Prompt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ── Providers ────────────────────────────────────────────────────────────────

/// Replays canned replies in order; errors once the script runs out.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, PipelineError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, PipelineError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _prompt: &Prompt) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::Internal("script exhausted".into())))
    }
}

/// Answers with one fenced flashcard whose answer is the prompt's content
/// block, so each caller can see which document reached the model.
pub struct EchoProvider;

#[async_trait]
impl CompletionProvider for EchoProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, PipelineError> {
        let content = prompt
            .user
            .split("\"\"\"")
            .nth(1)
            .unwrap_or_default()
            .trim()
            .to_string();
        tokio::task::yield_now().await;
        let body = serde_json::json!({
            "flashcards": [{"question": "What does the document say?", "answer": content}]
        });
        Ok(format!("```json\n{body}\n```"))
    }
}

pub fn config() -> PipelineConfig {
    PipelineConfig::builder().build().unwrap()
}

// ── Documents ────────────────────────────────────────────────────────────────

#[path = "../../src/pipeline/fixtures.rs"]
pub mod fixtures;

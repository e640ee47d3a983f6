//! # flashgen
//!
//! Turn uploaded study documents into flashcards or multiple-choice quizzes
//! with a chat-completions model.
//!
//! ## Why this crate?
//!
//! Asking a model for JSON is easy; getting JSON back reliably is not. Models
//! wrap their answer in code fences, chat before and after it, or drop a
//! field from one item in ten. Documents are just as unruly: a PDF one
//! engine chokes on opens fine in another, and a scanned page has no text at
//! all. This crate puts a fallback chain on both ends and reports every
//! terminal failure as a typed [`PipelineError`], never as an empty success.
//!
//! ## Pipeline Overview
//!
//! ```text
//! UploadedDocument (bytes + media type + filename)
//!  │
//!  ├─ 1. Extract    pdf-extract → lopdf | DOCX XML | PPTX XML | UTF-8
//!  ├─ 2. Prompt     truncate to budget, state the JSON schema
//!  ├─ 3. Gateway    POST system+user messages (OpenRouter / Groq)
//!  ├─ 4. Normalise  strip fences → trim → parse → balanced-object fallback
//!  └─ 5. Validate   drop incomplete items, check quiz answers
//!  │
//! GenerationResult {"flashcards": [...]} | {"quiz": [...]}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flashgen::{GenerationMode, GenerationResult, Pipeline, PipelineConfig, UploadedDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .api_key(std::env::var("OPENROUTER_API_KEY")?)
//!         .build()?;
//!     let pipeline = Pipeline::new(config)?;
//!
//!     let bytes = std::fs::read("lecture.pdf")?;
//!     let doc = UploadedDocument::new(bytes, Some("application/pdf".into()), "lecture.pdf");
//!     let output = pipeline.generate(&doc, GenerationMode::Flashcards).await?;
//!
//!     if let GenerationResult::Flashcards(cards) = output.result {
//!         for card in cards {
//!             println!("Q: {}\nA: {}\n", card.question, card.answer);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `flashgen` binary (clap + anyhow + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when embedding the library or the router in another service:
//! ```toml
//! flashgen = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CorrectAnswerPolicy, GatewayConfig, PipelineConfig, PipelineConfigBuilder, Provider,
    ServerConfig,
};
pub use document::{ExtractionResult, SourceFormat, UploadedDocument};
pub use error::{ErrorKind, PipelineError, StrategyError};
pub use generate::{generate, Pipeline};
pub use output::{
    Flashcard, GenerationMode, GenerationOutput, GenerationResult, GenerationStats, QuizItem,
};
pub use pipeline::extract::{Extractor, TextStrategy};
pub use pipeline::llm::{ChatCompletionsGateway, CompletionProvider};
pub use prompts::{build_prompt, Prompt, PromptBuilder};
pub use server::{router, serve, AppState};

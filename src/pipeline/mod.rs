//! Pipeline stages for document-to-study-material generation.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and engines can be swapped without touching the
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ prompts ──▶ llm ──▶ postprocess ──▶ validate
//! (bytes)     (render)    (HTTP)  (JSON recovery)  (typed items)
//! ```
//!
//! 1. [`extract`]:  pick the engines for the detected format and run them
//!    in order inside `spawn_blocking`; first non-blank text wins
//! 2. [`formats`]:  the built-in engines (UTF-8, pdf-extract, lopdf, DOCX, PPTX)
//! 3. [`llm`]:      the only stage with network I/O
//! 4. [`postprocess`]: fence stripping, boundary trimming and the
//!    balanced-object fallback
//! 5. [`validate`]: drop incomplete items, enforce the quiz answer policy
//!
//! Prompt rendering lives in [`crate::prompts`].

pub mod extract;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod formats;
pub mod llm;
pub mod postprocess;
pub mod validate;

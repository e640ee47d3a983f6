//! End-to-end generation: one uploaded document in, one validated
//! [`GenerationResult`](crate::output::GenerationResult) out.
//!
//! Stages run strictly in order and nothing is shared between runs except
//! read-only configuration and the pooled HTTP client, so one [`Pipeline`]
//! behind an `Arc` serves any number of concurrent requests.
//!
//! ## Retries
//!
//! Off by default (`max_retries = 0`). When enabled, only
//! [retryable](PipelineError::is_retryable) failures repeat the gateway call,
//! with exponential backoff (`retry_backoff_ms * 2^(attempt-1)`). Extraction
//! and prompt rendering are never repeated.

use crate::config::PipelineConfig;
use crate::document::UploadedDocument;
use crate::error::PipelineError;
use crate::output::{GenerationMode, GenerationOutput, GenerationStats};
use crate::pipeline::extract::Extractor;
use crate::pipeline::llm::{ChatCompletionsGateway, CompletionProvider};
use crate::pipeline::postprocess;
use crate::pipeline::validate::Validated;
use crate::prompts::{Prompt, PromptBuilder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// The composed extractor, prompt builder, gateway and normaliser.
#[derive(Clone)]
pub struct Pipeline {
    extractor: Extractor,
    prompts: PromptBuilder,
    provider: Arc<dyn CompletionProvider>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Build a pipeline that talks to the configured chat-completions endpoint.
    ///
    /// A missing API key is not an error here; every generation fails with
    /// [`PipelineError::MissingCredential`] instead, before any network call.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let gateway = ChatCompletionsGateway::new(config.gateway.clone())?;
        Ok(Self::with_provider(config, Arc::new(gateway)))
    }

    /// Build a pipeline around any [`CompletionProvider`].
    pub fn with_provider(config: PipelineConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            extractor: Extractor::with_defaults(Duration::from_secs(config.extract_timeout_secs)),
            prompts: PromptBuilder::new(config.max_input_chars, config.min_items),
            provider,
            config,
        }
    }

    /// Replace the extraction engines.
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one document through every stage.
    ///
    /// # Errors
    /// Returns the first terminal failure, after the stage's own fallbacks
    /// (secondary PDF engine, balanced-object parse) and any configured
    /// retries are exhausted. Never returns an empty result as success.
    pub async fn generate(
        &self,
        document: &UploadedDocument,
        mode: GenerationMode,
    ) -> Result<GenerationOutput, PipelineError> {
        let total_start = Instant::now();
        info!(
            "Generating {} from '{}' ({} bytes)",
            mode,
            document.filename(),
            document.len()
        );

        // ── Step 1: Extract text ─────────────────────────────────────────
        let extract_start = Instant::now();
        let extraction = self.extractor.extract(document).await?;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        let extracted_chars = extraction.text.chars().count();

        // ── Step 2: Render prompt ────────────────────────────────────────
        let prompt = self.prompts.build(&extraction.text, mode);
        if prompt.truncated {
            debug!(
                "Text truncated from {} to {} chars",
                extracted_chars, self.prompts.max_input_chars
            );
        }

        // ── Step 3: Call the model and normalise its reply ───────────────
        let llm_start = Instant::now();
        let (validated, attempts) = self.complete_with_retry(&prompt, mode).await?;
        let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

        // ── Step 4: Assemble output ──────────────────────────────────────
        let stats = GenerationStats {
            source_format: extraction.format,
            extraction_strategy: extraction.strategy.to_string(),
            extracted_chars,
            truncated: prompt.truncated,
            items_received: validated.received,
            items_dropped: validated.dropped,
            attempts,
            extract_duration_ms,
            llm_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Generated {} {} item(s) ({} dropped) in {}ms",
            validated.result.len(),
            mode,
            validated.dropped,
            stats.total_duration_ms
        );

        Ok(GenerationOutput {
            result: validated.result,
            stats,
        })
    }

    async fn complete_with_retry(
        &self,
        prompt: &Prompt,
        mode: GenerationMode,
    ) -> Result<(Validated, u32), PipelineError> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let backoff = backoff_ms(self.config.retry_backoff_ms, attempt);
                warn!("retry {}/{} after {}ms", attempt, max_retries, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }

            let outcome = match self.provider.complete(prompt).await {
                Ok(raw) => postprocess::normalize(&raw, mode, self.config.correct_answer_policy),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(validated) => return Ok((validated, attempt + 1)),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    warn!("attempt {} failed: {}", attempt + 1, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Generate study material from `document` with a one-off [`Pipeline`].
///
/// Prefer building one [`Pipeline`] and reusing it when handling more than
/// a single document; it keeps the HTTP connection pool warm.
pub async fn generate(
    document: &UploadedDocument,
    mode: GenerationMode,
    config: PipelineConfig,
) -> Result<GenerationOutput, PipelineError> {
    Pipeline::new(config)?.generate(document, mode).await
}

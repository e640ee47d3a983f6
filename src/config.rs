//! Configuration types for the generation pipeline and HTTP server.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. The configuration is constructed once at start-up
//! (the binary maps environment variables and flags onto it) and passed
//! explicitly into the pipeline, so nothing below this layer reads the
//! process environment.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default prompt budget for extracted text, in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 6000;

/// Default minimum number of items requested from the model.
pub const DEFAULT_MIN_ITEMS: usize = 10;

// ── Provider ─────────────────────────────────────────────────────────────

/// OpenAI-compatible chat-completions providers with known defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenRouter (default).
    #[default]
    OpenRouter,
    /// Groq.
    Groq,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::Groq => "groq",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            Provider::Groq => "https://api.groq.com/openai/v1/chat/completions",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "google/gemma-2-9b-it:free",
            Provider::Groq => "llama-3.1-8b-instant",
        }
    }

    /// Environment variable conventionally holding this provider's key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Provider::OpenRouter),
            "groq" => Ok(Provider::Groq),
            other => Err(PipelineError::InvalidRequest(format!(
                "Unknown provider '{other}': expected 'openrouter' or 'groq'"
            ))),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────────────

/// Connection settings for the model gateway.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub provider: Provider,

    /// Full URL of the chat-completions endpoint.
    pub endpoint: String,

    /// Bearer token. `None` makes every call fail fast with
    /// [`PipelineError::MissingCredential`].
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model identifier, e.g. `google/gemma-2-9b-it:free`.
    pub model: String,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Low enough that the model sticks to the requested JSON shape, high
    /// enough that repeated uploads of the same notes yield some variety.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    ///
    /// Ten quiz items with four options each fit comfortably; much lower and
    /// the JSON gets cut off mid-array.
    pub max_tokens: usize,

    /// Upper bound on one gateway call, in seconds. Default: 45.
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Defaults for `provider`, with no API key.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            endpoint: provider.default_endpoint().to_string(),
            api_key: None,
            model: provider.default_model().to_string(),
            temperature: 0.3,
            max_tokens: 2048,
            timeout_secs: 45,
        }
    }

    /// The API key, treating an empty string as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.credential().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// What the validation gate does with a quiz item whose `correct` answer is
/// not one of its `options`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectAnswerPolicy {
    /// Fail the whole response as malformed.
    Reject,
    /// Drop the offending item and keep the rest. (default)
    #[default]
    DropItem,
    /// Accept the item unchanged.
    Ignore,
}

impl FromStr for CorrectAnswerPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reject" => Ok(CorrectAnswerPolicy::Reject),
            "drop_item" | "drop" => Ok(CorrectAnswerPolicy::DropItem),
            "ignore" => Ok(CorrectAnswerPolicy::Ignore),
            other => Err(PipelineError::InvalidRequest(format!(
                "Unknown correct-answer policy '{other}': expected reject, drop_item or ignore"
            ))),
        }
    }
}

/// Configuration for a [`crate::Pipeline`].
///
/// # Example
/// ```rust
/// use flashgen::{GatewayConfig, PipelineConfig, Provider};
///
/// let mut gateway = GatewayConfig::for_provider(Provider::Groq);
/// gateway.api_key = Some("gsk_test".into());
///
/// let config = PipelineConfig::builder()
///     .gateway(gateway)
///     .max_input_chars(8000)
///     .min_items(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_input_chars, 8000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub gateway: GatewayConfig,

    /// Characters of extracted text embedded in the prompt. Default: 6000.
    ///
    /// Bounds token cost and keeps requests under provider size limits.
    /// Longer documents are cut at this many characters.
    pub max_input_chars: usize,

    /// Minimum number of flashcards or questions requested. Default: 10.
    pub min_items: usize,

    /// Handling of quiz items whose answer is not among the options.
    pub correct_answer_policy: CorrectAnswerPolicy,

    /// Upper bound on text extraction, in seconds. Default: 30.
    pub extract_timeout_secs: u64,

    /// Extra gateway attempts on retryable failures. Default: 0.
    ///
    /// Only transport failures and malformed model output are retried;
    /// rejected requests and missing credentials are surfaced immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            min_items: DEFAULT_MIN_ITEMS,
            correct_answer_policy: CorrectAnswerPolicy::default(),
            extract_timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn gateway(mut self, gateway: GatewayConfig) -> Self {
        self.config.gateway = gateway;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gateway.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.gateway.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.gateway.endpoint = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.gateway.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.gateway.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.gateway.timeout_secs = secs;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n;
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.config.min_items = n;
        self
    }

    pub fn correct_answer_policy(mut self, policy: CorrectAnswerPolicy) -> Self {
        self.config.correct_answer_policy = policy;
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.max_input_chars < 100 {
            return Err(PipelineError::Internal(format!(
                "Invalid configuration: max_input_chars must be >= 100, got {}",
                c.max_input_chars
            )));
        }
        if c.min_items == 0 {
            return Err(PipelineError::Internal(
                "Invalid configuration: min_items must be >= 1".into(),
            ));
        }
        if c.gateway.timeout_secs == 0 || c.extract_timeout_secs == 0 {
            return Err(PipelineError::Internal(
                "Invalid configuration: timeouts must be >= 1s".into(),
            ));
        }
        if c.gateway.endpoint.trim().is_empty() || c.gateway.model.trim().is_empty() {
            return Err(PipelineError::Internal(
                "Invalid configuration: endpoint and model must be set".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// Settings for the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser. `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Parse a comma-separated origin list, dropping blanks.
    pub fn parse_origins(list: &str) -> Vec<String> {
        list.split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.max_input_chars, DEFAULT_MAX_INPUT_CHARS);
        assert_eq!(c.min_items, 10);
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.correct_answer_policy, CorrectAnswerPolicy::DropItem);
        assert_eq!(c.gateway.provider, Provider::OpenRouter);
        assert!(c.gateway.endpoint.starts_with("https://openrouter.ai/"));
        assert!(c.gateway.credential().is_none());
    }

    #[test]
    fn builder_validates() {
        assert!(PipelineConfig::builder().max_input_chars(10).build().is_err());
        assert!(PipelineConfig::builder().min_items(0).build().is_err());
        assert!(PipelineConfig::builder().api_timeout_secs(0).build().is_err());
        let c = PipelineConfig::builder()
            .api_key("sk-test")
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.gateway.temperature, 2.0);
        assert_eq!(c.gateway.credential(), Some("sk-test"));
    }

    #[test]
    fn blank_key_is_no_key() {
        let mut g = GatewayConfig::default();
        g.api_key = Some("   ".into());
        assert!(g.credential().is_none());
    }

    #[test]
    fn debug_redacts_key() {
        let mut g = GatewayConfig::for_provider(Provider::Groq);
        g.api_key = Some("gsk_secret".into());
        let dbg = format!("{g:?}");
        assert!(!dbg.contains("gsk_secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
        assert!(g.endpoint.contains("groq.com"));
    }

    #[test]
    fn parse_enums() {
        assert_eq!("Groq".parse::<Provider>().unwrap(), Provider::Groq);
        assert!("openai".parse::<Provider>().is_err());
        assert_eq!(
            "drop-item".parse::<CorrectAnswerPolicy>().unwrap(),
            CorrectAnswerPolicy::DropItem
        );
        assert_eq!(
            "REJECT".parse::<CorrectAnswerPolicy>().unwrap(),
            CorrectAnswerPolicy::Reject
        );
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            ServerConfig::parse_origins(" http://localhost:5173/, ,https://app.example "),
            vec!["http://localhost:5173", "https://app.example"]
        );
    }
}

//! CLI binary for flashgen.
//!
//! `flashgen serve` runs the HTTP backend; `flashgen generate` runs one
//! document through the pipeline and prints the result. Both map flags and
//! environment variables onto the library's config types and nothing more.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use flashgen::{
    serve, CorrectAnswerPolicy, GatewayConfig, GenerationMode, GenerationOutput,
    GenerationResult, Pipeline, PipelineConfig, Provider, ServerConfig, UploadedDocument,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the backend on port 5000 for a frontend at localhost:5173
  flashgen serve

  # Serve on another port and allow two origins
  flashgen serve --port 8080 --allowed-origins http://localhost:5173,https://study.example.com

  # Generate flashcards from a PDF
  flashgen generate lecture.pdf --mode flashcards

  # Quiz from slides, full JSON output with stats
  flashgen generate deck.pptx --mode quiz --json > quiz.json

  # Use Groq instead of OpenRouter
  LLM_PROVIDER=groq GROQ_API_KEY=gsk_... flashgen generate notes.txt --mode quiz

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY      API key when LLM_PROVIDER=openrouter (default)
  GROQ_API_KEY            API key when LLM_PROVIDER=groq
  LLM_PROVIDER            openrouter or groq
  MODEL                   Override model ID
  LLM_ENDPOINT            Override chat-completions URL
  MAX_INPUT_CHARS         Characters of text sent to the model (default 6000)
  MIN_ITEMS               Minimum items requested (default 10)
  CORRECT_ANSWER_POLICY   reject, drop_item or ignore (default drop_item)
  MAX_RETRIES             Extra attempts on transient failures (default 0)
  HOST, PORT              Listen address for `serve` (default 0.0.0.0:5000)
  ALLOWED_ORIGINS         Comma-separated CORS origins, or *

  Variables are also read from a `.env` file in the working directory.
"#;

/// Generate flashcards and quizzes from documents with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "flashgen",
    version,
    about = "Generate flashcards and quizzes from PDF, DOCX, PPTX and text files",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FLASHGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FLASHGEN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP backend (POST /generate).
    Serve {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Address to bind.
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on.
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,

        /// Comma-separated origins allowed to call the API, or `*`.
        #[arg(long, env = "ALLOWED_ORIGINS", default_value = "http://localhost:5173")]
        allowed_origins: String,

        /// Largest accepted upload in MiB.
        #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 20)]
        max_upload_mb: usize,
    },

    /// Generate study material from one local file.
    Generate {
        /// Document to read (.pdf, .docx, .pptx, .txt, .md).
        file: PathBuf,

        /// What to generate.
        #[arg(short, long, value_enum)]
        mode: ModeArg,

        /// Declared media type; detected from the file suffix when omitted.
        #[arg(long)]
        media_type: Option<String>,

        /// Print the full output (result and stats) as JSON.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

/// Settings shared by both subcommands.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Model provider: openrouter or groq.
    #[arg(long, env = "LLM_PROVIDER", default_value = "openrouter")]
    provider: String,

    /// API key. Defaults to OPENROUTER_API_KEY or GROQ_API_KEY per provider.
    #[arg(long)]
    api_key: Option<String>,

    /// Model ID. Default depends on the provider.
    #[arg(long, env = "MODEL")]
    model: Option<String>,

    /// Chat-completions endpoint URL. Default depends on the provider.
    #[arg(long, env = "LLM_ENDPOINT")]
    endpoint: Option<String>,

    /// Characters of extracted text sent to the model.
    #[arg(long, env = "MAX_INPUT_CHARS", default_value_t = flashgen::config::DEFAULT_MAX_INPUT_CHARS)]
    max_input_chars: usize,

    /// Minimum number of items requested from the model.
    #[arg(long, env = "MIN_ITEMS", default_value_t = flashgen::config::DEFAULT_MIN_ITEMS)]
    min_items: usize,

    /// Quiz items whose answer is not an option: reject, drop_item or ignore.
    #[arg(long, env = "CORRECT_ANSWER_POLICY", default_value = "drop_item")]
    correct_answer_policy: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max tokens the model may generate.
    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Model call timeout in seconds.
    #[arg(long, env = "LLM_TIMEOUT", default_value_t = 45)]
    api_timeout: u64,

    /// Extra attempts on transient failures or malformed replies.
    #[arg(long, env = "MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Flashcards,
    Quiz,
}

impl From<ModeArg> for GenerationMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Flashcards => GenerationMode::Flashcards,
            ModeArg::Quiz => GenerationMode::Quiz,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads `env = ...` defaults.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // `generate` shows a spinner, so library INFO logs are muted unless -v.
    let interactive = matches!(cli.command, Command::Generate { json: false, .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || interactive {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            pipeline,
            host,
            port,
            allowed_origins,
            max_upload_mb,
        } => {
            let config = build_config(&pipeline)?;
            if config.gateway.credential().is_none() {
                error!(
                    "{} is not set: every /generate request will fail until it is configured",
                    config.gateway.provider.api_key_env()
                );
            }
            info!(
                provider = %config.gateway.provider,
                model = %config.gateway.model,
                max_input_chars = config.max_input_chars,
                "Pipeline configured"
            );

            let server = ServerConfig {
                host,
                port,
                allowed_origins: ServerConfig::parse_origins(&allowed_origins),
                max_upload_bytes: max_upload_mb * 1024 * 1024,
            };
            let pipeline = Pipeline::new(config).context("Failed to build pipeline")?;
            serve(&server, pipeline).await.context("Server failed")?;
        }

        Command::Generate {
            file,
            mode,
            media_type,
            json,
            pipeline,
        } => {
            let config = build_config(&pipeline)?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let document = UploadedDocument::new(bytes, media_type, filename);

            let spinner = (!cli.quiet && !json).then(|| spinner(&document, mode.into()));
            let result = Pipeline::new(config)
                .context("Failed to build pipeline")?
                .generate(&document, mode.into())
                .await;
            if let Some(bar) = &spinner {
                bar.finish_and_clear();
            }
            let output = result.context("Generation failed")?;

            if json {
                let text =
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                println!("{text}");
            } else {
                print_human(&output);
                if !cli.quiet {
                    eprintln!(
                        "{}  {} items  ({} dropped)  {}ms  {}",
                        green("✔"),
                        bold(&output.result.len().to_string()),
                        output.stats.items_dropped,
                        output.stats.total_duration_ms,
                        dim(&format!(
                            "{} via {}",
                            output.stats.source_format, output.stats.extraction_strategy
                        )),
                    );
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &PipelineArgs) -> Result<PipelineConfig> {
    let provider: Provider = args.provider.parse().context("Invalid --provider")?;
    let policy: CorrectAnswerPolicy = args
        .correct_answer_policy
        .parse()
        .context("Invalid --correct-answer-policy")?;

    let mut gateway = GatewayConfig::for_provider(provider);
    gateway.api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var(provider.api_key_env()).ok());
    if let Some(ref model) = args.model {
        gateway.model = model.clone();
    }
    if let Some(ref endpoint) = args.endpoint {
        gateway.endpoint = endpoint.clone();
    }

    PipelineConfig::builder()
        .gateway(gateway)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .api_timeout_secs(args.api_timeout)
        .max_input_chars(args.max_input_chars)
        .min_items(args.min_items)
        .correct_answer_policy(policy)
        .max_retries(args.max_retries)
        .build()
        .context("Invalid configuration")
}

fn spinner(document: &UploadedDocument, mode: GenerationMode) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Generating");
    bar.set_message(format!("{mode} from {}", document.filename()));
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn print_human(output: &GenerationOutput) {
    match &output.result {
        GenerationResult::Flashcards(cards) => {
            for (i, card) in cards.iter().enumerate() {
                println!("{}. {}", i + 1, bold(&card.question));
                println!("   {}\n", card.answer);
            }
        }
        GenerationResult::Quiz(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{}. {}", i + 1, bold(&item.question));
                for option in &item.options {
                    let marker = if option.trim() == item.correct.trim() {
                        green("●")
                    } else {
                        dim("○")
                    };
                    println!("   {marker} {option}");
                }
                println!();
            }
        }
    }
}

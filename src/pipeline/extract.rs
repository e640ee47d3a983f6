//! Text extraction: dispatch an uploaded document to its format's strategies.
//!
//! Each format owns a prioritised list of [`TextStrategy`] engines. They are
//! tried in order and the first one yielding non-whitespace text wins; a
//! strategy that errors, panics, or returns only whitespace hands over to the
//! next. Only when the list is exhausted does the extractor report failure:
//!
//! * every strategy returned blank text → [`PipelineError::EmptyDocument`]
//! * at least one strategy errored → [`PipelineError::ExtractionFailed`],
//!   listing each engine's complaint
//!
//! ## Why spawn_blocking?
//!
//! The PDF and Office engines are synchronous, CPU-bound, and in the PDF
//! case may touch the file system. Running them on the blocking pool keeps
//! Tokio worker threads free, so one large upload does not stall every other
//! request. The whole strategy chain is bounded by a timeout.

use crate::document::{ExtractionResult, SourceFormat, UploadedDocument};
use crate::error::{PipelineError, StrategyError};
use crate::pipeline::formats::{
    DocxStrategy, LopdfStrategy, PdfExtractStrategy, PlainTextStrategy, PptxStrategy,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Prefix of every temp file written for an extraction engine.
pub const TEMP_PREFIX: &str = "flashgen-";

/// A single engine able to turn a document's bytes into text.
///
/// Implementations are synchronous; the [`Extractor`] runs them on the
/// blocking thread pool.
pub trait TextStrategy: Send + Sync {
    /// Short engine name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Extract raw text. Returning `Ok` with blank text is allowed; the
    /// extractor treats it as "try the next strategy".
    fn extract(&self, bytes: &[u8]) -> Result<String, StrategyError>;
}

/// Format-aware text extractor.
#[derive(Clone)]
pub struct Extractor {
    strategies: HashMap<SourceFormat, Vec<Arc<dyn TextStrategy>>>,
    timeout: Duration,
}

impl Extractor {
    /// Extractor with no strategies registered. Every format is unsupported
    /// until [`Extractor::with_strategies`] adds some.
    pub fn empty(timeout: Duration) -> Self {
        Self {
            strategies: HashMap::new(),
            timeout,
        }
    }

    /// Extractor with the built-in engines:
    ///
    /// | Format | Strategies (in order) |
    /// |--------|-----------------------|
    /// | pdf | `pdf-extract` (via temp file), `lopdf` |
    /// | docx | `docx-xml` |
    /// | pptx | `pptx-xml` |
    /// | plaintext | `utf8` |
    pub fn with_defaults(timeout: Duration) -> Self {
        Self::empty(timeout)
            .with_strategies(
                SourceFormat::Pdf,
                vec![Arc::new(PdfExtractStrategy), Arc::new(LopdfStrategy)],
            )
            .with_strategies(SourceFormat::Docx, vec![Arc::new(DocxStrategy)])
            .with_strategies(SourceFormat::Pptx, vec![Arc::new(PptxStrategy)])
            .with_strategies(SourceFormat::Plaintext, vec![Arc::new(PlainTextStrategy)])
    }

    /// Replace the strategy list for `format`.
    pub fn with_strategies(
        mut self,
        format: SourceFormat,
        strategies: Vec<Arc<dyn TextStrategy>>,
    ) -> Self {
        self.strategies.insert(format, strategies);
        self
    }

    /// Whether any strategy is registered for `format`.
    pub fn supports(&self, format: SourceFormat) -> bool {
        self.strategies
            .get(&format)
            .is_some_and(|list| !list.is_empty())
    }

    /// Extract plain text from `document`.
    pub async fn extract(
        &self,
        document: &UploadedDocument,
    ) -> Result<ExtractionResult, PipelineError> {
        let format = SourceFormat::detect(document.media_type(), document.filename())
            .filter(|f| self.supports(*f))
            .ok_or_else(|| PipelineError::UnsupportedFormat {
                media_type: document
                    .media_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("unknown (file '{}')", document.filename())),
            })?;

        let strategies = self.strategies.get(&format).cloned().unwrap_or_default();
        let bytes: Bytes = document.bytes().clone();
        debug!(
            "Extracting {} ({} bytes) as {} with {} strategies",
            document.filename(),
            bytes.len(),
            format,
            strategies.len()
        );

        let task = tokio::task::spawn_blocking(move || run_strategies(format, &strategies, &bytes));

        let result = tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| PipelineError::ExtractionFailed {
                format,
                detail: format!("extraction timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| PipelineError::Internal(format!("Extraction task failed: {e}")))??;

        info!(
            "Extracted {} chars from {} using {}",
            result.text.chars().count(),
            format,
            result.strategy
        );
        Ok(result)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_defaults(Duration::from_secs(30))
    }
}

/// Try each strategy in order; blocking.
fn run_strategies(
    format: SourceFormat,
    strategies: &[Arc<dyn TextStrategy>],
    bytes: &[u8],
) -> Result<ExtractionResult, PipelineError> {
    let mut failures: Vec<StrategyError> = Vec::new();

    for strategy in strategies {
        let name = strategy.name();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| strategy.extract(bytes)))
            .unwrap_or_else(|_| Err(StrategyError::new(name, "engine panicked")));

        match outcome {
            Ok(text) if !text.trim().is_empty() => {
                return Ok(ExtractionResult {
                    text: text.trim().to_string(),
                    format,
                    strategy: name,
                });
            }
            Ok(_) => debug!("{}: {} returned no text", format, name),
            Err(e) => {
                warn!("{}: strategy failed: {}", format, e);
                failures.push(e);
            }
        }
    }

    if failures.is_empty() {
        return Err(PipelineError::EmptyDocument {
            format,
            hint: empty_hint(format),
        });
    }

    let mut detail = failures
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    if format == SourceFormat::Pdf {
        detail.push_str(PDF_FAILURE_HINT);
    }
    Err(PipelineError::ExtractionFailed { format, detail })
}

const PDF_FAILURE_HINT: &str =
    ". The PDF may be corrupted, password-protected, or a scanned image without a text layer.";

fn empty_hint(format: SourceFormat) -> &'static str {
    match format {
        SourceFormat::Pdf => " The PDF may be a scanned image without a text layer.",
        SourceFormat::Docx | SourceFormat::Pptx => " The file contains no text.",
        SourceFormat::Plaintext => " The file is empty or contains only whitespace.",
    }
}

/// Write `bytes` to a uniquely named temp file for engines that need a path.
///
/// The returned guard deletes the file when dropped, so the file is gone
/// after the caller's scope ends whether extraction succeeded, failed, or
/// panicked.
pub fn scoped_temp_file(bytes: &[u8], suffix: &str) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(suffix)
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        outcome: Result<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn ok(name: &'static str, text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome: Ok(text),
                calls: AtomicUsize::new(0),
            })
        }

        fn err(name: &'static str, detail: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome: Err(detail),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl TextStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn extract(&self, _bytes: &[u8]) -> Result<String, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome
                .map(str::to_string)
                .map_err(|d| StrategyError::new(self.name, d))
        }
    }

    struct Panics;

    impl TextStrategy for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }

        fn extract(&self, _bytes: &[u8]) -> Result<String, StrategyError> {
            panic!("malformed object stream")
        }
    }

    struct Stalls(Duration);

    impl TextStrategy for Stalls {
        fn name(&self) -> &'static str {
            "stalls"
        }

        fn extract(&self, _bytes: &[u8]) -> Result<String, StrategyError> {
            std::thread::sleep(self.0);
            Ok("too late".into())
        }
    }

    fn pdf_doc() -> UploadedDocument {
        UploadedDocument::new(b"%PDF-1.4".to_vec(), Some("application/pdf".into()), "a.pdf")
    }

    fn extractor(strategies: Vec<Arc<dyn TextStrategy>>) -> Extractor {
        Extractor::empty(Duration::from_secs(5)).with_strategies(SourceFormat::Pdf, strategies)
    }

    #[tokio::test]
    async fn first_nonempty_strategy_wins() {
        let primary = Fixed::ok("primary", "  text from primary \n");
        let secondary = Fixed::ok("secondary", "unused");
        let ex = extractor(vec![primary.clone(), secondary.clone()]);

        let result = ex.extract(&pdf_doc()).await.unwrap();
        assert_eq!(result.text, "text from primary");
        assert_eq!(result.strategy, "primary");
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_when_primary_errors_or_is_blank() {
        for primary in [Fixed::err("primary", "bad xref"), Fixed::ok("primary", " \n\t ")] {
            let ex = extractor(vec![primary, Fixed::ok("secondary", "recovered")]);
            let result = ex.extract(&pdf_doc()).await.unwrap();
            assert_eq!(result.strategy, "secondary");
            assert_eq!(result.text, "recovered");
        }
    }

    #[tokio::test]
    async fn falls_back_after_panic() {
        let ex = extractor(vec![Arc::new(Panics), Fixed::ok("secondary", "ok")]);
        let result = ex.extract(&pdf_doc()).await.unwrap();
        assert_eq!(result.strategy, "secondary");
    }

    #[tokio::test]
    async fn slow_strategy_chain_times_out() {
        let ex = Extractor::empty(Duration::from_secs(1)).with_strategies(
            SourceFormat::Pdf,
            vec![Arc::new(Stalls(Duration::from_millis(1500)))],
        );
        let err = ex.extract(&pdf_doc()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailed { .. }), "got: {err:?}");
        assert!(err.to_string().contains("timed out after 1s"), "got: {err}");
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn all_blank_is_empty_document() {
        let ex = extractor(vec![Fixed::ok("a", ""), Fixed::ok("b", "   ")]);
        let err = ex.extract(&pdf_doc()).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDocument { .. }), "got: {err:?}");
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn all_failing_lists_every_engine() {
        let ex = extractor(vec![Fixed::err("a", "bad xref"), Fixed::err("b", "encrypted")]);
        let err = ex.extract(&pdf_doc()).await.unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, PipelineError::ExtractionFailed { .. }));
        assert!(msg.contains("a: bad xref"), "got: {msg}");
        assert!(msg.contains("b: encrypted"), "got: {msg}");
        assert!(msg.contains("password-protected"), "got: {msg}");
    }

    #[tokio::test]
    async fn unregistered_format_is_unsupported() {
        let ex = extractor(vec![Fixed::ok("a", "x")]);
        let doc = UploadedDocument::new(b"hello".to_vec(), Some("text/plain".into()), "a.txt");
        let err = ex.extract(&doc).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn unknown_media_type_is_named() {
        let doc = UploadedDocument::new(vec![0u8; 4], Some("image/png".into()), "photo.png");
        let err = Extractor::default().extract(&doc).await.unwrap_err();
        assert!(err.to_string().contains("image/png"), "got: {err}");
    }

    #[test]
    fn temp_files_are_unique_and_removed() {
        let a = scoped_temp_file(b"one", ".pdf").unwrap();
        let b = scoped_temp_file(b"two", ".pdf").unwrap();
        let (pa, pb) = (a.path().to_path_buf(), b.path().to_path_buf());
        assert_ne!(pa, pb);
        assert!(pa.file_name().unwrap().to_string_lossy().starts_with(TEMP_PREFIX));
        assert_eq!(std::fs::read(&pa).unwrap(), b"one");
        drop(a);
        drop(b);
        assert!(!pa.exists());
        assert!(!pb.exists());
    }
}

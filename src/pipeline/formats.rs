//! Built-in [`TextStrategy`] engines, one per supported format.
//!
//! PDF has two engines because neither reads every real-world file:
//! `pdf-extract` handles font encodings and layout better, `lopdf` is more
//! tolerant of damaged cross-reference tables. Office formats are ZIP
//! containers of XML; their text lives in `<w:t>` (Word) and `<a:t>`
//! (PowerPoint) runs, which is all a study-material prompt needs.

use crate::document::SourceFormat;
use crate::error::StrategyError;
use crate::pipeline::extract::{scoped_temp_file, TextStrategy};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::io::{Cursor, Read};

// ── Plain text ───────────────────────────────────────────────────────────

/// UTF-8 decode, dropping a leading byte-order mark.
pub struct PlainTextStrategy;

impl TextStrategy for PlainTextStrategy {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, StrategyError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StrategyError::new(self.name(), format!("file is not valid UTF-8 ({e})")))
    }
}

// ── PDF ──────────────────────────────────────────────────────────────────

/// Primary PDF engine: `pdf-extract`, fed from a scoped temp file.
pub struct PdfExtractStrategy;

impl TextStrategy for PdfExtractStrategy {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, StrategyError> {
        let file = scoped_temp_file(bytes, SourceFormat::Pdf.suffix())
            .map_err(|e| StrategyError::new(self.name(), format!("temp file: {e}")))?;
        // `file` is removed when this function returns, on every path.
        pdf_extract::extract_text(file.path()).map_err(|e| StrategyError::new(self.name(), e))
    }
}

/// Secondary PDF engine: `lopdf`, page by page from memory.
pub struct LopdfStrategy;

impl TextStrategy for LopdfStrategy {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, StrategyError> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| StrategyError::new(self.name(), format!("failed to parse PDF: {e}")))?;
        if doc.is_encrypted() {
            return Err(StrategyError::new(self.name(), "PDF is password-protected"));
        }

        let mut page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        page_numbers.sort_unstable();

        let mut text = String::new();
        let mut last_error = None;
        for page in &page_numbers {
            match doc.extract_text(&[*page]) {
                Ok(page_text) => {
                    text.push_str(page_text.trim_end());
                    text.push('\n');
                }
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) if text.trim().is_empty() => Err(StrategyError::new(
                self.name(),
                format!("no page could be read: {e}"),
            )),
            _ => Ok(text),
        }
    }
}

// ── Office Open XML ──────────────────────────────────────────────────────

/// Word documents: text runs of `word/document.xml`.
pub struct DocxStrategy;

impl TextStrategy for DocxStrategy {
    fn name(&self) -> &'static str {
        "docx-xml"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, StrategyError> {
        let xml = read_zip_entry(bytes, "word/document.xml")
            .map_err(|e| StrategyError::new(self.name(), e))?;
        Ok(docx_text(&xml))
    }
}

/// PowerPoint decks: `a:t` runs of every `ppt/slides/slideN.xml`, in slide
/// order, slides separated by a blank line.
pub struct PptxStrategy;

impl TextStrategy for PptxStrategy {
    fn name(&self) -> &'static str {
        "pptx-xml"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, StrategyError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| StrategyError::new(self.name(), format!("not a valid PPTX archive: {e}")))?;

        let mut slides: Vec<(u32, String)> = archive
            .file_names()
            .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
            .collect();
        if slides.is_empty() {
            return Err(StrategyError::new(self.name(), "archive contains no slides"));
        }
        slides.sort_unstable_by_key(|(n, _)| *n);

        let mut texts = Vec::with_capacity(slides.len());
        for (_, name) in &slides {
            let mut xml = String::new();
            archive
                .by_name(name)
                .and_then(|mut entry| entry.read_to_string(&mut xml).map_err(Into::into))
                .map_err(|e| StrategyError::new(self.name(), format!("{name}: {e}")))?;
            let slide = pptx_slide_text(&xml);
            if !slide.is_empty() {
                texts.push(slide);
            }
        }
        Ok(texts.join("\n\n").trim().to_string())
    }
}

fn read_zip_entry(bytes: &[u8], entry: &str) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("not a valid Office archive: {e}"))?;
    let mut file = archive
        .by_name(entry)
        .map_err(|e| format!("missing {entry}: {e}"))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| format!("failed to read {entry}: {e}"))?;
    Ok(xml)
}

static RE_SLIDE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());

fn slide_number(name: &str) -> Option<u32> {
    RE_SLIDE_NAME
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

// Text runs plus the structural tags that imply whitespace.
static RE_DOCX_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>|<w:br\s*/>|<w:cr\s*/>|</w:p>").unwrap()
});

static RE_PPTX_TOKENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:t(?:\s[^>]*)?>(.*?)</a:t>|<a:br\s*/>|</a:p>").unwrap());

fn docx_text(xml: &str) -> String {
    collect_runs(&RE_DOCX_TOKENS, xml)
}

fn pptx_slide_text(xml: &str) -> String {
    collect_runs(&RE_PPTX_TOKENS, xml)
}

/// Concatenate text runs, turning paragraph ends and breaks into newlines.
fn collect_runs(tokens: &Regex, xml: &str) -> String {
    let mut out = String::with_capacity(xml.len() / 4);
    for caps in tokens.captures_iter(xml) {
        match caps.get(1) {
            Some(run) => out.push_str(&decode_xml_entities(run.as_str())),
            None if caps[0].starts_with("<w:tab") => out.push('\t'),
            None => out.push('\n'),
        }
    }
    out.lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|lt|gt|amp|quot|apos);").unwrap());

fn decode_xml_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    RE_ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                e if e.starts_with("#x") || e.starts_with("#X") => {
                    u32::from_str_radix(&e[2..], 16).ok().and_then(char::from_u32)
                }
                e => e[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures;

    #[test]
    fn plain_text_strips_bom() {
        let text = PlainTextStrategy.extract(b"\xEF\xBB\xBFhello").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn plain_text_rejects_invalid_utf8() {
        let err = PlainTextStrategy.extract(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err.strategy, "utf8");
    }

    #[test]
    fn lopdf_reads_every_page_in_order() {
        let pdf = fixtures::pdf(&["First page", "Second page"]);
        let text = LopdfStrategy.extract(&pdf).unwrap();
        let first = text.find("First").expect("first page text");
        let second = text.find("Second").expect("second page text");
        assert!(first < second, "got: {text:?}");
    }

    #[test]
    fn lopdf_rejects_garbage() {
        let err = LopdfStrategy.extract(b"definitely not a pdf").unwrap_err();
        assert_eq!(err.strategy, "lopdf");
    }

    #[test]
    fn pdf_extract_rejects_garbage_without_leaking_temp_files() {
        let before = count_temp_files();
        assert!(PdfExtractStrategy.extract(b"%PDF-1.4 truncated").is_err());
        assert!(count_temp_files() <= before);
    }

    fn count_temp_files() -> usize {
        std::fs::read_dir(std::env::temp_dir())
            .map(|dir| {
                dir.filter_map(Result::ok)
                    .filter(|e| {
                        let name = e.file_name().to_string_lossy().to_string();
                        name.starts_with(crate::pipeline::extract::TEMP_PREFIX)
                            && name.ends_with(".pdf")
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let docx = fixtures::docx(&["Mitochondria", "are the powerhouse &amp; the cell"]);
        let text = DocxStrategy.extract(&docx).unwrap();
        assert_eq!(text, "Mitochondria\nare the powerhouse & the cell");
    }

    #[test]
    fn docx_without_document_xml_fails() {
        let bogus = fixtures::zip(&[("other.xml", "<x/>")]);
        let err = DocxStrategy.extract(&bogus).unwrap_err();
        assert!(err.detail.contains("word/document.xml"), "got: {err}");
    }

    #[test]
    fn pptx_slides_in_numeric_order_separated_by_blank_line() {
        let slides: Vec<&[&str]> = (1..=11)
            .map(|i| -> &[&str] {
                match i {
                    1 => &["Intro", "Agenda"],
                    2 => &[],
                    10 => &["Tenth"],
                    11 => &["Eleventh"],
                    _ => &["Middle"],
                }
            })
            .collect();
        let pptx = fixtures::pptx(&slides);
        let text = PptxStrategy.extract(&pptx).unwrap();

        assert!(text.starts_with("Intro\nAgenda\n\nMiddle"), "got: {text:?}");
        assert!(text.ends_with("Tenth\n\nEleventh"), "got: {text:?}");
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn pptx_without_slides_fails() {
        let bogus = fixtures::zip(&[("ppt/presentation.xml", "<p/>")]);
        assert!(PptxStrategy.extract(&bogus).is_err());
    }

    #[test]
    fn xml_entities_decode() {
        assert_eq!(
            decode_xml_entities("a &lt;b&gt; &quot;c&quot; &#233;&#x20AC; &bogus;"),
            "a <b> \"c\" é€ &bogus;"
        );
    }

    #[tokio::test]
    async fn default_extractor_dispatches_every_format() {
        use crate::document::{UploadedDocument, MIME_DOCX, MIME_PDF, MIME_PPTX, MIME_TEXT};
        use crate::pipeline::extract::Extractor;
        use std::time::Duration;

        let cases = [
            (fixtures::pdf(&["Osmosis"]), MIME_PDF, "notes.pdf", SourceFormat::Pdf),
            (fixtures::docx(&["Osmosis"]), MIME_DOCX, "notes.docx", SourceFormat::Docx),
            (fixtures::pptx(&[&["Osmosis"]]), MIME_PPTX, "notes.pptx", SourceFormat::Pptx),
            (b"Osmosis".to_vec(), MIME_TEXT, "notes.txt", SourceFormat::Plaintext),
        ];
        let extractor = Extractor::with_defaults(Duration::from_secs(30));
        for (bytes, mime, name, format) in cases {
            let doc = UploadedDocument::new(bytes, Some(mime.to_string()), name);
            let result = extractor.extract(&doc).await.unwrap();
            assert_eq!(result.format, format);
            assert!(result.text.contains("Osmosis"), "{format}: {:?}", result.text);
        }
    }

    #[test]
    fn docx_tabs_and_breaks() {
        let xml = r#"<w:p><w:r><w:t>A</w:t><w:tab/><w:t>B</w:t><w:br/><w:t>C</w:t></w:r></w:p>"#;
        assert_eq!(docx_text(xml), "A\tB\nC");
    }
}

// Extraction pipeline: native PDF text first, whole-document OCR as the fallback
//
//   NotStarted -> NativeAttempted -> Accepted
//                                 -> FallbackToOcr -> OcrUnavailable
//                                                  -> OcrInProgress -> OcrComplete
//
// Every stage runs at most once per document. Any failure after the fallback starts ends the
// document with no text at all; partially OCR'd pages are dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::extraction_router::{ExtractionMethod, ExtractionRouter, NativeAttempt};
use super::native_text::{LopdfTextExtractor, NativeTextExtractor};
use super::ocr_singleton::OcrEngineHandle;
use super::page_rasterizer::{PageRasterizer, PdftoppmRasterizer};
use crate::config::Config;
use crate::document::MediaKind;
use crate::types::{ExtractionFailure, RecognizedLine};

static PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^--- PAGE (\d+) ---$").expect("page marker pattern is valid"));

pub type ExtractionResult = Result<ExtractedText, ExtractionFailure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    NotStarted,
    NativeAttempted,
    Accepted,
    FallbackToOcr,
    OcrUnavailable,
    OcrInProgress,
    OcrComplete,
}

/// Emitted after each page is recognized. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OcrProgress {
    pub page: usize,
    pub total: usize,
}

impl OcrProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.page as f32 / self.total as f32
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
    pub elapsed_ms: u64,
}

impl ExtractedText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Page numbers of every `--- PAGE n ---` marker, in order of appearance
    pub fn page_numbers(&self) -> Vec<usize> {
        page_numbers(&self.text)
    }
}

pub fn page_numbers(text: &str) -> Vec<usize> {
    PAGE_MARKER
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// `"\n--- PAGE n ---\n"` followed by each recognized line and a single space.
pub fn format_page_section(number: usize, lines: &[RecognizedLine]) -> String {
    let mut section = format!("\n--- PAGE {number} ---\n");
    for line in lines {
        section.push_str(&line.text);
        section.push(' ');
    }
    section
}

pub fn assemble_pages(sections: &[String]) -> String {
    sections.join("\n")
}

pub struct ExtractionPipeline<N = LopdfTextExtractor, R = PdftoppmRasterizer> {
    native: N,
    rasterizer: R,
    engine: Arc<OcrEngineHandle>,
    router: ExtractionRouter,
}

impl ExtractionPipeline {
    pub fn from_config(config: &Config, engine: Arc<OcrEngineHandle>) -> Self {
        Self::new(
            LopdfTextExtractor::new(),
            PdftoppmRasterizer::from_config(&config.rasterizer),
            engine,
            ExtractionRouter::new(config.extraction.native_text_threshold),
        )
    }
}

impl<N: NativeTextExtractor, R: PageRasterizer> ExtractionPipeline<N, R> {
    pub fn new(native: N, rasterizer: R, engine: Arc<OcrEngineHandle>, router: ExtractionRouter) -> Self {
        Self {
            native,
            rasterizer,
            engine,
            router,
        }
    }

    pub fn engine(&self) -> &OcrEngineHandle {
        &self.engine
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    pub fn extract(&self, bytes: &[u8], kind: MediaKind) -> ExtractionResult {
        self.extract_with_progress(bytes, kind, &mut |_| {})
    }

    pub fn extract_with_progress(
        &self,
        bytes: &[u8],
        kind: MediaKind,
        progress: &mut dyn FnMut(OcrProgress),
    ) -> ExtractionResult {
        let started = Instant::now();
        let outcome = match kind {
            MediaKind::PlainText => decode_plain_text(bytes),
            MediaKind::Pdf => self.extract_pdf(bytes, progress),
        };

        match outcome {
            Ok((text, method)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(?method, chars = text.chars().count(), elapsed_ms, "extraction complete");
                Ok(ExtractedText {
                    text,
                    method,
                    elapsed_ms,
                })
            }
            Err(failure) => {
                error!(reason = failure.reason_code(), error = %failure, "extraction failed");
                Err(failure)
            }
        }
    }

    fn extract_pdf(
        &self,
        pdf_bytes: &[u8],
        progress: &mut dyn FnMut(OcrProgress),
    ) -> Result<(String, ExtractionMethod), ExtractionFailure> {
        debug!(stage = ?ExtractionStage::NotStarted, bytes = pdf_bytes.len(), "starting PDF extraction");

        let attempt = self.router.attempt_native(&self.native, pdf_bytes);
        debug!(stage = ?ExtractionStage::NativeAttempted, needs_ocr = attempt.needs_ocr());

        match attempt {
            NativeAttempt::Accepted(text) => {
                info!(stage = ?ExtractionStage::Accepted, "using native PDF text");
                Ok((text, ExtractionMethod::NativeText))
            }
            NativeAttempt::TooShort { .. } | NativeAttempt::ParseError(_) => {
                debug!(stage = ?ExtractionStage::FallbackToOcr);
                self.run_ocr(pdf_bytes, progress)
            }
        }
    }

    fn run_ocr(
        &self,
        pdf_bytes: &[u8],
        progress: &mut dyn FnMut(OcrProgress),
    ) -> Result<(String, ExtractionMethod), ExtractionFailure> {
        if !self.engine.ensure_initialized() {
            warn!(stage = ?ExtractionStage::OcrUnavailable, "no OCR engine, giving up on document");
            return Err(ExtractionFailure::EngineUnavailable);
        }

        let pages = self
            .rasterizer
            .render_pages(pdf_bytes)
            .map_err(|e| ExtractionFailure::RenderFailure(e.to_string()))?;
        let total = pages.len();

        let mut engine = self.engine.lock().ok_or(ExtractionFailure::EngineUnavailable)?;
        debug!(stage = ?ExtractionStage::OcrInProgress, pages = total);

        let mut sections = Vec::with_capacity(total);
        let mut found_text = false;
        // markers follow render order, whatever numbering the rasterizer reported
        for (index, page) in pages.into_iter().enumerate() {
            let number = index + 1;
            let lines = engine
                .recognize(&page.image)
                .map_err(|e| ExtractionFailure::OcrPageFailure {
                    page: number,
                    message: e.to_string(),
                })?;

            found_text |= lines.iter().any(|line| !line.text.trim().is_empty());
            sections.push(format_page_section(number, &lines));

            info!(page = number, total, "Performing OCR on page {} of {}", number, total);
            progress(OcrProgress { page: number, total });
        }

        if !found_text {
            return Err(ExtractionFailure::NoContent);
        }

        debug!(stage = ?ExtractionStage::OcrComplete, pages = total);
        Ok((assemble_pages(&sections), ExtractionMethod::Ocr { pages: total }))
    }
}

/// Plain text is passed straight through, it never touches the PDF machinery.
fn decode_plain_text(bytes: &[u8]) -> Result<(String, ExtractionMethod), ExtractionFailure> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ExtractionFailure::InvalidText(e.to_string()))?
        .to_string();
    if text.is_empty() {
        return Err(ExtractionFailure::NoContent);
    }
    Ok((text, ExtractionMethod::PlainText))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn line(text: &str) -> RecognizedLine {
        RecognizedLine::new(text, 0.99, BoundingBox::default())
    }

    #[test]
    fn test_two_page_assembly() {
        let sections = vec![
            format_page_section(1, &[line("Hello world")]),
            format_page_section(2, &[line("Goodbye")]),
        ];
        assert_eq!(
            assemble_pages(&sections),
            "\n--- PAGE 1 ---\nHello world \n\n--- PAGE 2 ---\nGoodbye "
        );
    }

    #[test]
    fn test_lines_joined_with_trailing_space() {
        assert_eq!(
            format_page_section(3, &[line("a"), line("b c")]),
            "\n--- PAGE 3 ---\na b c "
        );
        assert_eq!(format_page_section(4, &[]), "\n--- PAGE 4 ---\n");
    }

    #[test]
    fn test_page_numbers_parsed_from_markers() {
        let text = assemble_pages(&[
            format_page_section(1, &[line("x")]),
            format_page_section(2, &[]),
            format_page_section(3, &[line("--- PAGE 9 --- inline")]),
        ]);
        assert_eq!(page_numbers(&text), vec![1, 2, 3]);
    }

    #[test]
    fn test_plain_text_passthrough() {
        let (text, method) = decode_plain_text("héllo\nworld".as_bytes()).unwrap();
        assert_eq!(text, "héllo\nworld");
        assert_eq!(method, ExtractionMethod::PlainText);

        assert_eq!(decode_plain_text(b""), Err(ExtractionFailure::NoContent));
        assert!(matches!(
            decode_plain_text(&[0xff, 0xfe, 0x00]),
            Err(ExtractionFailure::InvalidText(_))
        ));
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(OcrProgress { page: 1, total: 4 }.fraction(), 0.25);
        assert_eq!(OcrProgress { page: 0, total: 0 }.fraction(), 0.0);
    }
}

// Routing between native PDF text and OCR fallback
//
// The decision is a length heuristic: scanned PDFs yield next to no native text, while any
// real page of native text clears the threshold. Short native documents get OCR'd and
// metadata noise above the threshold gets accepted; both are known and left as-is.

use serde::Serialize;
use tracing::{debug, warn};

use super::native_text::NativeTextExtractor;
use crate::types::NativeExtractionError;

/// Native text must be strictly longer than this many characters to skip OCR.
pub const NATIVE_TEXT_THRESHOLD: usize = 50;

/// How the final text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionMethod {
    PlainText,
    NativeText,
    Ocr { pages: usize },
}

impl ExtractionMethod {
    /// Pages read by OCR. Native and plain-text extraction never count pages.
    pub fn ocr_pages(&self) -> Option<usize> {
        match self {
            Self::Ocr { pages } => Some(*pages),
            Self::PlainText | Self::NativeText => None,
        }
    }
}

/// Outcome of the native-text attempt, consumed by an explicit branch in the pipeline
#[derive(Debug)]
pub enum NativeAttempt {
    Accepted(String),
    TooShort { chars: usize },
    ParseError(NativeExtractionError),
}

impl NativeAttempt {
    pub fn needs_ocr(&self) -> bool {
        !matches!(self, Self::Accepted(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionRouter {
    threshold: usize,
}

impl Default for ExtractionRouter {
    fn default() -> Self {
        Self::new(NATIVE_TEXT_THRESHOLD)
    }
}

impl ExtractionRouter {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Length is counted in characters, not bytes
    pub fn is_sufficient(&self, text: &str) -> bool {
        text.chars().count() > self.threshold
    }

    /// Run the native extractor once and classify the result.
    pub fn attempt_native<N: NativeTextExtractor + ?Sized>(
        &self,
        extractor: &N,
        pdf_bytes: &[u8],
    ) -> NativeAttempt {
        match extractor.extract_text(pdf_bytes) {
            Ok(text) if self.is_sufficient(&text) => {
                debug!(chars = text.chars().count(), "native text accepted");
                NativeAttempt::Accepted(text)
            }
            Ok(text) => {
                let chars = text.chars().count();
                warn!(chars, threshold = self.threshold, "native text too short, falling back to OCR");
                NativeAttempt::TooShort { chars }
            }
            Err(err) => {
                warn!(error = %err, "native text extraction failed, falling back to OCR");
                NativeAttempt::ParseError(err)
            }
        }
    }
}

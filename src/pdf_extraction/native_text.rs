// Native PDF text extraction with lopdf - no rendering
use lopdf::Document;

use crate::types::NativeExtractionError;

/// Pulls embedded text straight out of a PDF's page objects.
pub trait NativeTextExtractor {
    /// Concatenate every page's text with `\n`, skipping pages with nothing extractable.
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, NativeExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfTextExtractor;

impl LopdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl NativeTextExtractor for LopdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, NativeExtractionError> {
        let document = Document::load_mem(pdf_bytes)
            .map_err(|e| NativeExtractionError::Parse(e.to_string()))?;

        if document.is_encrypted() {
            return Err(NativeExtractionError::Encrypted);
        }

        // get_pages is keyed by 1-based page number, already in document order
        let mut page_texts = Vec::new();
        for page_number in document.get_pages().keys() {
            let text = document
                .extract_text(&[*page_number])
                .map_err(|e| NativeExtractionError::Page {
                    page: *page_number,
                    message: e.to_string(),
                })?;

            let text = text.trim_end();
            if !text.trim_start().is_empty() {
                page_texts.push(text.to_string());
            }
        }

        Ok(page_texts.join("\n"))
    }
}

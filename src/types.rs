// Core types and error enums for docchat
use image::RgbImage;
use std::path::PathBuf;

/// One rendered PDF page. `number` is 1-based and follows document order.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub number: usize,
    pub image: RgbImage,
}

impl PageImage {
    pub fn new(number: usize, image: RgbImage) -> Self {
        Self { number, image }
    }
}

/// Axis-aligned box in source image pixels
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// A single OCR hit. Only `text` is used when assembling page sections.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedLine {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl RecognizedLine {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

// Error types

#[derive(Debug, thiserror::Error)]
pub enum NativeExtractionError {
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF is encrypted")]
    Encrypted,

    #[error("text extraction failed on page {page}: {message}")]
    Page { page: u32, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("rasterizer backend unavailable ({binary}): {source}")]
    BackendUnavailable {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pdftoppm failed: {0}")]
    Renderer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode rendered page {page}: {source}")]
    Decode {
        page: usize,
        #[source]
        source: image::ImageError,
    },

    #[error("renderer produced no pages")]
    NoPages,
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR model not found: {0}")]
    MissingModel(PathBuf),

    #[error("failed to load OCR model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("failed to read character dictionary {path}: {source}")]
    Dictionary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unexpected model output shape {0:?}")]
    OutputShape(Vec<i64>),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported media kind: {0}")]
    UnsupportedMediaKind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document-level failure handed to the caller in place of extracted text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("no content could be extracted from the document")]
    NoContent,

    #[error("OCR engine is unavailable")]
    EngineUnavailable,

    #[error("page rendering failed: {0}")]
    RenderFailure(String),

    #[error("OCR failed on page {page}: {message}")]
    OcrPageFailure { page: usize, message: String },

    #[error("plain text is not valid UTF-8: {0}")]
    InvalidText(String),
}

impl ExtractionFailure {
    /// True when the extraction machinery failed, as opposed to the document being empty.
    pub fn is_machinery_failure(&self) -> bool {
        !matches!(self, Self::NoContent | Self::InvalidText(_))
    }

    /// Short reason code, stable for logs and JSON output
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NoContent => "no_content",
            Self::EngineUnavailable => "engine_unavailable",
            Self::RenderFailure(_) => "render_failure",
            Self::OcrPageFailure { .. } => "ocr_page_failure",
            Self::InvalidText(_) => "invalid_text",
        }
    }

    pub fn user_guidance(&self) -> &'static str {
        match self {
            Self::NoContent => {
                "No text was found in this file. Try re-uploading a cleaner scan or a text-based PDF."
            }
            Self::InvalidText(_) => "The file is not valid UTF-8 text. Re-save it as UTF-8 and upload again.",
            Self::EngineUnavailable => {
                "Text recognition is not available on this server, so scanned PDFs cannot be read."
            }
            Self::RenderFailure(_) | Self::OcrPageFailure { .. } => {
                "The document could not be processed. Nothing can be done with this file on this server."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_content_is_not_machinery_failure() {
        assert!(!ExtractionFailure::NoContent.is_machinery_failure());
        assert!(ExtractionFailure::EngineUnavailable.is_machinery_failure());
        assert!(ExtractionFailure::RenderFailure("boom".into()).is_machinery_failure());
        assert_ne!(
            ExtractionFailure::NoContent.user_guidance(),
            ExtractionFailure::EngineUnavailable.user_guidance()
        );
    }

    #[test]
    fn test_bbox_dimensions() {
        let bbox = BoundingBox { x0: 10.0, y0: 5.0, x1: 30.0, y1: 12.0 };
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.height(), 7.0);
    }
}

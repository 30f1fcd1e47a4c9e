// docchat: turn uploaded documents into chat context
pub mod chat;
pub mod config;
pub mod document;
pub mod pdf_extraction;
pub mod types;

pub use config::Config;
pub use document::{Document, MediaKind};
pub use pdf_extraction::{
    ExtractedText, ExtractionMethod, ExtractionPipeline, ExtractionResult, OcrEngineHandle,
    OcrProgress,
};
pub use types::{ExtractionFailure, PageImage, RecognizedLine};

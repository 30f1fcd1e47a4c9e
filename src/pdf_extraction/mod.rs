// PDF extraction module
pub mod extraction_router;
pub mod native_text;
pub mod ocr_engine;
pub mod ocr_singleton;
pub mod page_rasterizer;
pub mod pipeline;
pub mod text_detection;
pub mod text_recognition;

pub use extraction_router::{ExtractionMethod, ExtractionRouter, NativeAttempt, NATIVE_TEXT_THRESHOLD};
pub use native_text::{LopdfTextExtractor, NativeTextExtractor};
pub use ocr_engine::{OcrEngine, PaddleOcrEngine};
pub use ocr_singleton::OcrEngineHandle;
pub use page_rasterizer::{PageRasterizer, PdftoppmRasterizer};
pub use pipeline::{
    ExtractedText, ExtractionPipeline, ExtractionResult, ExtractionStage, OcrProgress,
};

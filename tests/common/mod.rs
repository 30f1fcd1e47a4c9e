// Shared fixtures for integration tests
#![allow(dead_code)]

use docchat::pdf_extraction::{
    ExtractionPipeline, ExtractionRouter, NativeTextExtractor, OcrEngine, OcrEngineHandle,
    PageRasterizer,
};
use docchat::types::{
    BoundingBox, NativeExtractionError, OcrError, PageImage, RecognizedLine, RenderError,
};
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Build a PDF with one page per entry; `None` is a page with no text at all.
pub fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = match text {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
            None => vec![],
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Add an `Encrypt` trailer entry. The content stays readable, only the marker changes.
pub fn mark_encrypted(pdf: &[u8]) -> Vec<u8> {
    let mut doc = Document::load_mem(pdf).unwrap();
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "P" => -4,
        "O" => Object::string_literal(vec![0u8; 32]),
        "U" => Object::string_literal(vec![0u8; 32]),
    });
    doc.trailer.set("Encrypt", encrypt_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Native extractor returning a fixed answer
pub struct ScriptedNative {
    pub result: Result<String, String>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedNative {
    pub fn text(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn broken(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: Arc::default(),
        }
    }
}

impl NativeTextExtractor for ScriptedNative {
    fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<String, NativeExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(NativeExtractionError::Parse)
    }
}

/// Rasterizer producing `pages` tiny images. Page n is n pixels wide so the fake engine can
/// tell pages apart.
pub struct ScriptedRasterizer {
    pub pages: Result<usize, String>,
    /// Reported page number is `n - 1` instead of `n`
    pub zero_based: bool,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedRasterizer {
    pub fn pages(count: usize) -> Self {
        Self {
            pages: Ok(count),
            zero_based: false,
            calls: Arc::default(),
        }
    }

    pub fn zero_based(count: usize) -> Self {
        Self {
            zero_based: true,
            ..Self::pages(count)
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            pages: Err(message.to_string()),
            zero_based: false,
            calls: Arc::default(),
        }
    }
}

impl PageRasterizer for ScriptedRasterizer {
    fn render_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageImage>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let count = self.pages.clone().map_err(RenderError::Renderer)?;
        Ok((1..=count)
            .map(|n| {
                let reported = if self.zero_based { n - 1 } else { n };
                PageImage::new(reported, RgbImage::new(n as u32, 1))
            })
            .collect())
    }
}

/// OCR engine answering per page number; pages missing from the script read as blank.
#[derive(Clone, Default)]
pub struct ScriptedOcr {
    pub lines: HashMap<usize, Vec<&'static str>>,
    pub failing_page: Option<usize>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedOcr {
    pub fn page(mut self, number: usize, lines: &[&'static str]) -> Self {
        self.lines.insert(number, lines.to_vec());
        self
    }

    /// Every page says "text on page n"
    pub fn numbered(pages: usize) -> Self {
        let lines = (1..=pages)
            .map(|n| (n, vec![&*Box::leak(format!("text on page {n}").into_boxed_str())]))
            .collect();
        Self {
            lines,
            ..Self::default()
        }
    }
}

impl OcrEngine for ScriptedOcr {
    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<RecognizedLine>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = image.width() as usize;
        if self.failing_page == Some(page) {
            return Err(OcrError::Inference(format!("model crashed on page {page}")));
        }
        Ok(self
            .lines
            .get(&page)
            .map(|lines| {
                lines
                    .iter()
                    .map(|text| RecognizedLine::new(*text, 0.97, BoundingBox::default()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn pipeline<N: NativeTextExtractor, R: PageRasterizer>(
    native: N,
    rasterizer: R,
    engine: Arc<OcrEngineHandle>,
) -> ExtractionPipeline<N, R> {
    ExtractionPipeline::new(native, rasterizer, engine, ExtractionRouter::default())
}

// OCR engine: PP-OCR style ONNX models (detection, optional angle classifier, recognition)
use image::imageops;
use image::RgbImage;
use ndarray::ArrayView2;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, info, warn};

use super::text_detection::{detection_input, DbPostProcessor};
use super::text_recognition::{
    crop_text_region, ctc_greedy_decode, normalized_line_input, CharDictionary, CLS_IMAGE_WIDTH,
    CLS_THRESHOLD, REC_DROP_SCORE, REC_IMAGE_HEIGHT, REC_MIN_WIDTH,
};
use crate::config::OcrConfig;
use crate::types::{BoundingBox, OcrError, RecognizedLine};

/// A text recognizer for one RGB page image.
///
/// Lines come back in the engine's own scan order; callers must not re-sort them.
pub trait OcrEngine: Send {
    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<RecognizedLine>, OcrError>;
}

pub struct PaddleOcrEngine {
    detector: Session,
    classifier: Option<Session>,
    recognizer: Session,
    dictionary: CharDictionary,
    postprocess: DbPostProcessor,
}

impl PaddleOcrEngine {
    /// Load every model up front. This is the expensive step and happens once per process.
    pub fn load(config: &OcrConfig) -> Result<Self, OcrError> {
        let threads = config.intra_threads;

        let detector = load_session(&config.detection_path(), threads)?;
        let recognizer = load_session(&config.recognition_path(), threads)?;
        let classifier = match config.classifier_path() {
            Some(path) if path.exists() => Some(load_session(&path, threads)?),
            Some(path) => {
                warn!(path = %path.display(), "angle classifier not found, continuing without it");
                None
            }
            None => None,
        };
        let dictionary = CharDictionary::load(&config.dictionary_path())?;

        info!(
            classes = dictionary.len(),
            classifier = classifier.is_some(),
            "OCR models loaded"
        );

        Ok(Self {
            detector,
            classifier,
            recognizer,
            dictionary,
            postprocess: DbPostProcessor::default(),
        })
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, OcrError> {
        let (data, width, height) = detection_input(image);
        let input = Tensor::from_array(([1_usize, 3, height as usize, width as usize], data.into_boxed_slice()))
            .map_err(inference_error)?;

        let outputs = self.detector.run(inputs![input]).map_err(inference_error)?;
        let (shape, probs) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        // [batch, 1, H, W]
        if shape.len() != 4 {
            return Err(OcrError::OutputShape(shape.to_vec()));
        }
        let (map_height, map_width) = (shape[2] as usize, shape[3] as usize);
        let prob_map = probs
            .get(..map_height * map_width)
            .and_then(|data| ArrayView2::from_shape((map_height, map_width), data).ok())
            .ok_or_else(|| OcrError::OutputShape(shape.to_vec()))?;

        let boxes = self
            .postprocess
            .boxes(prob_map, image.width(), image.height())
            .into_iter()
            .map(|(bbox, _)| bbox)
            .collect();
        Ok(boxes)
    }

    /// True when the classifier is confident the crop is upside down
    fn is_upside_down(&mut self, crop: &RgbImage) -> Result<bool, OcrError> {
        let Some(classifier) = self.classifier.as_mut() else {
            return Ok(false);
        };

        let (data, width) = normalized_line_input(crop, CLS_IMAGE_WIDTH, Some(CLS_IMAGE_WIDTH));
        let input = Tensor::from_array((
            [1_usize, 3, REC_IMAGE_HEIGHT as usize, width as usize],
            data.into_boxed_slice(),
        ))
        .map_err(inference_error)?;

        let outputs = classifier.run(inputs![input]).map_err(inference_error)?;
        let (_, probs) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        // labels: 0 degrees, 180 degrees
        Ok(probs.len() >= 2 && probs[1] > probs[0] && probs[1] > CLS_THRESHOLD)
    }

    fn read_line(&mut self, crop: &RgbImage) -> Result<(String, f32), OcrError> {
        let (data, width) = normalized_line_input(crop, REC_MIN_WIDTH, None);
        let input = Tensor::from_array((
            [1_usize, 3, REC_IMAGE_HEIGHT as usize, width as usize],
            data.into_boxed_slice(),
        ))
        .map_err(inference_error)?;

        let outputs = self.recognizer.run(inputs![input]).map_err(inference_error)?;
        let (shape, probs) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        // [batch, time, classes]
        if shape.len() != 3 || shape[2] as usize != self.dictionary.len() {
            return Err(OcrError::OutputShape(shape.to_vec()));
        }
        let (steps, classes) = (shape[1] as usize, shape[2] as usize);
        let matrix = probs
            .get(..steps * classes)
            .and_then(|data| ArrayView2::from_shape((steps, classes), data).ok())
            .ok_or_else(|| OcrError::OutputShape(shape.to_vec()))?;

        Ok(ctc_greedy_decode(matrix, &self.dictionary))
    }
}

impl OcrEngine for PaddleOcrEngine {
    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<RecognizedLine>, OcrError> {
        let boxes = self.detect(image)?;
        debug!(boxes = boxes.len(), "text regions detected");

        let mut lines = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let Some(mut crop) = crop_text_region(image, &bbox) else {
                continue;
            };
            if self.is_upside_down(&crop)? {
                crop = imageops::rotate180(&crop);
            }

            let (text, confidence) = self.read_line(&crop)?;
            if confidence >= REC_DROP_SCORE && !text.trim().is_empty() {
                lines.push(RecognizedLine::new(text, confidence, bbox));
            }
        }
        Ok(lines)
    }
}

fn load_session(path: &Path, threads: usize) -> Result<Session, OcrError> {
    if !path.exists() {
        return Err(OcrError::MissingModel(path.to_path_buf()));
    }

    let load_error = |e: &dyn Display| OcrError::ModelLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    debug!(path = %path.display(), "loading ONNX model");
    let session = Session::builder()
        .map_err(|e| load_error(&e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_error(&e))?
        .with_intra_threads(threads)
        .map_err(|e| load_error(&e))?
        .commit_from_file(path)
        .map_err(|e| load_error(&e))?;
    Ok(session)
}

fn inference_error(err: impl Display) -> OcrError {
    OcrError::Inference(err.to_string())
}

// Text recognition helpers: crop preparation, character dictionary and CTC decoding
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::ArrayView2;
use std::fs;
use std::path::Path;

use crate::types::{BoundingBox, OcrError};

pub const REC_IMAGE_HEIGHT: u32 = 48;
pub const REC_MIN_WIDTH: u32 = 320;
pub const REC_DROP_SCORE: f32 = 0.5;

pub const CLS_IMAGE_WIDTH: u32 = 192;
pub const CLS_THRESHOLD: f32 = 0.9;

/// Recognition vocabulary. Index 0 is the CTC blank; a trailing space is always appended.
#[derive(Debug, Clone)]
pub struct CharDictionary {
    symbols: Vec<String>,
}

impl CharDictionary {
    pub fn load(path: &Path) -> Result<Self, OcrError> {
        let content = fs::read_to_string(path).map_err(|source| OcrError::Dictionary {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_lines(content.lines()))
    }

    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut symbols = vec![String::new()];
        symbols.extend(
            lines
                .into_iter()
                .map(|line| line.trim_end_matches(['\r', '\n']))
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
        symbols.push(" ".to_string());
        Self { symbols }
    }

    /// Number of classes including the blank
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.len() <= 2
    }

    pub fn symbol(&self, index: usize) -> Option<&str> {
        match index {
            0 => None,
            i => self.symbols.get(i).map(String::as_str),
        }
    }
}

/// Greedy CTC decode of a `[time, classes]` probability matrix.
/// Returns the text and the mean probability of the emitted characters.
pub fn ctc_greedy_decode(probs: ArrayView2<f32>, dictionary: &CharDictionary) -> (String, f32) {
    let mut text = String::new();
    let mut score_sum = 0.0_f32;
    let mut emitted = 0_usize;
    let mut previous = None;

    for step in probs.outer_iter() {
        let (best, best_prob) = step
            .iter()
            .enumerate()
            .fold((0_usize, f32::MIN), |acc, (index, &p)| if p > acc.1 { (index, p) } else { acc });

        if previous != Some(best) {
            if let Some(symbol) = dictionary.symbol(best) {
                text.push_str(symbol);
                score_sum += best_prob;
                emitted += 1;
            }
        }
        previous = Some(best);
    }

    let confidence = if emitted == 0 { 0.0 } else { score_sum / emitted as f32 };
    (text, confidence)
}

/// Cut a detected box out of the page. Tall, narrow crops are rotated to horizontal.
pub fn crop_text_region(page: &RgbImage, bbox: &BoundingBox) -> Option<RgbImage> {
    let x = bbox.x0.max(0.0).floor() as u32;
    let y = bbox.y0.max(0.0).floor() as u32;
    let right = (bbox.x1.ceil() as u32).min(page.width());
    let bottom = (bbox.y1.ceil() as u32).min(page.height());
    if right <= x || bottom <= y {
        return None;
    }

    let crop = imageops::crop_imm(page, x, y, right - x, bottom - y).to_image();
    if crop.height() as f32 / crop.width() as f32 >= 1.5 {
        Some(imageops::rotate270(&crop))
    } else {
        Some(crop)
    }
}

/// Resize to the fixed height, keep aspect ratio, right-pad with zeros to `min_width`.
/// Returns NCHW data and the padded width.
pub fn normalized_line_input(crop: &RgbImage, min_width: u32, max_width: Option<u32>) -> (Vec<f32>, u32) {
    let ratio = crop.width() as f32 / crop.height().max(1) as f32;
    let mut resized_width = ((REC_IMAGE_HEIGHT as f32 * ratio).ceil() as u32).max(1);
    if let Some(max_width) = max_width {
        resized_width = resized_width.min(max_width);
    }
    let padded_width = resized_width.max(min_width);

    let resized = imageops::resize(crop, resized_width, REC_IMAGE_HEIGHT, FilterType::Triangle);
    let plane = (REC_IMAGE_HEIGHT * padded_width) as usize;
    let mut data = vec![0.0_f32; 3 * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let index = (y * padded_width + x) as usize;
        for c in 0..3 {
            data[c * plane + index] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
        }
    }
    (data, padded_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn dictionary() -> CharDictionary {
        CharDictionary::from_lines(["a", "b", "c"])
    }

    #[test]
    fn test_dictionary_layout() {
        let dict = dictionary();
        assert_eq!(dict.len(), 5);
        assert_eq!(dict.symbol(0), None);
        assert_eq!(dict.symbol(1), Some("a"));
        assert_eq!(dict.symbol(4), Some(" "));
        assert_eq!(dict.symbol(5), None);
    }

    #[test]
    fn test_ctc_collapses_repeats_and_blanks() {
        // a a _ a b _ _ space c
        let probs = arr2(&[
            [0.1, 0.8, 0.05, 0.05, 0.0],
            [0.1, 0.7, 0.1, 0.1, 0.0],
            [0.9, 0.05, 0.05, 0.0, 0.0],
            [0.1, 0.6, 0.1, 0.2, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
        ]);
        let (text, confidence) = ctc_greedy_decode(probs.view(), &dictionary());
        assert_eq!(text, "aab c");
        let expected = (0.8 + 0.6 + 1.0 + 1.0 + 1.0) / 5.0;
        assert!((confidence - expected).abs() < 1e-6);
    }

    #[test]
    fn test_ctc_all_blank() {
        let probs = arr2(&[[1.0, 0.0, 0.0, 0.0, 0.0], [0.9, 0.1, 0.0, 0.0, 0.0]]);
        let (text, confidence) = ctc_greedy_decode(probs.view(), &dictionary());
        assert!(text.is_empty());
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_crop_clamps_to_page() {
        let page = RgbImage::new(100, 50);
        let bbox = BoundingBox { x0: -5.0, y0: 10.0, x1: 140.0, y1: 30.0 };
        let crop = crop_text_region(&page, &bbox).unwrap();
        assert_eq!(crop.dimensions(), (100, 20));

        let empty = BoundingBox { x0: 60.0, y0: 10.0, x1: 60.0, y1: 30.0 };
        assert!(crop_text_region(&page, &empty).is_none());
    }

    #[test]
    fn test_vertical_crop_rotated() {
        let page = RgbImage::new(100, 100);
        let bbox = BoundingBox { x0: 0.0, y0: 0.0, x1: 10.0, y1: 40.0 };
        let crop = crop_text_region(&page, &bbox).unwrap();
        assert_eq!(crop.dimensions(), (40, 10));
    }

    #[test]
    fn test_line_input_padding() {
        let crop = RgbImage::new(96, 48);
        let (data, width) = normalized_line_input(&crop, REC_MIN_WIDTH, None);
        assert_eq!(width, REC_MIN_WIDTH);
        assert_eq!(data.len(), (3 * REC_IMAGE_HEIGHT * REC_MIN_WIDTH) as usize);
        // black pixel normalizes to -1, padding stays 0
        assert_eq!(data[0], -1.0);
        assert_eq!(data[200], 0.0);

        let wide = RgbImage::new(960, 48);
        let (_, width) = normalized_line_input(&wide, REC_MIN_WIDTH, None);
        assert_eq!(width, 960);

        let (_, capped) = normalized_line_input(&wide, CLS_IMAGE_WIDTH, Some(CLS_IMAGE_WIDTH));
        assert_eq!(capped, CLS_IMAGE_WIDTH);
    }
}

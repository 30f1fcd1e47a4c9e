// Text detection pre/post-processing for DB-style (differentiable binarization) models
//
// The detector outputs a per-pixel text probability map. Boxes are recovered by thresholding
// the map, labelling connected regions, scoring each region by its mean probability and
// growing the surviving rectangles back out (the model predicts shrunk text kernels).

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::ArrayView2;
use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::types::BoundingBox;

pub const DET_LIMIT_SIDE_LEN: u32 = 960;
pub const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

const MIN_BOX_SIDE: f32 = 3.0;
const SAME_LINE_TOLERANCE: f32 = 10.0;

/// Model input size: longest side capped at `limit`, both sides rounded to multiples of 32.
pub fn detection_input_size(width: u32, height: u32, limit: u32) -> (u32, u32) {
    let max_side = width.max(height).max(1);
    let ratio = if max_side > limit {
        limit as f32 / max_side as f32
    } else {
        1.0
    };
    let round32 = |side: u32| -> u32 {
        let scaled = ((side as f32 * ratio) / 32.0).round() as u32 * 32;
        scaled.max(32)
    };
    (round32(width), round32(height))
}

/// Resize for the detector and return the NCHW tensor data plus its (width, height).
pub fn detection_input(image: &RgbImage) -> (Vec<f32>, u32, u32) {
    let (width, height) = detection_input_size(image.width(), image.height(), DET_LIMIT_SIDE_LEN);
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    (to_chw_tensor(&resized, DET_MEAN, DET_STD), width, height)
}

/// Planar CHW floats, `(px / 255 - mean) / std` per channel
pub fn to_chw_tensor(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0_f32; 3 * plane];
    for (x, y, pixel) in image.enumerate_pixels() {
        let index = (y * width + x) as usize;
        for c in 0..3 {
            data[c * plane + index] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }
    data
}

#[derive(Debug, Clone, Copy)]
pub struct DbPostProcessor {
    pub threshold: f32,
    pub box_threshold: f32,
    pub unclip_ratio: f32,
}

impl Default for DbPostProcessor {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
        }
    }
}

impl DbPostProcessor {
    /// Extract text boxes from a probability map, scaled into a `source_width` x
    /// `source_height` image. Boxes come back in reading order.
    pub fn boxes(
        &self,
        prob_map: ArrayView2<f32>,
        source_width: u32,
        source_height: u32,
    ) -> Vec<(BoundingBox, f32)> {
        let (map_height, map_width) = prob_map.dim();
        if map_height == 0 || map_width == 0 {
            return Vec::new();
        }
        let scale_x = source_width as f32 / map_width as f32;
        let scale_y = source_height as f32 / map_height as f32;

        let mut visited = vec![false; map_height * map_width];
        let mut boxes = Vec::new();

        for y in 0..map_height {
            for x in 0..map_width {
                if visited[y * map_width + x] || prob_map[[y, x]] <= self.threshold {
                    continue;
                }
                let region = flood_region(&prob_map, self.threshold, &mut visited, x, y);
                if region.mean_score() < self.box_threshold {
                    continue;
                }

                let width = (region.max_x - region.min_x + 1) as f32;
                let height = (region.max_y - region.min_y + 1) as f32;
                if width.min(height) < MIN_BOX_SIDE {
                    continue;
                }

                // grow the kernel back out by area * ratio / perimeter
                let distance = width * height * self.unclip_ratio / (2.0 * (width + height));
                if width.min(height) + 2.0 * distance < MIN_BOX_SIDE + 2.0 {
                    continue;
                }

                let bbox = BoundingBox {
                    x0: ((region.min_x as f32 - distance) * scale_x).clamp(0.0, source_width as f32),
                    y0: ((region.min_y as f32 - distance) * scale_y).clamp(0.0, source_height as f32),
                    x1: ((region.max_x as f32 + 1.0 + distance) * scale_x)
                        .clamp(0.0, source_width as f32),
                    y1: ((region.max_y as f32 + 1.0 + distance) * scale_y)
                        .clamp(0.0, source_height as f32),
                };
                boxes.push((bbox, region.mean_score()));
            }
        }

        sort_reading_order(&mut boxes);
        boxes
    }
}

struct Region {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
    score_sum: f32,
    pixels: usize,
}

impl Region {
    fn mean_score(&self) -> f32 {
        if self.pixels == 0 {
            0.0
        } else {
            self.score_sum / self.pixels as f32
        }
    }
}

/// 8-connected flood fill over pixels above `threshold`
fn flood_region(
    prob_map: &ArrayView2<f32>,
    threshold: f32,
    visited: &mut [bool],
    start_x: usize,
    start_y: usize,
) -> Region {
    let (height, width) = prob_map.dim();
    let mut region = Region {
        min_x: start_x,
        min_y: start_y,
        max_x: start_x,
        max_y: start_y,
        score_sum: 0.0,
        pixels: 0,
    };

    let mut queue = VecDeque::new();
    visited[start_y * width + start_x] = true;
    queue.push_back((start_x, start_y));

    while let Some((x, y)) = queue.pop_front() {
        region.score_sum += prob_map[[y, x]];
        region.pixels += 1;
        region.min_x = region.min_x.min(x);
        region.max_x = region.max_x.max(x);
        region.min_y = region.min_y.min(y);
        region.max_y = region.max_y.max(y);

        for dy in -1_i64..=1 {
            for dx in -1_i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                let index = ny * width + nx;
                if !visited[index] && prob_map[[ny, nx]] > threshold {
                    visited[index] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }

    region
}

/// Top-to-bottom, then left-to-right for boxes whose tops sit within a few pixels.
pub fn sort_reading_order(boxes: &mut [(BoundingBox, f32)]) {
    boxes.sort_by(|a, b| {
        a.0.y0
            .partial_cmp(&b.0.y0)
            .unwrap_or(Ordering::Equal)
            .then(a.0.x0.partial_cmp(&b.0.x0).unwrap_or(Ordering::Equal))
    });

    for i in 0..boxes.len().saturating_sub(1) {
        let mut j = i;
        while j < boxes.len() - 1 {
            let (upper, lower) = (&boxes[j].0, &boxes[j + 1].0);
            if (lower.y0 - upper.y0).abs() < SAME_LINE_TOLERANCE && lower.x0 < upper.x0 {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
            if j == 0 {
                break;
            }
            j -= 1;
        }
    }
}

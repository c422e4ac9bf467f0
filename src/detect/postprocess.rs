//! YOLO-style pre- and post-processing shared by the model backends.
//!
//! Frames are letterboxed into a square model input (aspect preserved, gray
//! padding), and raw head outputs `[1, 4 + classes, anchors]` are decoded back
//! into frame-space detections with per-class non-maximum suppression.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Padding value used by the reference YOLO letterbox (114/255).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Geometry of a frame placed inside the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub input_size: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);
        Self {
            input_size,
            scale,
            pad_x: (input_size - scaled_width) as f32 / 2.0,
            pad_y: (input_size - scaled_height) as f32 / 2.0,
            scaled_width,
            scaled_height,
        }
    }

    /// Map a center/size box in model input space back into frame pixels.
    pub fn to_frame(&self, cx: f32, cy: f32, w: f32, h: f32, width: u32, height: u32) -> BoundingBox {
        let unmap_x = |v: f32| ((v - self.pad_x) / self.scale).clamp(0.0, width as f32);
        let unmap_y = |v: f32| ((v - self.pad_y) / self.scale).clamp(0.0, height as f32);
        BoundingBox::new(
            unmap_x(cx - w / 2.0) as i32,
            unmap_y(cy - h / 2.0) as i32,
            unmap_x(cx + w / 2.0) as i32,
            unmap_y(cy + h / 2.0) as i32,
        )
    }
}

/// Build a normalized CHW input tensor (`[3, size, size]`, row-major) for a frame.
pub fn letterbox_input(frame: &Frame, letterbox: &Letterbox) -> Result<Vec<f32>> {
    let size = letterbox.input_size as usize;
    let source = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
        .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
    let scaled = if (frame.width, frame.height) == (letterbox.scaled_width, letterbox.scaled_height) {
        source
    } else {
        imageops::resize(
            &source,
            letterbox.scaled_width,
            letterbox.scaled_height,
            FilterType::Triangle,
        )
    };

    let mut input = vec![PAD_VALUE; 3 * size * size];
    let left = letterbox.pad_x.floor() as usize;
    let top = letterbox.pad_y.floor() as usize;
    for (x, y, pixel) in scaled.enumerate_pixels() {
        let offset = (top + y as usize) * size + left + x as usize;
        for channel in 0..3 {
            input[channel * size * size + offset] = pixel.0[channel] as f32 / 255.0;
        }
    }
    Ok(input)
}

/// Thresholds applied while decoding.
#[derive(Clone, Copy, Debug)]
pub struct DecodeParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

/// Decode a YOLOv8 detection head.
///
/// Expects the exported `[1, 4 + classes, anchors]` layout: four box rows (center x,
/// center y, width, height in input pixels) followed by one score row per class.
/// Returns detections sorted by descending confidence.
pub fn decode_yolo(
    output: &[f32],
    shape: &[usize],
    letterbox: &Letterbox,
    frame_width: u32,
    frame_height: u32,
    params: &DecodeParams,
) -> Result<Vec<Detection>> {
    let (attributes, anchors) = match shape {
        [1, attributes, anchors] | [attributes, anchors] => (*attributes, *anchors),
        other => return Err(anyhow!("unexpected detection output shape {:?}", other)),
    };
    if output.len() != attributes * anchors {
        return Err(anyhow!(
            "detection output holds {} values, shape {:?} needs {}",
            output.len(),
            shape,
            attributes * anchors
        ));
    }
    if attributes <= 4 {
        return Err(anyhow!("detection output has no class scores ({} attributes)", attributes));
    }
    let value = |attribute: usize, anchor: usize| output[attribute * anchors + anchor];

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..attributes)
            .map(|attribute| (attribute - 4, value(attribute, anchor)))
            .fold((0usize, f32::NEG_INFINITY), |best, next| {
                if next.1 > best.1 {
                    next
                } else {
                    best
                }
            });
        if !score.is_finite() || score < params.confidence_threshold {
            continue;
        }
        let bbox = letterbox.to_frame(
            value(0, anchor),
            value(1, anchor),
            value(2, anchor),
            value(3, anchor),
            frame_width,
            frame_height,
        );
        if bbox.area() == 0 {
            continue;
        }
        candidates.push((bbox, class_id, score));
    }

    let kept = non_max_suppression(candidates, params.iou_threshold, params.max_detections);
    Ok(kept
        .into_iter()
        .map(|(bbox, class_id, score)| Detection::new(bbox, class_id, score))
        .collect())
}

/// Greedy per-class suppression, highest score first.
fn non_max_suppression(
    mut candidates: Vec<(BoundingBox, usize, f32)>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<(BoundingBox, usize, f32)> {
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2));
    let mut kept: Vec<(BoundingBox, usize, f32)> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.1 == candidate.1 && k.0.iou(&candidate.0) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

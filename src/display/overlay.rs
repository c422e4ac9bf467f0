//! Operator overlay layout: category boxes, their labels and the FPS counter.
//!
//! Only positions, text and colors are decided here. The window display draws
//! them with OpenCV; the headless display reports them through the log.

use crate::detect::BoundingBox;
use crate::frame::Frame;
use crate::sort::{Annotation, Category, DisposalState, FrameDecision};

/// RGB color triple.
pub type Color = [u8; 3];

pub const BIODEGRADABLE_COLOR: Color = [0, 255, 0];
pub const NONBIODEGRADABLE_COLOR: Color = [255, 0, 0];
pub const FPS_COLOR: Color = [0, 255, 255];

pub const BOX_THICKNESS: i32 = 2;
pub const LABEL_SCALE: f64 = 0.7;
pub const LABEL_THICKNESS: i32 = 2;
/// Label baseline distance above the top edge of its box.
pub const LABEL_OFFSET: i32 = 10;
/// Baseline origin of the FPS counter.
pub const FPS_ORIGIN: (i32, i32) = (20, 50);
pub const FPS_SCALE: f64 = 1.0;
pub const FPS_THICKNESS: i32 = 2;

pub fn category_color(category: Category) -> Color {
    match category {
        Category::Biodegradable => BIODEGRADABLE_COLOR,
        Category::NonBiodegradable => NONBIODEGRADABLE_COLOR,
    }
}

/// One outlined detection with its caption.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayBox {
    pub bbox: BoundingBox,
    pub color: Color,
    pub label: String,
    /// Bottom-left corner of the label text.
    pub label_origin: (i32, i32),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlay {
    pub boxes: Vec<OverlayBox>,
    pub fps_label: String,
}

impl Overlay {
    /// Lay out the decision over a `width` x `height` frame.
    ///
    /// Coordinates are clamped to the frame plus a one-pixel margin, so boxes
    /// reaching past an edge stay open on that side.
    pub fn layout(decision: &FrameDecision, fps: f64, width: u32, height: u32) -> Self {
        let limits = (to_coord(width), to_coord(height));
        Self {
            boxes: decision
                .annotations
                .iter()
                .map(|annotation| overlay_box(annotation, limits))
                .collect(),
            fps_label: format!("FPS: {}", fps as u64),
        }
    }
}

fn to_coord(extent: u32) -> i32 {
    i32::try_from(extent).unwrap_or(i32::MAX)
}

fn overlay_box(annotation: &Annotation, (width, height): (i32, i32)) -> OverlayBox {
    let x = |v: i32| v.clamp(-1, width);
    let y = |v: i32| v.clamp(-1, height);
    let b = annotation.bbox;
    OverlayBox {
        bbox: BoundingBox::new(x(b.x1), y(b.y1), x(b.x2), y(b.y2)),
        color: category_color(annotation.category),
        label: annotation.label(),
        label_origin: (x(b.x1), y(b.y1.saturating_sub(LABEL_OFFSET))),
    }
}

/// A frame together with everything the operator should see on top of it.
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub state: DisposalState,
    pub fps: f64,
    pub overlay: Overlay,
}

impl AnnotatedFrame {
    /// Number of outlined detections.
    pub fn annotations(&self) -> usize {
        self.overlay.boxes.len()
    }
}

pub fn annotate(frame: Frame, decision: &FrameDecision, fps: f64) -> AnnotatedFrame {
    let overlay = Overlay::layout(decision, fps, frame.width, frame.height);
    AnnotatedFrame {
        frame,
        state: decision.state,
        fps,
        overlay,
    }
}

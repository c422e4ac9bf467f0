//! Captured frames.
//!
//! A `Frame` is owned by exactly one loop iteration. Sources hand it to the loop,
//! the detector borrows it, and the display receives it along with its overlay.
//! Nothing keeps a frame across iterations.

use anyhow::{anyhow, Result};
use std::time::Instant;

/// Pixel layouts a camera session may be configured with.
///
/// Sources normalize everything to packed RGB24 before handing a frame on,
/// so `Frame::format` is informational (what the device delivered).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Nv12,
}

impl PixelFormat {
    /// V4L2 fourcc requested from the device.
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Rgb24 => *b"RGB3",
            PixelFormat::Nv12 => *b"NV12",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rgb24" | "rgb888" | "rgb3" => Ok(PixelFormat::Rgb24),
            "nv12" => Ok(PixelFormat::Nv12),
            other => Err(anyhow!("unsupported pixel format '{}'", other)),
        }
    }
}

/// One captured RGB24 frame.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// When the source produced the frame.
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap packed RGB24 pixels. Fails when the buffer does not match the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} RGB bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            captured_at: Instant::now(),
        })
    }

    /// Packed RGB24 pixels, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

//! Synthetic frame source for `stub://` devices.
//!
//! Produces a moving gradient at the configured resolution. When the session is
//! configured for NV12 the raw planes are generated and then normalized the same
//! way a device capture would be.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use super::{packed_stride, to_rgb24, FrameSource, SourceStats};
use crate::config::CameraSettings;
use crate::frame::{Frame, PixelFormat};

pub struct SyntheticSource {
    settings: CameraSettings,
    connected: bool,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            connected: false,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    fn generate_raw(&self) -> Vec<u8> {
        let width = self.settings.width as usize;
        let height = self.settings.height as usize;
        let shift = self.frame_count as usize;
        match self.settings.pixel_format {
            PixelFormat::Rgb24 => {
                let mut pixels = Vec::with_capacity(width * height * 3);
                for y in 0..height {
                    for x in 0..width {
                        pixels.push(((x + shift) % 256) as u8);
                        pixels.push(((y + shift) % 256) as u8);
                        pixels.push(((x + y) % 256) as u8);
                    }
                }
                pixels
            }
            PixelFormat::Nv12 => {
                let luma = (0..width * height).map(|i| ((i % width + shift) % 256) as u8);
                let chroma = std::iter::repeat(128u8).take(width * height / 2);
                luma.chain(chroma).collect()
            }
        }
    }

    /// Sleep off whatever is left of the frame interval, like a camera would.
    fn pace(&self) {
        if self.settings.target_fps == 0 {
            return;
        }
        let interval = Duration::from_secs(1) / self.settings.target_fps;
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{} {:?})",
            self.settings.device,
            self.settings.width,
            self.settings.height,
            self.settings.pixel_format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("{} is not connected", self.settings.device));
        }
        self.pace();
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        let raw = self.generate_raw();
        let rgb = to_rgb24(
            &raw,
            self.settings.width,
            self.settings.height,
            packed_stride(self.settings.width, self.settings.pixel_format),
            self.settings.pixel_format,
        )?;
        Frame::from_rgb(
            rgb,
            self.settings.width,
            self.settings.height,
            self.settings.pixel_format,
        )
    }

    fn close(&mut self) {
        if self.connected {
            log::info!("SyntheticSource: closed {}", self.settings.device);
        }
        self.connected = false;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.settings.device.clone(),
        }
    }
}

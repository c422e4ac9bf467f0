//! V4L2 frame source.
//!
//! Opens a local device node (e.g. /dev/video0), negotiates the configured
//! resolution and pixel format, and streams frames through mmap buffers.
//! Frames are normalized to RGB24 before they leave this module.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::{packed_stride, to_rgb24, FrameSource, SourceStats};
use crate::config::CameraSettings;
use crate::frame::{Frame, PixelFormat};

const STREAM_BUFFERS: u32 = 4;

pub struct V4l2Source {
    settings: CameraSettings,
    state: Option<V4l2State>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
    /// Bytes per line of the first plane, as negotiated.
    active_stride: usize,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            active_width: settings.width,
            active_height: settings.height,
            active_format: settings.pixel_format,
            active_stride: packed_stride(settings.width, settings.pixel_format),
            settings,
            state: None,
            frame_count: 0,
        }
    }
}

impl FrameSource for V4l2Source {
    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.settings.device)
            .with_context(|| format!("open v4l2 device {}", self.settings.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.settings.width;
        format.height = self.settings.height;
        format.fourcc = v4l::FourCC::new(&self.settings.pixel_format.fourcc());

        let format = device
            .set_format(&format)
            .with_context(|| format!("set v4l2 format on {}", self.settings.device))?;

        let active_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"NV12" => PixelFormat::Nv12,
            other => {
                return Err(anyhow!(
                    "{} negotiated unsupported fourcc {}",
                    self.settings.device,
                    String::from_utf8_lossy(other)
                ))
            }
        };
        if format.width != self.settings.width || format.height != self.settings.height {
            log::warn!(
                "V4l2Source: {} negotiated {}x{} instead of {}x{}",
                self.settings.device,
                format.width,
                format.height,
                self.settings.width,
                self.settings.height
            );
        }

        if self.settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.settings.device,
                    err
                );
            }
        }

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        self.active_width = format.width;
        self.active_height = format.height;
        self.active_format = active_format;
        // Some drivers leave bytesperline at 0 for packed formats.
        self.active_stride = match format.stride as usize {
            0 => packed_stride(format.width, active_format),
            stride => stride,
        };
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.settings.device,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.active_width, self.active_height, self.active_format);
        let stride = self.active_stride;
        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let rgb = state.with_stream_mut(|stream| -> Result<Vec<u8>> {
            let (buf, _meta) = stream.next().context("capture v4l2 frame")?;
            to_rgb24(buf, width, height, stride, format)
        })?;

        self.frame_count += 1;
        Frame::from_rgb(rgb, self.active_width, self.active_height, self.active_format)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Source: closed {}", self.settings.device);
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.settings.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_connect() {
        let mut source = V4l2Source::new(CameraSettings {
            device: "/dev/video-does-not-exist".to_string(),
            width: 640,
            height: 480,
            pixel_format: PixelFormat::Rgb24,
            target_fps: 30,
        });
        assert!(source.connect().is_err());
        assert!(source.next_frame().is_err());
    }
}

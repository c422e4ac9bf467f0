//! Frame sources.
//!
//! - USB/CSI cameras through V4L2 (feature: ingest-v4l2)
//! - Synthetic source (`stub://` devices, dry runs and tests)
//!
//! Every source hands out packed RGB24 `Frame`s at the configured resolution.
//! A source is connected once before the control loop starts and closed once
//! after it ends. A failed `connect` is fatal: the loop must not start.

mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::config::CameraSettings;
use crate::frame::Frame;

pub(crate) use normalize::{packed_stride, to_rgb24};
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Blocking camera session.
pub trait FrameSource {
    /// Establish the capture session at the configured resolution and pixel format.
    fn connect(&mut self) -> Result<()>;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the capture session. Safe to call more than once.
    fn close(&mut self) {}

    fn stats(&self) -> SourceStats;
}

/// Capture counters, reported at shutdown.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub device: String,
}

/// Open the source named by `settings.device`.
///
/// `stub://` devices get the synthetic source; anything else is treated as a
/// V4L2 device node and needs the `ingest-v4l2` feature.
pub fn open_source(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    if settings.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(settings.clone())));
    }

    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Source::new(settings.clone())))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow::anyhow!(
            "camera device {} requires the ingest-v4l2 feature",
            settings.device
        ))
    }
}

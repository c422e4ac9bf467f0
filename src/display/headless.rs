use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{AnnotatedFrame, OperatorDisplay};

/// Display for appliances without a screen.
///
/// Nothing is drawn; state and frame rate are reported through the log every
/// `status_interval`. The operator stops the loop with Ctrl+C, or the
/// loop ends by itself after an optional frame limit.
pub struct HeadlessDisplay {
    stop: Arc<AtomicBool>,
    status_interval: Duration,
    last_status: Option<Instant>,
    frame_limit: Option<u64>,
    frames: u64,
}

impl HeadlessDisplay {
    pub fn new(status_interval: Duration) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            status_interval,
            last_status: None,
            frame_limit: None,
            frames: 0,
        }
    }

    /// Stop after presenting `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Route Ctrl+C to the exit flag. Can only be installed once per process.
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let stop = Arc::clone(&self.stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("install Ctrl+C handler")
    }

    /// Flag that ends the loop when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

impl OperatorDisplay for HeadlessDisplay {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<()> {
        self.frames += 1;
        let due = self
            .last_status
            .map_or(true, |last| last.elapsed() >= self.status_interval);
        if due {
            log::info!(
                "frame {}: state={} fps={} items={}",
                self.frames,
                frame.state,
                frame.fps as u64,
                frame.annotations()
            );
            self.last_status = Some(Instant::now());
        }
        Ok(())
    }

    fn poll_exit(&mut self) -> Result<bool> {
        if self.stop.load(Ordering::SeqCst) {
            log::info!("stop requested by operator");
            return Ok(true);
        }
        Ok(self.frame_limit.is_some_and(|limit| self.frames >= limit))
    }
}

//! Operator display.
//!
//! The overlay is laid out the same way for every display; displays differ in
//! whether it gets drawn and how the operator asks the loop to stop.
//!
//! - `WindowDisplay`: OpenCV window, exit on a keypress (feature: display-opencv)
//! - `HeadlessDisplay`: log-only, exit on Ctrl+C

pub mod fps;
pub mod headless;
pub mod overlay;
#[cfg(feature = "display-opencv")]
pub mod window;

use anyhow::Result;

use crate::config::{DisplayKind, DisplaySettings};

pub use fps::FpsCounter;
pub use headless::HeadlessDisplay;
pub use overlay::{annotate, AnnotatedFrame, Overlay};
#[cfg(feature = "display-opencv")]
pub use window::WindowDisplay;

/// Where annotated frames go, and where the exit signal comes from.
pub trait OperatorDisplay {
    /// Show one annotated frame.
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<()>;

    /// Check once, without blocking beyond one short tick, whether the operator asked to stop.
    fn poll_exit(&mut self) -> Result<bool>;

    /// Release display resources. Safe to call more than once.
    fn close(&mut self) {}
}

/// Build the display described by the settings.
pub fn open_display(settings: &DisplaySettings) -> Result<Box<dyn OperatorDisplay>> {
    match settings.mode {
        DisplayKind::Headless => {
            let mut display = HeadlessDisplay::new(settings.status_interval);
            if let Some(limit) = settings.frame_limit {
                display = display.with_frame_limit(limit);
            }
            display.install_interrupt_handler()?;
            Ok(Box::new(display))
        }
        DisplayKind::Window => {
            #[cfg(feature = "display-opencv")]
            {
                Ok(Box::new(WindowDisplay::open(
                    &settings.window_title,
                    settings.exit_key,
                )?))
            }
            #[cfg(not(feature = "display-opencv"))]
            {
                Err(anyhow::anyhow!(
                    "window display '{}' requires the display-opencv feature (or use headless)",
                    settings.window_title
                ))
            }
        }
    }
}

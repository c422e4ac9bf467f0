#![cfg(feature = "display-opencv")]

use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
use opencv::prelude::*;
use opencv::{highgui, imgproc};

use super::overlay::{
    Color, Overlay, BOX_THICKNESS, FPS_COLOR, FPS_ORIGIN, FPS_SCALE, FPS_THICKNESS, LABEL_SCALE,
    LABEL_THICKNESS,
};
use super::{AnnotatedFrame, OperatorDisplay};

/// Live OpenCV HighGUI window. Pressing the exit key ends the loop.
pub struct WindowDisplay {
    title: String,
    exit_key: char,
    open: bool,
}

impl WindowDisplay {
    pub fn open(title: &str, exit_key: char) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("open display window '{}'", title))?;
        log::info!("WindowDisplay: press '{}' in the window to stop", exit_key);
        Ok(Self {
            title: title.to_string(),
            exit_key,
            open: true,
        })
    }

    fn to_bgr_mat(frame: &AnnotatedFrame) -> Result<Mat> {
        let pixels = frame.frame.pixels();
        let mut rgb = Mat::new_rows_cols_with_default(
            frame.frame.height as i32,
            frame.frame.width as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )
        .context("allocate display matrix")?;
        let bytes = rgb.data_bytes_mut().context("access display matrix")?;
        if bytes.len() != pixels.len() {
            return Err(anyhow!(
                "display matrix holds {} bytes, frame has {}",
                bytes.len(),
                pixels.len()
            ));
        }
        bytes.copy_from_slice(pixels);

        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)
            .context("convert frame to BGR")?;
        Ok(bgr)
    }
}

fn bgr(color: Color) -> Scalar {
    Scalar::new(color[2] as f64, color[1] as f64, color[0] as f64, 0.0)
}

fn draw(img: &mut Mat, overlay: &Overlay) -> opencv::Result<()> {
    for item in &overlay.boxes {
        let b = item.bbox;
        imgproc::rectangle(
            img,
            Rect::new(b.x1, b.y1, b.width(), b.height()),
            bgr(item.color),
            BOX_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::put_text(
            img,
            &item.label,
            Point::new(item.label_origin.0, item.label_origin.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            LABEL_SCALE,
            bgr(item.color),
            LABEL_THICKNESS,
            imgproc::LINE_8,
            false,
        )?;
    }
    imgproc::put_text(
        img,
        &overlay.fps_label,
        Point::new(FPS_ORIGIN.0, FPS_ORIGIN.1),
        imgproc::FONT_HERSHEY_SIMPLEX,
        FPS_SCALE,
        bgr(FPS_COLOR),
        FPS_THICKNESS,
        imgproc::LINE_8,
        false,
    )
}

impl OperatorDisplay for WindowDisplay {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<()> {
        let mut img = Self::to_bgr_mat(frame)?;
        draw(&mut img, &frame.overlay).context("draw overlay")?;
        highgui::imshow(&self.title, &img).context("show frame")?;
        Ok(())
    }

    fn poll_exit(&mut self) -> Result<bool> {
        let key = highgui::wait_key(1).context("poll keyboard")?;
        Ok(key >= 0 && (key & 0xFF) as u8 as char == self.exit_key)
    }

    fn close(&mut self) {
        if self.open {
            if let Err(err) = highgui::destroy_all_windows() {
                log::warn!("WindowDisplay: failed to close windows: {}", err);
            }
            self.open = false;
        }
    }
}

//! [`CaptureDevice`] backed by an OpenCV `VideoCapture` and a HighGUI window.

use std::path::Path;
use std::time::Duration;

use camcal_core::{CaptureDevice, CaptureError, Key};
use log::debug;
use opencv::{
    core::{Mat, Point, Scalar},
    highgui, imgcodecs, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

/// Title of the live preview window.
pub const PREVIEW_WINDOW: &str = "Camera Feed";

const OVERLAY_ORIGIN: (i32, i32) = (10, 30);
const OVERLAY_LINE_STEP: i32 = 30;
const OVERLAY_SCALE: f64 = 0.7;
const OVERLAY_THICKNESS: i32 = 2;

/// A local camera with a preview window.
pub struct OpenCvCamera {
    capture: VideoCapture,
}

impl OpenCvCamera {
    /// Open camera `index` with any available API.
    pub fn open(index: i32) -> Result<Self, CaptureError> {
        let capture = VideoCapture::new(index, videoio::CAP_ANY).map_err(|err| {
            CaptureError::Device {
                stage: "open",
                source: Box::new(err),
            }
        })?;
        let opened = capture.is_opened().map_err(|err| CaptureError::Device {
            stage: "open",
            source: Box::new(err),
        })?;
        if !opened {
            return Err(CaptureError::CameraUnavailable(index));
        }
        debug!("camera {index} opened");
        Ok(Self { capture })
    }
}

fn draw_overlay(frame: &Mat, lines: &[&str]) -> opencv::Result<Mat> {
    let mut display = frame.try_clone()?;
    for (i, text) in lines.iter().enumerate() {
        let origin = Point::new(
            OVERLAY_ORIGIN.0,
            OVERLAY_ORIGIN.1 + OVERLAY_LINE_STEP * i as i32,
        );
        imgproc::put_text(
            &mut display,
            text,
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            OVERLAY_SCALE,
            Scalar::new(0.0, 255.0, 0.0, 0.0),
            OVERLAY_THICKNESS,
            imgproc::LINE_8,
            false,
        )?;
    }
    Ok(display)
}

impl CaptureDevice for OpenCvCamera {
    type Frame = Mat;
    type Error = opencv::Error;

    fn grab(&mut self) -> opencv::Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn show(&mut self, frame: &Mat, overlay: &[&str]) -> opencv::Result<()> {
        if overlay.is_empty() {
            return highgui::imshow(PREVIEW_WINDOW, frame);
        }
        let display = draw_overlay(frame, overlay)?;
        highgui::imshow(PREVIEW_WINDOW, &display)
    }

    fn poll_key(&mut self, timeout: Duration) -> opencv::Result<Option<Key>> {
        let delay = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1);
        Ok(Key::from_code(highgui::wait_key(delay)?))
    }

    fn save(&mut self, frame: &Mat, path: &Path) -> opencv::Result<()> {
        let written = imgcodecs::imwrite_def(&path.to_string_lossy(), frame)?;
        if !written {
            return Err(opencv::Error::new(
                opencv::core::StsError,
                format!("could not write {}", path.display()),
            ));
        }
        Ok(())
    }

    fn release(&mut self) -> opencv::Result<()> {
        self.capture.release()?;
        highgui::destroy_all_windows()
    }
}

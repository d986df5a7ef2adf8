//! Key-triggered still capture from a live camera preview.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Instruction lines drawn over the preview when the overlay is enabled.
pub const OVERLAY_LINES: [&str; 2] = ["Press 'Spacebar' to capture image", "Press 'Esc' to exit"];

const KEY_ESCAPE: i32 = 27;
const KEY_SPACE: i32 = 32;

/// A key event from the preview window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Space,
    Other(i32),
}

impl Key {
    /// Decode a raw key code; negative codes mean "no key pressed".
    pub fn from_code(code: i32) -> Option<Self> {
        if code < 0 {
            return None;
        }
        Some(match code & 0xFF {
            KEY_ESCAPE => Key::Escape,
            KEY_SPACE => Key::Space,
            other => Key::Other(other),
        })
    }
}

/// Camera, preview window and frame writer used by a capture session.
pub trait CaptureDevice {
    type Frame;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Grab the next frame. `Ok(None)` means the grab failed.
    fn grab(&mut self) -> Result<Option<Self::Frame>, Self::Error>;

    /// Display `frame`, with `overlay` lines drawn on a display copy.
    fn show(&mut self, frame: &Self::Frame, overlay: &[&str]) -> Result<(), Self::Error>;

    /// Wait up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>, Self::Error>;

    /// Write the unmodified frame to `path`.
    fn save(&mut self, frame: &Self::Frame, path: &Path) -> Result<(), Self::Error>;

    /// Release the camera and close any display surface.
    fn release(&mut self) -> Result<(), Self::Error>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub output_dir: PathBuf,
    /// Draw the instruction overlay on the preview.
    pub show_overlay: bool,
    /// Accepted for compatibility with automatic capture setups; capture is
    /// always key-triggered and this value does not affect timing.
    pub delay_ms: u64,
    /// Key poll timeout per loop iteration, also paces the preview.
    pub poll_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("calibration_images"),
            show_overlay: false,
            delay_ms: 1000,
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Why a capture session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    ExitKey,
    GrabFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureSummary {
    pub saved: Vec<PathBuf>,
    pub stop: StopReason,
}

/// Create `dir` if needed. Returns `true` when it was created.
pub fn prepare_output_dir(dir: &Path) -> Result<bool, CaptureError> {
    if dir.is_dir() {
        info!(
            "Saving calibration images to existing directory: {}",
            dir.display()
        );
        return Ok(false);
    }
    fs::create_dir_all(dir)?;
    info!(
        "Created directory {} for saving calibration images.",
        dir.display()
    );
    Ok(true)
}

/// Path for a frame captured at `timestamp`.
///
/// Names are `calib_<YYYYMMDD_HHMMSS>.jpg`. When that file already exists
/// (two captures within one second), `_1`, `_2`, ... is appended so no
/// capture is overwritten.
pub fn capture_path(dir: &Path, timestamp: &NaiveDateTime) -> PathBuf {
    let stem = format!("calib_{}", timestamp.format("%Y%m%d_%H%M%S"));
    let first = dir.join(format!("{stem}.jpg"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|k| dir.join(format!("{stem}_{k}.jpg")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Run the preview loop until Escape or a failed grab.
///
/// `now` supplies the local wall-clock time used to name captures. The device
/// is released on every exit path, including errors.
pub fn run_capture<D, F>(
    device: &mut D,
    config: &CaptureConfig,
    mut now: F,
) -> Result<CaptureSummary, CaptureError>
where
    D: CaptureDevice,
    F: FnMut() -> NaiveDateTime,
{
    let result = capture_loop(device, config, &mut now);
    let released = device.release().map_err(CaptureError::device("release"));
    let summary = result?;
    released?;
    Ok(summary)
}

/// Prepare the output directory, open the device and run the preview loop.
///
/// `open` runs only after the directory exists, so a camera that cannot be
/// opened leaves the (empty) directory behind and nothing else.
pub fn run_capture_session<D, O, F>(
    config: &CaptureConfig,
    open: O,
    now: F,
) -> Result<CaptureSummary, CaptureError>
where
    D: CaptureDevice,
    O: FnOnce() -> Result<D, CaptureError>,
    F: FnMut() -> NaiveDateTime,
{
    prepare_output_dir(&config.output_dir)?;
    let mut device = open()?;
    run_capture(&mut device, config, now)
}

fn capture_loop<D, F>(
    device: &mut D,
    config: &CaptureConfig,
    now: &mut F,
) -> Result<CaptureSummary, CaptureError>
where
    D: CaptureDevice,
    F: FnMut() -> NaiveDateTime,
{
    let overlay: &[&str] = if config.show_overlay {
        &OVERLAY_LINES
    } else {
        &[]
    };
    let mut saved = Vec::new();

    loop {
        let Some(frame) = device.grab().map_err(CaptureError::device("grab"))? else {
            error!("Failed to grab frame from camera.");
            return Ok(CaptureSummary {
                saved,
                stop: StopReason::GrabFailed,
            });
        };

        device
            .show(&frame, overlay)
            .map_err(CaptureError::device("display"))?;

        match device
            .poll_key(config.poll_interval)
            .map_err(CaptureError::device("key poll"))?
        {
            Some(Key::Escape) => {
                info!("Exiting image capture.");
                return Ok(CaptureSummary {
                    saved,
                    stop: StopReason::ExitKey,
                });
            }
            Some(Key::Space) => {
                let path = capture_path(&config.output_dir, &now());
                device
                    .save(&frame, &path)
                    .map_err(CaptureError::device("save"))?;
                info!("Captured image saved as {}", path.display());
                saved.push(path);
            }
            Some(Key::Other(_)) | None => {}
        }
    }
}

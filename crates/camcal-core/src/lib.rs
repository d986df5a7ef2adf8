//! Chessboard camera calibration and calibration-image capture.
//!
//! This crate holds the pipelines and the data model. It does *not* depend on
//! any image library: pixel work is delegated to a [`VisionBackend`], the
//! reprojection chart to an [`ErrorChart`], and the live camera to a
//! [`CaptureDevice`]. The `camcal` crate provides the OpenCV-backed
//! implementations and the command-line tools.
//!
//! ## Quickstart
//!
//! ```no_run
//! # use camcal_core::{Board, CalibrationConfig, PatternSize, VisionBackend, ErrorChart};
//! # fn calibrate_dir<B: VisionBackend, C: ErrorChart>(backend: &B, chart: &C)
//! #     -> Result<(), camcal_core::CalibError> {
//! let pattern: PatternSize = "9x6".parse()?;
//! let board = Board::new(pattern, 25.0)?;
//! let config = CalibrationConfig::new("calibration_images", board);
//! let report = camcal_core::run(backend, chart, &config, &mut std::io::stdout())?;
//! println!("{} views", report.views.len());
//! # Ok(())
//! # }
//! ```

mod backend;
mod camera;
mod capture;
mod correspondence;
mod error;
mod pattern;
mod pipeline;
mod report;

pub use backend::{ErrorChart, ImageSize, SubPixCriteria, VisionBackend};
pub use camera::{reprojection_error, Calibration, CameraModel, Pose};
pub use capture::{
    capture_path, prepare_output_dir, run_capture, run_capture_session, CaptureConfig, CaptureDevice, CaptureSummary,
    Key, StopReason, OVERLAY_LINES,
};
pub use correspondence::{Correspondences, View};
pub use error::{BoxError, CalibError, CaptureError};
pub use pattern::{parse_pattern_size, Board, PatternSize};
pub use pipeline::{
    accumulate, calibrate, collect_images, detect_view, render_visualizations,
    reprojection_errors, run, write_calibration, CalibrationConfig, OutputLayout,
};
pub use report::{CalibrationReport, ViewReport};

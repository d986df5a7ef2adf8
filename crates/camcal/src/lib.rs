//! OpenCV-backed implementations of the `camcal-core` capabilities and the
//! argument parsing shared by the `camcal-calibrate` and `camcal-capture`
//! binaries.
//!
//! Building this crate requires the OpenCV development libraries (with the
//! `calib3d`, `highgui`, `imgcodecs`, `imgproc` and `videoio` modules).

mod backend;
mod camera;
mod chart;
pub mod cli;

pub use backend::{marker_color, OpenCvBackend, MARKER_RADIUS};
pub use camera::{OpenCvCamera, PREVIEW_WINDOW};
pub use chart::{ChartError, PlotChart, CHART_TITLE};

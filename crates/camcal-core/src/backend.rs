//! Capabilities the calibration pipeline needs from a vision library.
//!
//! The pipeline never touches pixels itself. Everything image-related goes
//! through [`VisionBackend`], and the chart goes through [`ErrorChart`], so
//! the stages can run against synthetic implementations in tests.

use std::path::Path;

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraModel, Calibration, Pose};
use crate::pattern::PatternSize;

/// Pixel dimensions of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Termination rule and search window for sub-pixel corner refinement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubPixCriteria {
    /// Stop after this many iterations.
    pub max_iterations: u32,
    /// Stop once a corner moves less than this many pixels in one step.
    pub epsilon: f64,
    /// Half side length of the search window, in pixels.
    pub window: (u32, u32),
    /// Half-size of the dead zone in the middle of the window, `(-1, -1)`
    /// disables it.
    pub zero_zone: (i32, i32),
}

impl Default for SubPixCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            epsilon: 0.001,
            window: (11, 11),
            zero_zone: (-1, -1),
        }
    }
}

/// Image I/O, detection, calibration and drawing, provided by a vision library.
pub trait VisionBackend {
    /// Color (or any displayable) image as loaded from disk.
    type Image;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load an image. `Ok(None)` means the file exists but could not be decoded.
    fn load_image(&self, path: &Path) -> Result<Option<Self::Image>, Self::Error>;

    fn image_size(&self, image: &Self::Image) -> ImageSize;

    /// Convert to a single-channel intensity image.
    fn to_grayscale(&self, image: &Self::Image) -> Result<Self::Image, Self::Error>;

    /// Locate the inner corners of a chessboard in a grayscale image.
    ///
    /// On success the corners are returned in row-major board order, matching
    /// [`crate::Board::object_points`].
    fn find_corners(
        &self,
        gray: &Self::Image,
        pattern: PatternSize,
    ) -> Result<Option<Vec<Point2<f32>>>, Self::Error>;

    /// Refine corner locations in place to sub-pixel accuracy.
    fn refine_corners(
        &self,
        gray: &Self::Image,
        corners: &mut [Point2<f32>],
        criteria: &SubPixCriteria,
    ) -> Result<(), Self::Error>;

    /// Solve for intrinsics, distortion and one pose per view.
    fn calibrate(
        &self,
        object_points: &[Vec<Point3<f32>>],
        image_points: &[Vec<Point2<f32>>],
        image_size: ImageSize,
    ) -> Result<Calibration, Self::Error>;

    /// Project board points through a camera model and pose.
    fn project_points(
        &self,
        object_points: &[Point3<f32>],
        pose: &Pose,
        camera: &CameraModel,
    ) -> Result<Vec<Point2<f32>>, Self::Error> {
        Ok(camera.project_all(pose, object_points))
    }

    /// Draw detected chessboard corners onto `image`.
    fn draw_corners(
        &self,
        image: &mut Self::Image,
        pattern: PatternSize,
        corners: &[Point2<f32>],
    ) -> Result<(), Self::Error>;

    /// Remove lens distortion, keeping the full field of view of the input.
    fn undistort(
        &self,
        image: &Self::Image,
        camera: &CameraModel,
    ) -> Result<Self::Image, Self::Error>;

    /// Draw a filled marker at each point.
    fn draw_markers(
        &self,
        image: &mut Self::Image,
        points: &[Point2<f32>],
    ) -> Result<(), Self::Error>;

    fn save_image(&self, image: &Self::Image, path: &Path) -> Result<(), Self::Error>;
}

/// Sink for the per-image reprojection error chart.
pub trait ErrorChart {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Render `errors[i]` against image number `i + 1` and save it to `path`.
    fn render(&self, errors: &[f64], path: &Path) -> Result<(), Self::Error>;

    /// Show a previously rendered chart to the user and wait until dismissed.
    fn present(&self, path: &Path) -> Result<(), Self::Error>;
}

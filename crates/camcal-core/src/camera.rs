//! Pinhole camera model with Brown-Conrady distortion.
//!
//! Parameter conventions follow OpenCV: the intrinsic matrix is
//! `[[fx, s, cx], [0, fy, cy], [0, 0, 1]]` and the distortion vector is
//! `[k1, k2, p1, p2, k3, k4, k5, k6, ...]`. Missing trailing coefficients are
//! treated as zero; coefficients past `k6` (thin prism, tilt) are ignored by
//! the reference projection here.

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Intrinsics and lens distortion of a calibrated camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub matrix: Matrix3<f64>,
    pub distortion: Vec<f64>,
}

/// Rigid transform from the board frame to the camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Rodrigues rotation vector (axis scaled by angle in radians).
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

/// Output of a single calibration solve.
///
/// `poses[i]` belongs to the i-th accepted view of the correspondences the
/// solve was run on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub camera: CameraModel,
    pub poses: Vec<Pose>,
    /// Overall RMS reprojection error reported by the solver, in pixels.
    pub rms: f64,
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }
}

impl CameraModel {
    pub fn new(matrix: Matrix3<f64>, distortion: Vec<f64>) -> Self {
        Self { matrix, distortion }
    }

    fn coeff(&self, idx: usize) -> f64 {
        self.distortion.get(idx).copied().unwrap_or(0.0)
    }

    /// Project a single board point seen under `pose` into pixel coordinates.
    ///
    /// Returns `None` for points at or behind the camera center.
    pub fn project(&self, pose: &Pose, point: &Point3<f32>) -> Option<Point2<f64>> {
        let p = Vector3::new(point.x as f64, point.y as f64, point.z as f64);
        let pc = pose.rotation() * p + pose.tvec;
        if pc.z <= f64::EPSILON {
            return None;
        }
        let x = pc.x / pc.z;
        let y = pc.y / pc.z;

        let (k1, k2, p1, p2, k3) = (
            self.coeff(0),
            self.coeff(1),
            self.coeff(2),
            self.coeff(3),
            self.coeff(4),
        );
        let (k4, k5, k6) = (self.coeff(5), self.coeff(6), self.coeff(7));

        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = (1.0 + k1 * r2 + k2 * r4 + k3 * r6) / (1.0 + k4 * r2 + k5 * r4 + k6 * r6);
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

        let k = &self.matrix;
        Some(Point2::new(
            k[(0, 0)] * xd + k[(0, 1)] * yd + k[(0, 2)],
            k[(1, 1)] * yd + k[(1, 2)],
        ))
    }

    /// Project a whole point set. Points behind the camera map to NaN so the
    /// output stays index-aligned with the input.
    pub fn project_all(&self, pose: &Pose, points: &[Point3<f32>]) -> Vec<Point2<f32>> {
        points
            .iter()
            .map(|p| match self.project(pose, p) {
                Some(px) => Point2::new(px.x as f32, px.y as f32),
                None => Point2::new(f32::NAN, f32::NAN),
            })
            .collect()
    }
}

/// Mean reprojection error of one view.
///
/// This is the L2 norm of the stacked per-point differences divided by the
/// point count, `sqrt(sum(|d_i|^2)) / n`, matching how OpenCV's calibration
/// tutorial reports per-image error. Empty input yields `0.0`.
pub fn reprojection_error(detected: &[Point2<f32>], projected: &[Point2<f32>]) -> f64 {
    let n = detected.len().min(projected.len());
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = detected
        .iter()
        .zip(projected)
        .map(|(a, b)| {
            let dx = (a.x - b.x) as f64;
            let dy = (a.y - b.y) as f64;
            dx * dx + dy * dy
        })
        .sum();
    sum_sq.sqrt() / n as f64
}

//! [`VisionBackend`] on top of OpenCV.

use std::path::Path;

use camcal_core::{
    Calibration, CameraModel, ImageSize, PatternSize, Pose, SubPixCriteria, VisionBackend,
};
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use opencv::{
    calib3d,
    core::{
        Mat, Point, Point2f, Point3f, Scalar, Size, TermCriteria, TermCriteria_EPS,
        TermCriteria_MAX_ITER, Vector,
    },
    imgcodecs, imgproc,
    prelude::*,
};

/// Radius in pixels of the reprojected-corner markers.
pub const MARKER_RADIUS: i32 = 5;

/// Color (BGR) of the reprojected-corner markers.
pub fn marker_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

/// OpenCV implementation of every pixel operation of the calibration pipeline.
///
/// Images are BGR [`Mat`]s as returned by `imread`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenCvBackend;

impl OpenCvBackend {
    pub fn new() -> Self {
        Self
    }
}

fn cv_size(size: ImageSize) -> Size {
    Size::new(size.width as i32, size.height as i32)
}

fn pattern_size(pattern: PatternSize) -> Size {
    Size::new(pattern.cols as i32, pattern.rows as i32)
}

fn to_cv_points(points: &[Point2<f32>]) -> Vector<Point2f> {
    points.iter().map(|p| Point2f::new(p.x, p.y)).collect()
}

fn from_cv_points(points: &Vector<Point2f>) -> Vec<Point2<f32>> {
    points.iter().map(|p| Point2::new(p.x, p.y)).collect()
}

fn to_cv_object(points: &[Point3<f32>]) -> Vector<Point3f> {
    points.iter().map(|p| Point3f::new(p.x, p.y, p.z)).collect()
}

fn camera_matrix_mat(matrix: &Matrix3<f64>) -> opencv::Result<Mat> {
    let rows: Vec<[f64; 3]> = (0..3)
        .map(|r| [matrix[(r, 0)], matrix[(r, 1)], matrix[(r, 2)]])
        .collect();
    Mat::from_slice_2d(rows.as_slice())
}

fn distortion_vec(distortion: &[f64]) -> Vector<f64> {
    Vector::from_slice(distortion)
}

fn read_vec3(mat: &Mat) -> opencv::Result<Vector3<f64>> {
    Ok(Vector3::new(
        *mat.at::<f64>(0)?,
        *mat.at::<f64>(1)?,
        *mat.at::<f64>(2)?,
    ))
}

fn read_camera(matrix: &Mat, distortion: &Mat) -> opencv::Result<CameraModel> {
    let mut k = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            k[(r, c)] = *matrix.at_2d::<f64>(r as i32, c as i32)?;
        }
    }
    let count = distortion.total();
    let coeffs = (0..count as i32)
        .map(|i| distortion.at::<f64>(i).copied())
        .collect::<opencv::Result<Vec<f64>>>()?;
    Ok(CameraModel::new(k, coeffs))
}

impl VisionBackend for OpenCvBackend {
    type Image = Mat;
    type Error = opencv::Error;

    fn load_image(&self, path: &Path) -> opencv::Result<Option<Mat>> {
        let image = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
        if image.empty() {
            return Ok(None);
        }
        Ok(Some(image))
    }

    fn image_size(&self, image: &Mat) -> ImageSize {
        ImageSize::new(image.cols().max(0) as u32, image.rows().max(0) as u32)
    }

    fn to_grayscale(&self, image: &Mat) -> opencv::Result<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
        Ok(gray)
    }

    fn find_corners(
        &self,
        gray: &Mat,
        pattern: PatternSize,
    ) -> opencv::Result<Option<Vec<Point2<f32>>>> {
        let mut corners = Vector::<Point2f>::new();
        let found =
            calib3d::find_chessboard_corners_def(gray, pattern_size(pattern), &mut corners)?;
        Ok(found.then(|| from_cv_points(&corners)))
    }

    fn refine_corners(
        &self,
        gray: &Mat,
        corners: &mut [Point2<f32>],
        criteria: &SubPixCriteria,
    ) -> opencv::Result<()> {
        let term = TermCriteria::new(
            TermCriteria_EPS + TermCriteria_MAX_ITER,
            criteria.max_iterations as i32,
            criteria.epsilon,
        )?;
        let mut refined = to_cv_points(corners);
        imgproc::corner_sub_pix(
            gray,
            &mut refined,
            Size::new(criteria.window.0 as i32, criteria.window.1 as i32),
            Size::new(criteria.zero_zone.0, criteria.zero_zone.1),
            term,
        )?;
        for (dst, src) in corners.iter_mut().zip(refined.iter()) {
            *dst = Point2::new(src.x, src.y);
        }
        Ok(())
    }

    fn calibrate(
        &self,
        object_points: &[Vec<Point3<f32>>],
        image_points: &[Vec<Point2<f32>>],
        image_size: ImageSize,
    ) -> opencv::Result<Calibration> {
        let objects: Vector<Vector<Point3f>> =
            object_points.iter().map(|v| to_cv_object(v)).collect();
        let images: Vector<Vector<Point2f>> =
            image_points.iter().map(|v| to_cv_points(v)).collect();

        let mut matrix = Mat::default();
        let mut distortion = Mat::default();
        let mut rvecs = Vector::<Mat>::new();
        let mut tvecs = Vector::<Mat>::new();
        let rms = calib3d::calibrate_camera_def(
            &objects,
            &images,
            cv_size(image_size),
            &mut matrix,
            &mut distortion,
            &mut rvecs,
            &mut tvecs,
        )?;

        let poses = rvecs
            .iter()
            .zip(tvecs.iter())
            .map(|(r, t)| -> opencv::Result<Pose> { Ok(Pose::new(read_vec3(&r)?, read_vec3(&t)?)) })
            .collect::<opencv::Result<Vec<_>>>()?;

        Ok(Calibration {
            camera: read_camera(&matrix, &distortion)?,
            poses,
            rms,
        })
    }

    fn project_points(
        &self,
        object_points: &[Point3<f32>],
        pose: &Pose,
        camera: &CameraModel,
    ) -> opencv::Result<Vec<Point2<f32>>> {
        let rvec = Vector::<f64>::from_slice(pose.rvec.as_slice());
        let tvec = Vector::<f64>::from_slice(pose.tvec.as_slice());
        let mut projected = Vector::<Point2f>::new();
        calib3d::project_points_def(
            &to_cv_object(object_points),
            &rvec,
            &tvec,
            &camera_matrix_mat(&camera.matrix)?,
            &distortion_vec(&camera.distortion),
            &mut projected,
        )?;
        Ok(from_cv_points(&projected))
    }

    fn draw_corners(
        &self,
        image: &mut Mat,
        pattern: PatternSize,
        corners: &[Point2<f32>],
    ) -> opencv::Result<()> {
        calib3d::draw_chessboard_corners(image, pattern_size(pattern), &to_cv_points(corners), true)
    }

    fn undistort(&self, image: &Mat, camera: &CameraModel) -> opencv::Result<Mat> {
        let matrix = camera_matrix_mat(&camera.matrix)?;
        let distortion = distortion_vec(&camera.distortion);
        let size = image.size()?;
        // alpha = 1 keeps every source pixel in view.
        let new_matrix = calib3d::get_optimal_new_camera_matrix(
            &matrix,
            &distortion,
            size,
            1.0,
            size,
            None,
            false,
        )?;
        let mut undistorted = Mat::default();
        calib3d::undistort(image, &mut undistorted, &matrix, &distortion, &new_matrix)?;
        Ok(undistorted)
    }

    fn draw_markers(&self, image: &mut Mat, points: &[Point2<f32>]) -> opencv::Result<()> {
        for p in points.iter().filter(|p| p.x.is_finite() && p.y.is_finite()) {
            imgproc::circle(
                image,
                Point::new(p.x as i32, p.y as i32),
                MARKER_RADIUS,
                marker_color(),
                imgproc::FILLED,
                imgproc::LINE_8,
                0,
            )?;
        }
        Ok(())
    }

    fn save_image(&self, image: &Mat, path: &Path) -> opencv::Result<()> {
        let written = imgcodecs::imwrite_def(&path.to_string_lossy(), image)?;
        if !written {
            return Err(opencv::Error::new(
                opencv::core::StsError,
                format!("could not write {}", path.display()),
            ));
        }
        Ok(())
    }
}

//! Planar chessboard calibration, run as one linear pipeline:
//!
//! 1. enumerate `*.jpg` inputs,
//! 2. detect and refine corners per image and accumulate correspondences,
//! 3. solve once for intrinsics, distortion and per-view poses,
//! 4. measure per-view reprojection error and chart it,
//! 5. write annotated original and undistorted copies of every input.
//!
//! Fatal conditions (no images, no detections) are all checked before the
//! first output file is written.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::backend::{ErrorChart, SubPixCriteria, VisionBackend};
use crate::camera::{Calibration, CameraModel, Pose};
use crate::correspondence::Correspondences;
use crate::error::CalibError;
use crate::pattern::{Board, PatternSize};
use crate::report::CalibrationReport;

const IMAGE_EXTENSION: &str = "jpg";

/// Where the pipeline writes its artifacts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLayout {
    pub root: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn chart_path(&self) -> PathBuf {
        self.root.join("reprojection_error.png")
    }

    pub fn original_dir(&self) -> PathBuf {
        self.root.join("original")
    }

    pub fn undistorted_dir(&self) -> PathBuf {
        self.root.join("undistorted")
    }

    /// `original/original_<n>.png`, `n` is 1-based.
    pub fn original_path(&self, n: usize) -> PathBuf {
        self.original_dir().join(format!("original_{n}.png"))
    }

    /// `undistorted/undistorted_<n>.png`, `n` is 1-based.
    pub fn undistorted_path(&self, n: usize) -> PathBuf {
        self.undistorted_dir().join(format!("undistorted_{n}.png"))
    }
}

/// Everything a calibration run needs, fixed at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub images_dir: PathBuf,
    pub board: Board,
    pub subpix: SubPixCriteria,
    pub output: OutputLayout,
    /// Show the reprojection error chart interactively after saving it.
    pub show_chart: bool,
    /// Optional JSON report destination.
    pub report_path: Option<PathBuf>,
}

impl CalibrationConfig {
    pub fn new(images_dir: impl Into<PathBuf>, board: Board) -> Self {
        Self {
            images_dir: images_dir.into(),
            board,
            subpix: SubPixCriteria::default(),
            output: OutputLayout::default(),
            show_chart: true,
            report_path: None,
        }
    }
}

/// List `*.jpg` files directly inside `dir`, sorted by file name.
///
/// Hidden files and sub-directories are ignored. An empty result, or a
/// directory that does not exist, is [`CalibError::NoImages`].
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>, CalibError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CalibError::NoImages(dir.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        let is_jpg = path.extension().and_then(|e| e.to_str()) == Some(IMAGE_EXTENSION);
        if is_jpg && !hidden {
            images.push(path);
        }
    }
    if images.is_empty() {
        return Err(CalibError::NoImages(dir.to_path_buf()));
    }
    images.sort();
    Ok(images)
}

/// Detect and refine chessboard corners in one loaded image.
///
/// `Ok(None)` means the pattern was not found.
pub fn detect_view<B: VisionBackend>(
    backend: &B,
    image: &B::Image,
    pattern: PatternSize,
    criteria: &SubPixCriteria,
) -> Result<Option<Vec<Point2<f32>>>, B::Error> {
    let gray = backend.to_grayscale(image)?;
    let Some(mut corners) = backend.find_corners(&gray, pattern)? else {
        return Ok(None);
    };
    backend.refine_corners(&gray, &mut corners, criteria)?;
    Ok(Some(corners))
}

/// Run detection over every input image and collect the accepted views.
///
/// Unreadable images and backend failures are logged and skipped; images
/// without a detectable pattern contribute nothing.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(images = images.len(), pattern = %board.pattern))
)]
pub fn accumulate<B: VisionBackend>(
    backend: &B,
    images: &[PathBuf],
    board: &Board,
    criteria: &SubPixCriteria,
) -> Correspondences {
    let template = board.object_points();
    let mut correspondences = Correspondences::new();

    for (idx, path) in images.iter().enumerate() {
        let image = match backend.load_image(path) {
            Ok(Some(image)) => image,
            Ok(None) => {
                warn!("Failed to load image {}. Skipping.", path.display());
                continue;
            }
            Err(err) => {
                warn!("Failed to load image {}: {err}. Skipping.", path.display());
                continue;
            }
        };
        correspondences.note_image_size(backend.image_size(&image));

        match detect_view(backend, &image, board.pattern, criteria) {
            Ok(Some(corners)) if corners.len() != board.pattern.corner_count() => warn!(
                "{}: expected {} corners, detector returned {}. Skipping.",
                path.display(),
                board.pattern.corner_count(),
                corners.len()
            ),
            Ok(Some(corners)) => {
                debug!("{}: {} corners", path.display(), corners.len());
                correspondences.push(idx, path, template.clone(), corners);
            }
            Ok(None) => debug!("{}: chessboard {} not found", path.display(), board.pattern),
            Err(err) => warn!("Corner detection failed on {}: {err}. Skipping.", path.display()),
        }
    }

    correspondences
}

/// Solve the calibration over all accepted views.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(views = correspondences.len()))
)]
pub fn calibrate<B: VisionBackend>(
    backend: &B,
    correspondences: &Correspondences,
) -> Result<Calibration, CalibError> {
    let image_size = match correspondences.last_image_size() {
        Some(size) if !correspondences.is_empty() => size,
        _ => return Err(CalibError::NoDetections),
    };

    let calibration = backend
        .calibrate(
            correspondences.object_points(),
            correspondences.image_points(),
            image_size,
        )
        .map_err(CalibError::backend("calibration"))?;

    if calibration.poses.len() != correspondences.len() {
        return Err(CalibError::PoseCountMismatch {
            views: correspondences.len(),
            poses: calibration.poses.len(),
        });
    }
    info!(
        "calibrated {} views at {}x{}, rms {:.4}",
        correspondences.len(),
        image_size.width,
        image_size.height,
        calibration.rms
    );
    Ok(calibration)
}

/// Per-view reprojection error, index-aligned with the accepted views.
pub fn reprojection_errors<B: VisionBackend>(
    backend: &B,
    correspondences: &Correspondences,
    calibration: &Calibration,
) -> Result<Vec<f64>, CalibError> {
    correspondences
        .object_points()
        .iter()
        .zip(correspondences.image_points())
        .zip(&calibration.poses)
        .map(|((object, detected), pose)| -> Result<f64, CalibError> {
            let projected = backend
                .project_points(object, pose, &calibration.camera)
                .map_err(CalibError::backend("point projection"))?;
            Ok(crate::camera::reprojection_error(detected, &projected))
        })
        .collect()
}

/// Print the camera matrix and distortion coefficients.
pub fn write_calibration<W: Write>(out: &mut W, calibration: &Calibration) -> std::io::Result<()> {
    let camera = &calibration.camera;
    writeln!(out, "Camera matrix:")?;
    writeln!(out, "{}", format_camera_matrix(camera))?;
    writeln!(out)?;
    writeln!(out, "Distortion coefficients:")?;
    writeln!(out, "{}", format_row(&camera.distortion))?;
    writeln!(out)?;
    writeln!(out, "RMS reprojection error: {:.6}", calibration.rms)
}

fn format_row(values: &[f64]) -> String {
    let cells: Vec<String> = values.iter().map(|v| format!("{v:.8e}")).collect();
    format!("[{}]", cells.join(" "))
}

fn format_camera_matrix(camera: &CameraModel) -> String {
    let rows: Vec<String> = camera
        .matrix
        .row_iter()
        .map(|row| format_row(&[row[0], row[1], row[2]]))
        .collect();
    format!("[{}]", rows.join("\n "))
}

/// Load, re-detect, draw and save before/after copies of every input image.
///
/// Detection here is independent of the calibration stage; an image without
/// a detectable board still gets an (undecorated) original and undistorted
/// copy. Reprojected corners are drawn on image `idx` whenever a pose with
/// the same index exists, so once an earlier image failed detection the pose
/// belongs to a later image. A failure on one image is logged and the image
/// is skipped. Returns the number of images written.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(images = images.len()))
)]
pub fn render_visualizations<B: VisionBackend>(
    backend: &B,
    images: &[PathBuf],
    board: &Board,
    correspondences: &Correspondences,
    calibration: &Calibration,
    layout: &OutputLayout,
) -> Result<usize, CalibError> {
    fs::create_dir_all(layout.original_dir())?;
    fs::create_dir_all(layout.undistorted_dir())?;

    let template = board.object_points();
    let mut written = 0;
    for (idx, path) in images.iter().enumerate() {
        let image = match backend.load_image(path) {
            Ok(Some(image)) => image,
            Ok(None) => {
                warn!("Failed to load image {}. Skipping.", path.display());
                continue;
            }
            Err(err) => {
                warn!("Failed to load image {}: {err}. Skipping.", path.display());
                continue;
            }
        };

        let pose = calibration.poses.get(idx);
        if pose.is_some() && correspondences.view_for_image(idx) != Some(idx) {
            debug!(
                "{}: drawing pose {idx}, which was solved from {}",
                path.display(),
                correspondences
                    .source_path(idx)
                    .map_or_else(|| "another image".to_string(), |p| p.display().to_string())
            );
        }
        let markers = pose.map(|pose| (template.as_slice(), pose));

        match render_image(backend, image, board.pattern, markers, calibration, layout, idx + 1) {
            Ok(()) => written += 1,
            Err(err) => warn!(
                "Failed to write visualizations for {}: {err}. Skipping.",
                path.display()
            ),
        }
    }
    Ok(written)
}

/// Write `original_<n>` and `undistorted_<n>` for one loaded image.
fn render_image<B: VisionBackend>(
    backend: &B,
    mut image: B::Image,
    pattern: PatternSize,
    markers: Option<(&[Point3<f32>], &Pose)>,
    calibration: &Calibration,
    layout: &OutputLayout,
    n: usize,
) -> Result<(), CalibError> {
    let corners = backend
        .to_grayscale(&image)
        .and_then(|gray| backend.find_corners(&gray, pattern));
    match corners {
        Ok(Some(corners)) => backend
            .draw_corners(&mut image, pattern, &corners)
            .map_err(CalibError::backend("drawing corners"))?,
        Ok(None) => {}
        Err(err) => debug!("image {n}: re-detection failed: {err}"),
    }
    backend
        .save_image(&image, &layout.original_path(n))
        .map_err(CalibError::backend("saving original image"))?;

    let mut undistorted = backend
        .undistort(&image, &calibration.camera)
        .map_err(CalibError::backend("undistortion"))?;
    if let Some((object, pose)) = markers {
        let projected = backend
            .project_points(object, pose, &calibration.camera)
            .map_err(CalibError::backend("point projection"))?;
        backend
            .draw_markers(&mut undistorted, &projected)
            .map_err(CalibError::backend("drawing markers"))?;
    }
    backend
        .save_image(&undistorted, &layout.undistorted_path(n))
        .map_err(CalibError::backend("saving undistorted image"))
}

/// Run the whole calibration pipeline, writing console output to `out`.
pub fn run<B, C, W>(
    backend: &B,
    chart: &C,
    config: &CalibrationConfig,
    out: &mut W,
) -> Result<CalibrationReport, CalibError>
where
    B: VisionBackend,
    C: ErrorChart,
    W: Write,
{
    let images = collect_images(&config.images_dir)?;
    info!(
        "found {} images in {}",
        images.len(),
        config.images_dir.display()
    );

    let correspondences = accumulate(backend, &images, &config.board, &config.subpix);
    info!(
        "chessboard {} detected in {}/{} images",
        config.board.pattern,
        correspondences.len(),
        images.len()
    );

    let calibration = calibrate(backend, &correspondences)?;
    write_calibration(out, &calibration)?;

    let errors = reprojection_errors(backend, &correspondences, &calibration)?;

    fs::create_dir_all(&config.output.root)?;
    let chart_path = config.output.chart_path();
    chart
        .render(&errors, &chart_path)
        .map_err(|err| CalibError::Chart(Box::new(err)))?;
    info!("reprojection error chart saved to {}", chart_path.display());
    if config.show_chart {
        chart
            .present(&chart_path)
            .map_err(|err| CalibError::Chart(Box::new(err)))?;
    }

    let written = render_visualizations(
        backend,
        &images,
        &config.board,
        &correspondences,
        &calibration,
        &config.output,
    )?;
    info!("wrote {written} original/undistorted image pairs");

    let report = CalibrationReport::new(config, images.len(), &correspondences, calibration, &errors);
    if let Some(path) = &config.report_path {
        report.write_json(path)?;
        info!("report saved to {}", path.display());
    }

    writeln!(
        out,
        "Calibration and visualization completed. Check the '{}' and '{}' folders for results.",
        config.output.original_dir().display(),
        config.output.undistorted_dir().display()
    )?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    #[test]
    fn layout_uses_one_based_names() {
        let layout = OutputLayout::new("out");
        assert_eq!(layout.chart_path(), Path::new("out/reprojection_error.png"));
        assert_eq!(layout.original_path(1), Path::new("out/original/original_1.png"));
        assert_eq!(
            layout.undistorted_path(12),
            Path::new("out/undistorted/undistorted_12.png")
        );
    }

    #[test]
    fn collect_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.jpg", "c.png", "d.JPG", ".hidden.jpg", "e.jpeg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let images = collect_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);
    }

    #[test]
    fn collect_images_rejects_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let err = collect_images(dir.path()).unwrap_err();
        assert!(matches!(err, CalibError::NoImages(ref p) if p == dir.path()));
    }

    #[test]
    fn collect_images_reports_missing_dir_as_no_images() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = collect_images(&missing).unwrap_err();
        assert!(matches!(err, CalibError::NoImages(ref p) if p == &missing));
        assert!(err.to_string().starts_with("no images found in"));
    }

    #[test]
    fn calibration_printout_has_matrix_and_coefficients() {
        let calibration = Calibration {
            camera: CameraModel::new(
                Matrix3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0),
                vec![0.1, -0.2, 0.0, 0.0, 0.05],
            ),
            poses: vec![Pose::new(Vector3::zeros(), Vector3::z())],
            rms: 0.25,
        };
        let mut out = Vec::new();
        write_calibration(&mut out, &calibration).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Camera matrix:");
        assert!(lines[1].starts_with("[[8.00000000e2 "));
        assert!(lines[3].ends_with("1.00000000e0]]"));
        assert_eq!(lines[5], "Distortion coefficients:");
        assert_eq!(lines[6].split_whitespace().count(), 5);
        assert!(text.contains("RMS reprojection error: 0.250000"));
    }
}

//! Synthetic backends shared by the integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camcal_core::{
    Board, Calibration, CameraModel, CaptureDevice, ErrorChart, ImageSize, Key, PatternSize,
    Pose, SubPixCriteria, VisionBackend,
};
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SynthError(pub String);

/// On-disk description of a synthetic image.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SynthImage {
    pub width: u32,
    pub height: u32,
    /// Index into [`SyntheticBackend::poses`] when the board is visible.
    pub view: Option<usize>,
    #[serde(default)]
    pub gray: bool,
    #[serde(default)]
    pub marks: Vec<String>,
}

impl SynthImage {
    pub fn load(path: &Path) -> SynthImage {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }
}

/// Renders chessboard "images" by projecting the board through a known camera.
pub struct SyntheticBackend {
    pub board: Board,
    pub camera: CameraModel,
    pub poses: Vec<Pose>,
    /// Offset added by detection and removed again by refinement.
    pub detection_bias: f32,
    /// Corners the detector leaves off the end of each detection.
    pub dropped_corners: usize,
    pub refine_calls: Cell<usize>,
    pub solve_size: RefCell<Option<ImageSize>>,
}

pub fn truth_camera() -> CameraModel {
    CameraModel::new(
        Matrix3::new(810.0, 0.0, 322.0, 0.0, 805.0, 238.0, 0.0, 0.0, 1.0),
        vec![-0.12, 0.05, 0.001, -0.0005, 0.0],
    )
}

pub fn truth_poses() -> Vec<Pose> {
    vec![
        Pose::new(Vector3::new(0.05, -0.1, 0.02), Vector3::new(-100.0, -60.0, 600.0)),
        Pose::new(Vector3::new(-0.2, 0.1, 0.0), Vector3::new(-90.0, -70.0, 650.0)),
        Pose::new(Vector3::new(0.15, 0.25, -0.05), Vector3::new(-120.0, -50.0, 700.0)),
        Pose::new(Vector3::new(0.0, -0.3, 0.1), Vector3::new(-80.0, -65.0, 620.0)),
        Pose::new(Vector3::new(0.3, 0.0, 0.2), Vector3::new(-110.0, -40.0, 680.0)),
    ]
}

impl SyntheticBackend {
    pub fn new(pattern: PatternSize) -> Self {
        Self {
            board: Board::new(pattern, 25.0).unwrap(),
            camera: truth_camera(),
            poses: truth_poses(),
            detection_bias: 0.4,
            dropped_corners: 0,
            refine_calls: Cell::new(0),
            solve_size: RefCell::new(None),
        }
    }

    /// Exact pixel positions of the board corners in view `view`.
    pub fn ideal_corners(&self, view: usize) -> Vec<Point2<f32>> {
        self.camera
            .project_all(&self.poses[view], &self.board.object_points())
    }

    fn match_pose(&self, points: &[Point2<f32>]) -> Option<Pose> {
        let first = points.first()?;
        (0..self.poses.len())
            .find(|&v| {
                let ideal = self.ideal_corners(v)[0];
                (ideal.x - first.x).abs() < 1e-3 && (ideal.y - first.y).abs() < 1e-3
            })
            .map(|v| self.poses[v])
    }
}

impl VisionBackend for SyntheticBackend {
    type Image = SynthImage;
    type Error = SynthError;

    fn load_image(&self, path: &Path) -> Result<Option<SynthImage>, SynthError> {
        let raw = fs::read_to_string(path).map_err(|e| SynthError(e.to_string()))?;
        Ok(serde_json::from_str(&raw).ok())
    }

    fn image_size(&self, image: &SynthImage) -> ImageSize {
        ImageSize::new(image.width, image.height)
    }

    fn to_grayscale(&self, image: &SynthImage) -> Result<SynthImage, SynthError> {
        Ok(SynthImage {
            gray: true,
            ..image.clone()
        })
    }

    fn find_corners(
        &self,
        gray: &SynthImage,
        pattern: PatternSize,
    ) -> Result<Option<Vec<Point2<f32>>>, SynthError> {
        if !gray.gray {
            return Err(SynthError("detection needs a grayscale image".into()));
        }
        if pattern != self.board.pattern {
            return Ok(None);
        }
        Ok(gray.view.map(|v| {
            let mut corners: Vec<_> = self
                .ideal_corners(v)
                .into_iter()
                .map(|p| Point2::new(p.x + self.detection_bias, p.y))
                .collect();
            corners.truncate(corners.len().saturating_sub(self.dropped_corners));
            corners
        }))
    }

    fn refine_corners(
        &self,
        _gray: &SynthImage,
        corners: &mut [Point2<f32>],
        criteria: &SubPixCriteria,
    ) -> Result<(), SynthError> {
        assert_eq!(*criteria, SubPixCriteria::default());
        self.refine_calls.set(self.refine_calls.get() + 1);
        for c in corners.iter_mut() {
            c.x -= self.detection_bias;
        }
        Ok(())
    }

    fn calibrate(
        &self,
        object_points: &[Vec<Point3<f32>>],
        image_points: &[Vec<Point2<f32>>],
        image_size: ImageSize,
    ) -> Result<Calibration, SynthError> {
        assert_eq!(object_points.len(), image_points.len());
        *self.solve_size.borrow_mut() = Some(image_size);
        let poses = image_points
            .iter()
            .map(|pts| {
                self.match_pose(pts)
                    .ok_or_else(|| SynthError("unknown view".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Calibration {
            camera: self.camera.clone(),
            poses,
            rms: 0.0,
        })
    }

    fn draw_corners(
        &self,
        image: &mut SynthImage,
        _pattern: PatternSize,
        corners: &[Point2<f32>],
    ) -> Result<(), SynthError> {
        image.marks.push(format!("corners:{}", corners.len()));
        Ok(())
    }

    fn undistort(
        &self,
        image: &SynthImage,
        _camera: &CameraModel,
    ) -> Result<SynthImage, SynthError> {
        let mut out = image.clone();
        out.marks.push("undistorted".into());
        Ok(out)
    }

    fn draw_markers(
        &self,
        image: &mut SynthImage,
        points: &[Point2<f32>],
    ) -> Result<(), SynthError> {
        image.marks.push(format!("markers:{}", points.len()));
        Ok(())
    }

    fn save_image(&self, image: &SynthImage, path: &Path) -> Result<(), SynthError> {
        let json = serde_json::to_string(image).map_err(|e| SynthError(e.to_string()))?;
        fs::write(path, json).map_err(|e| SynthError(e.to_string()))
    }
}

/// Write a synthetic image file.
pub fn write_image(dir: &Path, name: &str, width: u32, height: u32, view: Option<usize>) -> PathBuf {
    let path = dir.join(name);
    let image = SynthImage {
        width,
        height,
        view,
        ..SynthImage::default()
    };
    fs::write(&path, serde_json::to_string(&image).unwrap()).unwrap();
    path
}

/// Write a file the synthetic backend cannot decode.
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"\xff\xd8 truncated").unwrap();
    path
}

#[derive(Default)]
pub struct RecordingChart {
    pub rendered: RefCell<Vec<f64>>,
    pub presented: Cell<bool>,
}

impl ErrorChart for RecordingChart {
    type Error = std::io::Error;

    fn render(&self, errors: &[f64], path: &Path) -> Result<(), std::io::Error> {
        *self.rendered.borrow_mut() = errors.to_vec();
        let body: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        fs::write(path, body.join("\n"))
    }

    fn present(&self, _path: &Path) -> Result<(), std::io::Error> {
        self.presented.set(true);
        Ok(())
    }
}

/// Scripted camera: frames are plain integers, `None` simulates a failed grab.
#[derive(Default)]
pub struct ScriptedCamera {
    pub frames: VecDeque<Option<u32>>,
    pub keys: VecDeque<Option<Key>>,
    pub shown: Vec<(u32, Vec<String>)>,
    pub saved: Vec<(u32, PathBuf)>,
    pub released: bool,
    pub fail_save: bool,
}

impl ScriptedCamera {
    pub fn new(frames: impl IntoIterator<Item = Option<u32>>, keys: impl IntoIterator<Item = Option<Key>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            keys: keys.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl CaptureDevice for ScriptedCamera {
    type Frame = u32;
    type Error = std::io::Error;

    fn grab(&mut self) -> Result<Option<u32>, std::io::Error> {
        Ok(self.frames.pop_front().flatten())
    }

    fn show(&mut self, frame: &u32, overlay: &[&str]) -> Result<(), std::io::Error> {
        self.shown
            .push((*frame, overlay.iter().map(|s| s.to_string()).collect()));
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>, std::io::Error> {
        assert!(timeout <= Duration::from_millis(10));
        Ok(self.keys.pop_front().flatten())
    }

    fn save(&mut self, frame: &u32, path: &Path) -> Result<(), std::io::Error> {
        if self.fail_save {
            return Err(std::io::Error::other("disk full"));
        }
        fs::write(path, frame.to_string())?;
        self.saved.push((*frame, path.to_path_buf()));
        Ok(())
    }

    fn release(&mut self) -> Result<(), std::io::Error> {
        self.released = true;
        Ok(())
    }
}

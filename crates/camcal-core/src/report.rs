//! JSON report of a calibration run.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::ImageSize;
use crate::camera::Calibration;
use crate::correspondence::Correspondences;
use crate::error::CalibError;
use crate::pattern::Board;
use crate::pipeline::CalibrationConfig;

/// Per-view entry of a [`CalibrationReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewReport {
    pub path: String,
    /// Position of the image in the enumerated input list, 0-based.
    pub image_index: usize,
    pub reprojection_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub images_dir: String,
    pub board: Board,
    pub image_size: Option<ImageSize>,
    pub images_found: usize,
    pub calibration: Calibration,
    pub views: Vec<ViewReport>,
}

impl CalibrationReport {
    /// Assemble a report; `errors` is index-aligned with the accepted views.
    pub fn new(
        config: &CalibrationConfig,
        images_found: usize,
        correspondences: &Correspondences,
        calibration: Calibration,
        errors: &[f64],
    ) -> Self {
        let views = correspondences
            .views()
            .zip(errors)
            .map(|(view, &err)| ViewReport {
                path: view.path.to_string_lossy().into_owned(),
                image_index: view.image_index,
                reprojection_error: err,
            })
            .collect();
        Self {
            images_dir: config.images_dir.to_string_lossy().into_owned(),
            board: config.board,
            image_size: correspondences.last_image_size(),
            images_found,
            calibration,
            views,
        }
    }

    /// Mean of the per-view reprojection errors, `None` without views.
    pub fn mean_reprojection_error(&self) -> Option<f64> {
        if self.views.is_empty() {
            return None;
        }
        let sum: f64 = self.views.iter().map(|v| v.reprojection_error).sum();
        Some(sum / self.views.len() as f64)
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

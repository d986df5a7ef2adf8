use std::path::PathBuf;

/// Boxed error coming out of a backend or chart implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort a calibration run.
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error("invalid pattern size {0:?}, use a format like 9x6")]
    InvalidPatternSize(String),

    #[error("invalid square size {0}, expected a positive finite number")]
    InvalidSquareSize(f32),

    #[error("no images found in {}, please check the path", .0.display())]
    NoImages(PathBuf),

    #[error("no corners were found in any image, calibration failed")]
    NoDetections,

    #[error("calibration returned {poses} poses for {views} views")]
    PoseCountMismatch { views: usize, poses: usize },

    #[error("vision backend failed during {stage}")]
    Backend {
        stage: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("failed to render the reprojection error chart")]
    Chart(#[source] BoxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CalibError {
    pub(crate) fn backend<E>(stage: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |err| CalibError::Backend {
            stage,
            source: Box::new(err),
        }
    }
}

/// Errors that abort a capture session.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("cannot access the camera (device index {0})")]
    CameraUnavailable(i32),

    #[error("capture device failed during {stage}")]
    Device {
        stage: &'static str,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub(crate) fn device<E>(stage: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |err| CaptureError::Device {
            stage,
            source: Box::new(err),
        }
    }
}

//! Command-line arguments of the two tools and their conversion to run configs.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use camcal_core::{
    parse_pattern_size, Board, CalibError, CalibrationConfig, CaptureConfig, OutputLayout,
};
use clap::Parser;
use log::LevelFilter;

/// Camera calibration using chessboard images.
#[derive(Parser, Debug)]
#[command(name = "camcal-calibrate", version, about)]
pub struct CalibrateArgs {
    /// Directory containing the calibration images (*.jpg).
    #[arg(long, value_name = "DIR")]
    pub images: PathBuf,

    /// Number of inner corners per chessboard row and column, e.g. 9x6.
    #[arg(long, value_name = "CxR", default_value = "9x6")]
    pub pattern_size: String,

    /// Size of one chessboard square in your unit of choice (e.g. millimeters).
    #[arg(long, default_value_t = 25.0)]
    pub square_size: f32,

    /// Directory that receives the chart and the original/ and undistorted/ folders.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Do not open a window with the reprojection error chart.
    #[arg(long)]
    pub no_show: bool,

    /// Write a JSON report of the calibration to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl CalibrateArgs {
    pub fn to_config(&self) -> Result<CalibrationConfig, CalibError> {
        let pattern = parse_pattern_size(&self.pattern_size)?;
        let board = Board::new(pattern, self.square_size)?;
        let mut config = CalibrationConfig::new(&self.images, board);
        config.output = OutputLayout::new(&self.output_dir);
        config.show_chart = !self.no_show;
        config.report_path = self.report.clone();
        Ok(config)
    }
}

/// Capture images from a webcam for calibration.
#[derive(Parser, Debug)]
#[command(name = "camcal-capture", version, about)]
pub struct CaptureArgs {
    /// Directory to save captured images.
    #[arg(long, value_name = "DIR", default_value = "calibration_images")]
    pub output: PathBuf,

    /// Show instructions on the video feed.
    #[arg(long)]
    pub show: bool,

    /// Delay between captures in milliseconds (capture stays key-triggered).
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub delay: u64,

    /// Index of the camera device to open.
    #[arg(long, default_value_t = 0)]
    pub camera: i32,

    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl CaptureArgs {
    pub fn to_config(&self) -> CaptureConfig {
        CaptureConfig {
            output_dir: self.output.clone(),
            show_overlay: self.show,
            delay_ms: self.delay,
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Install the process-wide logger at `level`, `RUST_LOG` directives still apply.
#[cfg(not(feature = "tracing"))]
pub fn init_logging(level: LevelFilter) {
    if let Err(err) = logger_builder(level).try_init() {
        eprintln!("failed to initialize logging: {err}");
    }
}

#[cfg(not(feature = "tracing"))]
fn logger_builder(level: LevelFilter) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .target(env_logger::Target::Stderr);
    builder
}

/// Install the tracing subscriber, `RUST_LOG` overrides `level`.
#[cfg(feature = "tracing")]
pub fn init_logging(level: LevelFilter) {
    use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_ascii_lowercase()));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to initialize logging: {err}");
    }
}

/// Print `err` and its chain of causes to stderr.
pub fn print_error(err: &dyn Error) {
    eprintln!("Error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcal_core::PatternSize;
    use clap::CommandFactory;

    #[test]
    fn commands_are_well_formed() {
        CalibrateArgs::command().debug_assert();
        CaptureArgs::command().debug_assert();
    }

    #[test]
    fn calibrate_defaults() {
        let args = CalibrateArgs::try_parse_from(["camcal-calibrate", "--images", "imgs"]).unwrap();
        let config = args.to_config().unwrap();
        assert_eq!(config.board.pattern, PatternSize::new(9, 6));
        assert_eq!(config.board.square_size, 25.0);
        assert_eq!(config.output, OutputLayout::new("."));
        assert!(config.show_chart);
        assert!(config.report_path.is_none());
        assert_eq!(args.log_level, LevelFilter::Info);
    }

    #[test]
    fn calibrate_flags() {
        let args = CalibrateArgs::try_parse_from([
            "camcal-calibrate",
            "--images",
            "imgs",
            "--pattern-size",
            "7x5",
            "--square-size",
            "30",
            "--output-dir",
            "out",
            "--no-show",
            "--report",
            "out/report.json",
        ])
        .unwrap();
        let config = args.to_config().unwrap();
        assert_eq!(config.board.pattern, PatternSize::new(7, 5));
        assert_eq!(config.board.square_size, 30.0);
        assert_eq!(config.output.chart_path(), PathBuf::from("out/reprojection_error.png"));
        assert!(!config.show_chart);
        assert_eq!(config.report_path, Some(PathBuf::from("out/report.json")));
    }

    #[test]
    fn images_are_required() {
        assert!(CalibrateArgs::try_parse_from(["camcal-calibrate"]).is_err());
    }

    #[test]
    fn bad_pattern_is_a_config_error() {
        let args = CalibrateArgs::try_parse_from([
            "camcal-calibrate",
            "--images",
            "imgs",
            "--pattern-size",
            "9by6",
        ])
        .unwrap();
        assert!(matches!(
            args.to_config(),
            Err(CalibError::InvalidPatternSize(_))
        ));
    }

    #[test]
    fn capture_defaults() {
        let args = CaptureArgs::try_parse_from(["camcal-capture"]).unwrap();
        let config = args.to_config();
        assert_eq!(config, CaptureConfig::default());
        assert_eq!(args.camera, 0);
    }

    #[test]
    fn capture_flags() {
        let args = CaptureArgs::try_parse_from([
            "camcal-capture",
            "--output",
            "shots",
            "--show",
            "--delay",
            "250",
            "--camera",
            "2",
        ])
        .unwrap();
        let config = args.to_config();
        assert_eq!(config.output_dir, PathBuf::from("shots"));
        assert!(config.show_overlay);
        assert_eq!(config.delay_ms, 250);
        assert_eq!(args.camera, 2);
    }

    #[test]
    fn log_level_flag_parses() {
        let args =
            CaptureArgs::try_parse_from(["camcal-capture", "--log-level", "warn"]).unwrap();
        assert_eq!(args.log_level, LevelFilter::Warn);
        assert!(CaptureArgs::try_parse_from(["camcal-capture", "--log-level", "loud"]).is_err());
    }

    #[cfg(not(feature = "tracing"))]
    #[test]
    fn logger_honours_requested_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let logger = logger_builder(LevelFilter::Warn).build();
        assert_eq!(logger.filter(), LevelFilter::Warn);
    }

    #[test]
    fn init_logging_twice_does_not_panic() {
        init_logging(LevelFilter::Error);
        init_logging(LevelFilter::Debug);
    }
}

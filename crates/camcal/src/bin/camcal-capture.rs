use std::process::ExitCode;

use camcal::cli::{init_logging, print_error, CaptureArgs};
use camcal::OpenCvCamera;
use camcal_core::{run_capture_session, CaptureError, CaptureSummary, StopReason};
use chrono::Local;
use clap::Parser;
use log::{info, warn};

fn main() -> ExitCode {
    let args = CaptureArgs::parse();
    init_logging(args.log_level);

    match run(&args) {
        Ok(summary) => {
            if summary.stop == StopReason::GrabFailed {
                warn!("capture stopped because the camera stopped delivering frames");
            }
            info!("{} images saved", summary.saved.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CaptureArgs) -> Result<CaptureSummary, CaptureError> {
    let config = args.to_config();
    let open = || -> Result<OpenCvCamera, CaptureError> {
        let camera = OpenCvCamera::open(args.camera)?;
        println!("Press 'Spacebar' to capture an image.");
        println!("Press 'Esc' to exit.");
        Ok(camera)
    };
    run_capture_session(&config, open, || Local::now().naive_local())
}

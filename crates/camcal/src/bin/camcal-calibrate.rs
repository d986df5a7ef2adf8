use std::process::ExitCode;

use camcal::cli::{init_logging, print_error, CalibrateArgs};
use camcal::{OpenCvBackend, PlotChart};
use camcal_core::CalibError;
use clap::Parser;
use log::info;

fn main() -> ExitCode {
    let args = CalibrateArgs::parse();
    init_logging(args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CalibrateArgs) -> Result<(), CalibError> {
    let config = args.to_config()?;
    let backend = OpenCvBackend::new();
    let chart = PlotChart::default();

    let report = camcal_core::run(&backend, &chart, &config, &mut std::io::stdout().lock())?;
    if let Some(mean) = report.mean_reprojection_error() {
        info!(
            "mean reprojection error {mean:.4} px over {} of {} images",
            report.views.len(),
            report.images_found
        );
    }
    Ok(())
}

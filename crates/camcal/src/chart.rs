//! Reprojection error chart rendered with plotters.

use std::path::Path;

use camcal_core::ErrorChart;
use opencv::{core::MatTraitConst, highgui, imgcodecs};
use plotters::prelude::*;

pub const CHART_TITLE: &str = "Reprojection Error for Each Image";
const X_LABEL: &str = "Image Number";
const Y_LABEL: &str = "Reprojection Error";
const CHART_WINDOW: &str = "Reprojection Error";

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("drawing failed: {0}")]
    Draw(String),

    #[error(transparent)]
    Display(#[from] opencv::Error),

    #[error("could not load chart {0} for display")]
    Unreadable(String),
}

fn draw_err<E: std::fmt::Display>(err: E) -> ChartError {
    ChartError::Draw(err.to_string())
}

/// Line-with-markers chart of per-image reprojection error, saved as PNG.
#[derive(Clone, Copy, Debug)]
pub struct PlotChart {
    pub size: (u32, u32),
}

impl Default for PlotChart {
    fn default() -> Self {
        Self { size: (1000, 500) }
    }
}

/// Y range with some headroom above the largest error.
fn y_range(errors: &[f64]) -> std::ops::Range<f64> {
    let max = errors
        .iter()
        .copied()
        .filter(|e| e.is_finite())
        .fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return 0.0..1.0;
    }
    0.0..max * 1.1
}

impl ErrorChart for PlotChart {
    type Error = ChartError;

    fn render(&self, errors: &[f64], path: &Path) -> Result<(), ChartError> {
        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let points: Vec<(f64, f64)> = errors
            .iter()
            .enumerate()
            .map(|(i, &e)| ((i + 1) as f64, e))
            .collect();
        let x_max = (errors.len().max(1) + 1) as f64;

        let mut chart = ChartBuilder::on(&root)
            .caption(CHART_TITLE, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..x_max, y_range(errors))
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_desc(X_LABEL)
            .y_desc(Y_LABEL)
            .x_label_formatter(&|x| format!("{x:.0}"))
            .y_label_formatter(&|y| format!("{y:.3}"))
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(points.clone(), &BLUE))
            .map_err(draw_err)?;
        chart
            .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 4, BLUE.filled())))
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
        Ok(())
    }

    fn present(&self, path: &Path) -> Result<(), ChartError> {
        let name = path.to_string_lossy();
        let image = imgcodecs::imread_def(&name)?;
        if image.empty() {
            return Err(ChartError::Unreadable(name.into_owned()));
        }
        highgui::imshow(CHART_WINDOW, &image)?;
        highgui::wait_key(0)?;
        highgui::destroy_window(CHART_WINDOW)?;
        Ok(())
    }
}

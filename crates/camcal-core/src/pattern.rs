use std::fmt;
use std::str::FromStr;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::CalibError;

/// Number of *inner* chessboard corners along each board axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternSize {
    pub cols: u32,
    pub rows: u32,
}

impl PatternSize {
    pub const fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    /// Total number of inner corners, `cols * rows`.
    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

impl Default for PatternSize {
    fn default() -> Self {
        Self::new(9, 6)
    }
}

impl fmt::Display for PatternSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl FromStr for PatternSize {
    type Err = CalibError;

    /// Parse `<cols>x<rows>`, e.g. `9x6`. The separator is case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CalibError::InvalidPatternSize(s.to_string());
        let lower = s.trim().to_ascii_lowercase();
        let (cols, rows) = lower.split_once('x').ok_or_else(invalid)?;
        let cols: u32 = cols.trim().parse().map_err(|_| invalid())?;
        let rows: u32 = rows.trim().parse().map_err(|_| invalid())?;
        if cols == 0 || rows == 0 {
            return Err(invalid());
        }
        Ok(Self { cols, rows })
    }
}

/// Parse a `<cols>x<rows>` pattern size given on the command line.
pub fn parse_pattern_size(s: &str) -> Result<PatternSize, CalibError> {
    s.parse()
}

/// A planar chessboard target: pattern size plus the physical square size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub pattern: PatternSize,
    /// Edge length of one square, in the caller's unit (e.g. millimeters).
    pub square_size: f32,
}

impl Board {
    pub fn new(pattern: PatternSize, square_size: f32) -> Result<Self, CalibError> {
        if !square_size.is_finite() || square_size <= 0.0 {
            return Err(CalibError::InvalidSquareSize(square_size));
        }
        Ok(Self {
            pattern,
            square_size,
        })
    }

    /// Board-frame corner coordinates on the `Z = 0` plane.
    ///
    /// Row-major: index `r * cols + c` maps to `(c * s, r * s, 0)`, which is
    /// the order OpenCV reports detected chessboard corners in.
    pub fn object_points(&self) -> Vec<Point3<f32>> {
        let s = self.square_size;
        (0..self.pattern.rows)
            .flat_map(|r| {
                (0..self.pattern.cols).map(move |c| Point3::new(c as f32 * s, r as f32 * s, 0.0))
            })
            .collect()
    }
}

//! Spatial grouping windows
//!
//! A grouping of `k x k` aggregates each sampled pixel with its neighbours
//! within an offset of `(k - 1) / 2`. Windows are clipped to the raster,
//! so pixels near the edge get smaller, asymmetric windows.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chlorocast_core::{Error, Result};

/// Window size used to aggregate neighbouring pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Grouping {
    /// The pixel's own value
    #[default]
    Single,
    /// 3x3 window
    Window3,
    /// 5x5 window
    Window5,
    /// 9x9 window
    Window9,
    /// 15x15 window
    Window15,
}

impl Grouping {
    pub const ALL: [Grouping; 5] = [
        Grouping::Single,
        Grouping::Window3,
        Grouping::Window5,
        Grouping::Window9,
        Grouping::Window15,
    ];

    /// Window side length in pixels
    pub fn size(&self) -> usize {
        match self {
            Grouping::Single => 1,
            Grouping::Window3 => 3,
            Grouping::Window5 => 5,
            Grouping::Window9 => 9,
            Grouping::Window15 => 15,
        }
    }

    /// Distance from the centre pixel to the window edge
    pub fn offset(&self) -> usize {
        (self.size() - 1) / 2
    }

    /// Label used in dataset and file names, e.g. `9x9`
    pub fn label(&self) -> String {
        format!("{0}x{0}", self.size())
    }

    /// Row and column ranges of the window around `(row, col)`, clipped to
    /// a `rows x cols` grid. Both ranges are half-open.
    pub fn window(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> (Range<usize>, Range<usize>) {
        let o = self.offset();
        let row_range = row.saturating_sub(o)..(row + o + 1).min(rows);
        let col_range = col.saturating_sub(o)..(col + o + 1).min(cols);
        (row_range, col_range)
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Grouping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "1x1" | "" => Ok(Grouping::Single),
            "3x3" => Ok(Grouping::Window3),
            "5x5" => Ok(Grouping::Window5),
            "9x9" => Ok(Grouping::Window9),
            "15x15" => Ok(Grouping::Window15),
            other => Err(Error::InvalidParameter {
                name: "grouping",
                value: other.to_string(),
                reason: "expected one of none, 3x3, 5x5, 9x9, 15x15".into(),
            }),
        }
    }
}

/// Median of `values`, following numpy: any `NaN` poisons the result and
/// an even count averages the two middle values. Reorders `values`.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }

    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

//! Piecewise-linear resampling onto the unit x-grid.
//!
//! Each segment `[x_i, x_{i+1})` contributes one sample per integer step. A
//! zero-width segment (a leap) cannot be drawn on a discrete grid, so it is
//! collapsed to a single sample at `x_i` carrying `y_{i+1}`. The right end
//! point of the last segment is not emitted, so a leap-free basis yields
//! exactly `last_x - first_x` samples.

use crate::points::PointSet;
use crate::SynthError;

/// Dense curve produced by [`interpolate`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resampled {
    pub x_values: Vec<i64>,
    pub y_values: Vec<f64>,
}

impl Resampled {
    pub fn len(&self) -> usize {
        self.y_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y_values.is_empty()
    }
}

pub fn interpolate(points: &PointSet) -> Result<Resampled, SynthError> {
    if points.len() < 2 {
        return Err(SynthError::InvalidConfig(format!(
            "interpolation needs at least 2 control points, got {}",
            points.len()
        )));
    }
    if let Some(index) = points.first_decreasing_index() {
        return Err(SynthError::SamplingDegenerate(format!(
            "control point P{index} lies left of its predecessor: {:?}",
            points.xs()
        )));
    }

    let span = match (points.first_x(), points.last_x()) {
        (Some(first), Some(last)) => (last - first) as usize,
        _ => 0,
    };
    let mut out = Resampled {
        x_values: Vec::with_capacity(span + points.len()),
        y_values: Vec::with_capacity(span + points.len()),
    };

    for pair in points.points().windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let dx = end.x - start.x;
        if dx == 0 {
            out.x_values.push(start.x);
            out.y_values.push(start.y + (end.y - start.y));
            continue;
        }
        let slope = (end.y - start.y) / dx as f64;
        for step in 0..dx {
            out.x_values.push(start.x + step);
            out.y_values.push(slope * step as f64 + start.y);
        }
    }

    Ok(out)
}

//! Ordered control points of the piecewise-linear basis.
//!
//! Points are addressed by position. x-values live on the integer grid the
//! curve is resampled on, y-values are continuous. Callers keep x
//! non-decreasing once a mutation sequence is complete; intermediate states
//! may be out of order.

use serde::{Deserialize, Serialize};

use crate::SynthError;

/// x-step used when a point is appended after the last one.
pub const APPEND_X_STEP: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub x: i64,
    pub y: f64,
}

impl ControlPoint {
    pub fn new(x: i64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointSet {
    points: Vec<ControlPoint>,
}

impl PointSet {
    pub fn new(points: Vec<ControlPoint>) -> Self {
        Self { points }
    }

    /// Zips parallel x/y step lists into a point set.
    pub fn from_steps(xs: &[i64], ys: &[f64]) -> Result<Self, SynthError> {
        if xs.len() != ys.len() {
            return Err(SynthError::InvalidConfig(format!(
                "x and y have a different number of steps ({} vs {})",
                xs.len(),
                ys.len()
            )));
        }
        Ok(Self {
            points: xs
                .iter()
                .zip(ys)
                .map(|(&x, &y)| ControlPoint::new(x, y))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControlPoint> {
        self.points.iter()
    }

    pub fn xs(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn get(&self, index: usize) -> Result<ControlPoint, SynthError> {
        self.points
            .get(index)
            .copied()
            .ok_or(SynthError::PointOutOfRange {
                index,
                len: self.points.len(),
            })
    }

    pub fn x(&self, index: usize) -> Result<i64, SynthError> {
        Ok(self.get(index)?.x)
    }

    pub fn y(&self, index: usize) -> Result<f64, SynthError> {
        Ok(self.get(index)?.y)
    }

    fn slot(&mut self, index: usize) -> Result<&mut ControlPoint, SynthError> {
        let len = self.points.len();
        self.points
            .get_mut(index)
            .ok_or(SynthError::PointOutOfRange { index, len })
    }

    pub fn set_x(&mut self, index: usize, x: i64) -> Result<(), SynthError> {
        self.slot(index)?.x = x;
        Ok(())
    }

    pub fn set_y(&mut self, index: usize, y: f64) -> Result<(), SynthError> {
        self.slot(index)?.y = y;
        Ok(())
    }

    pub fn shift_x(&mut self, index: usize, delta: i64) -> Result<(), SynthError> {
        self.slot(index)?.x += delta;
        Ok(())
    }

    pub fn first_x(&self) -> Option<i64> {
        self.points.first().map(|p| p.x)
    }

    pub fn last_x(&self) -> Option<i64> {
        self.points.last().map(|p| p.x)
    }

    /// Inserts `point` directly after `index`; later points move up by one.
    pub fn insert_after(&mut self, index: usize, point: ControlPoint) -> Result<(), SynthError> {
        if index >= self.points.len() {
            return Err(SynthError::PointOutOfRange {
                index,
                len: self.points.len(),
            });
        }
        self.points.insert(index + 1, point);
        Ok(())
    }

    /// Inserts a new point after `index` for the interactive editing flow.
    ///
    /// Between two existing points the new one sits at the integer midpoint
    /// on the segment joining them. After the last point it repeats the last
    /// y-value `APPEND_X_STEP` further along x.
    pub fn insert_point_after(&mut self, index: usize) -> Result<usize, SynthError> {
        let current = self.get(index)?;
        let point = match self.points.get(index + 1) {
            Some(next) => {
                let x = current.x + (next.x - current.x) / 2;
                let y = if next.x == current.x {
                    current.y
                } else {
                    let t = (x - current.x) as f64 / (next.x - current.x) as f64;
                    current.y + t * (next.y - current.y)
                };
                ControlPoint::new(x, y)
            }
            None => ControlPoint::new(current.x + APPEND_X_STEP, current.y),
        };
        self.insert_after(index, point)?;
        Ok(index + 1)
    }

    /// Removes the last point; a basis never drops below two points.
    pub fn remove_last_point(&mut self) -> Result<ControlPoint, SynthError> {
        if self.points.len() <= 2 {
            return Err(SynthError::InvalidConfig(format!(
                "cannot remove a point from a basis of {} points; at least 2 are required",
                self.points.len()
            )));
        }
        self.points.pop().ok_or(SynthError::PointOutOfRange { index: 0, len: 0 })
    }

    pub fn is_non_decreasing(&self) -> bool {
        self.points.windows(2).all(|pair| pair[0].x <= pair[1].x)
    }

    /// First index whose x-value is smaller than its predecessor's.
    pub fn first_decreasing_index(&self) -> Option<usize> {
        self.points
            .windows(2)
            .position(|pair| pair[1].x < pair[0].x)
            .map(|idx| idx + 1)
    }

    pub fn label(index: usize) -> String {
        format!("P{index}")
    }
}

/// Parses a point label of the form `P<index>`.
pub fn parse_point_label(label: &str) -> Result<usize, SynthError> {
    label
        .trim()
        .strip_prefix('P')
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| SynthError::InvalidConfig(format!("malformed point label '{label}'")))
}

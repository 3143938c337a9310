//! Random offsets applied to selected control points before shaping.
//!
//! Horizontal offsets propagate: the draw for point `i` moves `i` and every
//! later point, and the result is truncated onto the integer x-grid. Offsets
//! for several selected points therefore compound on overlapping suffixes.
//! Vertical offsets touch only the selected point's y-value.

use rand::Rng;
use rand_distr::Distribution;
use tracing::debug;

use crate::config::{Configuration, OffsetConfig};
use crate::distribution::DistributionParams;
use crate::observation::ObservationKind;
use crate::points::PointSet;
use crate::SynthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Draws one offset per selected point, or one shared offset when `equalize`.
pub fn draw_offsets<R: Rng + ?Sized>(
    params: &DistributionParams,
    count: usize,
    equalize: bool,
    rng: &mut R,
) -> Result<Vec<f64>, SynthError> {
    let sampler = params.sampler()?;
    if equalize {
        if count == 0 {
            return Ok(Vec::new());
        }
        let shared = sampler.sample(rng);
        return Ok(vec![shared; count]);
    }
    Ok((0..count).map(|_| sampler.sample(rng)).collect())
}

/// Shifts each selected point and all following points by its offset.
pub fn apply_horizontal_offsets(
    points: &mut PointSet,
    offsets: &[(usize, f64)],
) -> Result<(), SynthError> {
    for &(index, offset) in offsets {
        if index >= points.len() {
            return Err(SynthError::PointOutOfRange {
                index,
                len: points.len(),
            });
        }
        for p in index..points.len() {
            let shifted = (points.x(p)? as f64 + offset).trunc() as i64;
            points.set_x(p, shifted)?;
        }
    }
    Ok(())
}

/// Adds each offset to exactly one point's y-value.
pub fn apply_vertical_offsets(
    points: &mut PointSet,
    offsets: &[(usize, f64)],
) -> Result<(), SynthError> {
    for &(index, offset) in offsets {
        let y = points.y(index)?;
        points.set_y(index, y + offset)?;
    }
    Ok(())
}

/// Samples and applies one offset group along `axis`.
pub fn apply_offset<R: Rng + ?Sized>(
    points: &mut PointSet,
    offset: &OffsetConfig,
    axis: Axis,
    rng: &mut R,
) -> Result<(), SynthError> {
    if !offset.apply {
        return Ok(());
    }
    let indices = offset.selected_indices()?;
    let draws = draw_offsets(&offset.distribution, indices.len(), offset.equalize, rng)?;
    let pairs: Vec<(usize, f64)> = indices.into_iter().zip(draws).collect();
    debug!(?axis, offsets = ?pairs, "applying control point offsets");

    match axis {
        Axis::Horizontal => apply_horizontal_offsets(points, &pairs),
        Axis::Vertical => apply_vertical_offsets(points, &pairs),
    }
}

/// Builds the per-observation working copy of the basis with offsets applied.
///
/// Baseline observations never receive offsets. The shared configuration is
/// only read.
pub fn offset_basis<R: Rng + ?Sized>(
    config: &Configuration,
    kind: ObservationKind,
    rng: &mut R,
) -> Result<PointSet, SynthError> {
    let mut points = config.basis()?;
    if kind == ObservationKind::Baseline {
        return Ok(points);
    }
    apply_offset(
        &mut points,
        &config.randomize_horizontal_offset,
        Axis::Horizontal,
        rng,
    )?;
    apply_offset(
        &mut points,
        &config.randomize_vertical_offset,
        Axis::Vertical,
        rng,
    )?;
    Ok(points)
}

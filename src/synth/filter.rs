//! Smoothing filters for the resampled curve.
//!
//! Savitzky-Golay fits a least-squares polynomial over a sliding window. The
//! first and last `window / 2` samples are taken from a polynomial fitted to
//! the first and last full window rather than from a padded signal.
//!
//! The moving average pads the tail with `box_pts` copies of the last value
//! before convolving and trims the padding afterwards, which keeps the end of
//! the curve from sagging. The head is zero-padded.

use nalgebra::DMatrix;

use crate::config::{FilterConfig, FilterKind};
use crate::SynthError;

/// Applies the configured filter, or returns the input when disabled.
pub fn apply_filter(values: &[f64], filter: &FilterConfig) -> Result<Vec<f64>, SynthError> {
    if !filter.apply {
        return Ok(values.to_vec());
    }
    match filter.selected_type {
        FilterKind::SavitzkyGolay => {
            savitzky_golay(values, filter.sg_window_length, filter.sg_poly_order)
        }
        FilterKind::MovingAverage => moving_average(values, filter.conv_box_pts),
    }
}

pub fn savitzky_golay(values: &[f64], window: usize, order: usize) -> Result<Vec<f64>, SynthError> {
    if window % 2 == 0 || window <= order {
        return Err(SynthError::InvalidConfig(format!(
            "savitzky-golay window {window} must be odd and greater than the order {order}"
        )));
    }
    let n = values.len();
    if window > n {
        return Err(SynthError::InvalidConfig(format!(
            "savitzky-golay window {window} is longer than the curve ({n} samples)"
        )));
    }

    let hat = window_hat_matrix(window, order)?;
    let half = window / 2;
    let fit = |row: usize, start: usize| -> f64 {
        (0..window).map(|i| hat[(row, i)] * values[start + i]).sum()
    };

    let mut out = Vec::with_capacity(n);
    for k in 0..half {
        out.push(fit(k, 0));
    }
    for k in half..n - half {
        out.push(fit(half, k - half));
    }
    let tail_start = n - window;
    for k in n - half..n {
        out.push(fit(k - tail_start, tail_start));
    }
    Ok(out)
}

/// Projection onto polynomials of degree `order` over one window.
///
/// Row `r` holds the weights that reproduce the fitted value at window
/// position `r`; the centre row is the classic smoothing kernel.
fn window_hat_matrix(window: usize, order: usize) -> Result<DMatrix<f64>, SynthError> {
    let half = (window / 2) as f64;
    let scale = half.max(1.0);
    let design = DMatrix::from_fn(window, order + 1, |row, col| {
        ((row as f64 - half) / scale).powi(col as i32)
    });
    let normal = design.transpose() * &design;
    let projector = solve_normal_equation(normal, design.transpose())?;
    Ok(&design * projector)
}

fn solve_normal_equation(
    normal: DMatrix<f64>,
    rhs: DMatrix<f64>,
) -> Result<DMatrix<f64>, SynthError> {
    if let Some(chol) = normal.clone().cholesky() {
        return Ok(chol.solve(&rhs));
    }
    normal.lu().solve(&rhs).ok_or_else(|| {
        SynthError::SamplingDegenerate("savitzky-golay normal equation is singular".to_string())
    })
}

pub fn moving_average(values: &[f64], box_pts: usize) -> Result<Vec<f64>, SynthError> {
    if box_pts == 0 {
        return Err(SynthError::InvalidConfig(
            "moving average box must be at least one sample wide".to_string(),
        ));
    }
    let Some(&last) = values.last() else {
        return Ok(Vec::new());
    };

    let mut padded = values.to_vec();
    padded.extend(std::iter::repeat(last).take(box_pts));

    // Centred like a same-length convolution: the kernel reaches
    // (box - 1) / 2 samples ahead of the output index.
    let lead = (box_pts - 1) / 2;
    let weight = 1.0 / box_pts as f64;
    let out = (0..values.len())
        .map(|i| {
            let ahead = i + lead;
            let from = ahead.saturating_sub(box_pts - 1);
            padded[from..=ahead].iter().sum::<f64>() * weight
        })
        .collect();
    Ok(out)
}

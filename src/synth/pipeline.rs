use rand::Rng;
use tracing::debug;

use super::filter::apply_filter;
use super::interpolate::{interpolate, Resampled};
use super::noise::{add_noise, add_windowed_noise, clip_negative};
use crate::config::Configuration;
use crate::points::PointSet;
use crate::SynthError;

/// Turns a shaped point set into a finished curve.
///
/// Stages run in a fixed order regardless of which are enabled:
/// interpolate, smooth, global noise, windowed noise, clip.
pub fn synthesize<R: Rng + ?Sized>(
    points: &PointSet,
    config: &Configuration,
    rng: &mut R,
) -> Result<Resampled, SynthError> {
    let Resampled { x_values, y_values } = interpolate(points)?;
    let mut y_values = apply_filter(&y_values, &config.filter)?;
    add_noise(&mut y_values, &config.randomize_scattering, rng)?;
    add_windowed_noise(&mut y_values, &config.randomize_tightening, rng)?;
    if config.preparation.remove_neg_y_values {
        clip_negative(&mut y_values);
    }

    debug!(
        samples = y_values.len(),
        filter = config.filter.apply,
        "synthesized curve"
    );
    Ok(Resampled { x_values, y_values })
}

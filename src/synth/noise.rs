//! Additive noise and negative clipping.

use rand::Rng;
use rand_distr::Distribution;

use crate::config::{NoiseConfig, WindowedNoiseConfig};
use crate::SynthError;

/// Adds one independent draw to every sample.
pub fn add_noise<R: Rng + ?Sized>(
    values: &mut [f64],
    noise: &NoiseConfig,
    rng: &mut R,
) -> Result<(), SynthError> {
    if !noise.apply {
        return Ok(());
    }
    let sampler = noise.distribution.sampler()?;
    for value in values.iter_mut() {
        *value += sampler.sample(rng);
    }
    Ok(())
}

/// Adds one independent draw to every sample whose index lies strictly
/// between the lower and upper limit.
pub fn add_windowed_noise<R: Rng + ?Sized>(
    values: &mut [f64],
    noise: &WindowedNoiseConfig,
    rng: &mut R,
) -> Result<(), SynthError> {
    if !noise.apply {
        return Ok(());
    }
    let sampler = noise.distribution.sampler()?;
    let lower = noise.lower_xlimitation;
    let upper = noise.upper_xlimitation;
    for (index, value) in values.iter_mut().enumerate() {
        let index = index as i64;
        if lower < index && index < upper {
            *value += sampler.sample(rng);
        }
    }
    Ok(())
}

pub fn clip_negative(values: &mut [f64]) {
    for value in values.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{add_noise, add_windowed_noise, clip_negative};
    use crate::config::{NoiseConfig, WindowedNoiseConfig};
    use crate::distribution::DistributionParams;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn global_noise_touches_every_sample() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut values = vec![0.0; 50];
        add_noise(&mut values, &NoiseConfig::default(), &mut rng).unwrap();
        assert!(values.iter().all(|v| *v != 0.0));
    }

    #[test]
    fn windowed_noise_respects_open_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let noise = WindowedNoiseConfig {
            apply: true,
            lower_xlimitation: 10,
            upper_xlimitation: 20,
            distribution: DistributionParams::uniform(2.0),
        };
        let mut values = vec![5.0; 30];
        add_windowed_noise(&mut values, &noise, &mut rng).unwrap();
        for (index, value) in values.iter().enumerate() {
            if (11..20).contains(&index) {
                assert!((value - 5.0).abs() <= 1.0);
            } else {
                assert_eq!(*value, 5.0, "index {index}");
            }
        }
        assert!(values[11..20].iter().any(|v| *v != 5.0));
    }

    #[test]
    fn disabled_noise_consumes_no_randomness() {
        let mut values = vec![1.0; 10];
        let mut noise = NoiseConfig::default();
        noise.apply = false;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        add_noise(&mut values, &noise, &mut rng).unwrap();
        assert_eq!(values, vec![1.0; 10]);
        assert_eq!(rng, ChaCha8Rng::seed_from_u64(2));
    }

    #[test]
    fn clipping_only_replaces_negatives() {
        let mut values = vec![1.5, -0.2, 0.0, -7.0, 3.0];
        clip_negative(&mut values);
        assert_eq!(values, vec![1.5, 0.0, 0.0, 0.0, 3.0]);
    }
}

//! Scalar perturbation sampling.
//!
//! Every stochastic feature of the generator carries one [`DistributionParams`]
//! record. Only the field matching `selected_type` is consulted; the others are
//! inert. Normal and Uniform draws are centred on zero. Weibull draws use
//! `shape = weibull_alpha`, `scale = 1` and are never negative, so any
//! `base + sample` built on them is biased upward.

use std::fmt;

use rand::Rng;
use rand_distr::{Distribution, Normal, Weibull};
use serde::{Deserialize, Serialize};

use crate::SynthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionKind {
    Normal,
    Uniform,
    Weibull,
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionKind::Normal => write!(f, "Normal"),
            DistributionKind::Uniform => write!(f, "Uniform"),
            DistributionKind::Weibull => write!(f, "Weibull"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionParams {
    pub selected_type: DistributionKind,
    /// Standard deviation of the zero-mean normal distribution
    pub normal_stdev: f64,
    /// Full width of the symmetric uniform interval
    pub uniform_range: f64,
    /// Weibull shape parameter (scale is fixed at 1)
    pub weibull_alpha: f64,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            selected_type: DistributionKind::Normal,
            normal_stdev: 0.0,
            uniform_range: 0.0,
            weibull_alpha: 1.0,
        }
    }
}

impl DistributionParams {
    pub fn normal(stdev: f64) -> Self {
        Self {
            selected_type: DistributionKind::Normal,
            normal_stdev: stdev,
            ..Self::default()
        }
    }

    pub fn uniform(range: f64) -> Self {
        Self {
            selected_type: DistributionKind::Uniform,
            uniform_range: range,
            ..Self::default()
        }
    }

    pub fn weibull(alpha: f64) -> Self {
        Self {
            selected_type: DistributionKind::Weibull,
            weibull_alpha: alpha,
            ..Self::default()
        }
    }

    /// A distribution that always yields zero.
    pub fn zero() -> Self {
        Self::normal(0.0)
    }

    pub fn validate(&self, context: &str) -> Result<(), SynthError> {
        match self.selected_type {
            DistributionKind::Normal => {
                if !self.normal_stdev.is_finite() || self.normal_stdev < 0.0 {
                    return Err(SynthError::InvalidConfig(format!(
                        "{context}: normal_stdev must be finite and >= 0"
                    )));
                }
            }
            DistributionKind::Uniform => {
                if !self.uniform_range.is_finite() || self.uniform_range < 0.0 {
                    return Err(SynthError::InvalidConfig(format!(
                        "{context}: uniform_range must be finite and >= 0"
                    )));
                }
            }
            DistributionKind::Weibull => {
                if !self.weibull_alpha.is_finite() || self.weibull_alpha <= 0.0 {
                    return Err(SynthError::InvalidConfig(format!(
                        "{context}: weibull_alpha must be finite and > 0"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds a reusable sampler for these parameters.
    pub fn sampler(&self) -> Result<Sampler, SynthError> {
        let sampler = match self.selected_type {
            DistributionKind::Normal => {
                let normal = Normal::new(0.0, self.normal_stdev).map_err(|e| {
                    SynthError::InvalidConfig(format!("normal distribution: {e}"))
                })?;
                Sampler::Normal(normal)
            }
            DistributionKind::Uniform => {
                if !self.uniform_range.is_finite() || self.uniform_range < 0.0 {
                    return Err(SynthError::InvalidConfig(
                        "uniform distribution: range must be finite and >= 0".to_string(),
                    ));
                }
                Sampler::Uniform {
                    half_range: self.uniform_range / 2.0,
                }
            }
            DistributionKind::Weibull => {
                let weibull = Weibull::new(1.0, self.weibull_alpha).map_err(|e| {
                    SynthError::InvalidConfig(format!("weibull distribution: {e}"))
                })?;
                Sampler::Weibull(weibull)
            }
        };
        Ok(sampler)
    }

    /// Draws a single perturbation.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, SynthError> {
        Ok(self.sampler()?.sample(rng))
    }
}

/// Prepared form of [`DistributionParams`].
#[derive(Debug, Clone, Copy)]
pub enum Sampler {
    Normal(Normal<f64>),
    Uniform { half_range: f64 },
    Weibull(Weibull<f64>),
}

impl Distribution<f64> for Sampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Normal(normal) => normal.sample(rng),
            Sampler::Uniform { half_range } => {
                if *half_range == 0.0 {
                    0.0
                } else {
                    rng.gen_range(-*half_range..=*half_range)
                }
            }
            Sampler::Weibull(weibull) => weibull.sample(rng),
        }
    }
}

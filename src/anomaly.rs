//! Structural anomalies that rewrite the control-point topology.
//!
//! Each shaper mutates the offset-adjusted working copy of one observation
//! before the curve is resampled.
//!
//! - Type 1, tightening leap: three points are inserted between `P1` and
//!   `P2`, forming a flat run-in, a peak raised by `height` and a run-out
//!   back onto the original curve, all within `width` x-steps.
//! - Type 2, final tightening leap: one point is inserted at index 5.
//! - Type 3, hard run: fixed x-deltas compress the span `P2..P6`, steepening
//!   the slope.
//! - Type 4, soft run: mirrored deltas widen the same span.
//!
//! Types 2-4 default to fixed literals; each exposes an opt-in distribution
//! hook (`randomize`) that perturbs those literals per observation.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{
    Configuration, FinalLeapConfig, InclineConfig, TighteningLeapConfig, MIN_POINTS_FINAL_LEAP,
    MIN_POINTS_INCLINE, MIN_POINTS_TIGHTENING_LEAP,
};
use crate::distribution::DistributionParams;
use crate::points::{ControlPoint, PointSet};
use crate::SynthError;

/// x-deltas applied to `P2..=P6` for a hard run.
pub const HARD_RUN_DELTAS: [i64; 5] = [20, 15, -15, -20, -25];
/// x-deltas applied to `P2..=P6` for a soft run.
pub const SOFT_RUN_DELTAS: [i64; 5] = [-15, -15, 15, 15, 15];
const INCLINE_FIRST_INDEX: usize = 2;
const FINAL_LEAP_INDEX: usize = 5;

/// Placement of the leap peak inside its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeapShape {
    Centered,
    #[serde(rename = "Right-skewed")]
    RightSkewed,
    #[serde(rename = "Left-skewed")]
    LeftSkewed,
    Random,
}

impl LeapShape {
    /// Offset of the peak from the leap start, or `None` when `width` is too
    /// narrow for this shape.
    fn peak_offset<R: Rng + ?Sized>(self, width: i64, rng: &mut R) -> Option<i64> {
        let half = width / 2;
        let (lo, hi) = match self {
            LeapShape::Centered => return Some(half),
            LeapShape::RightSkewed => (1, half - 1),
            LeapShape::LeftSkewed => (half, width - 1),
            LeapShape::Random => (1, width - 1),
        };
        (lo <= hi).then(|| rng.gen_range(lo..=hi))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalyKind {
    TighteningLeap,
    FinalTighteningLeap,
    HardRun,
    SoftRun,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 4] = [
        AnomalyKind::TighteningLeap,
        AnomalyKind::FinalTighteningLeap,
        AnomalyKind::HardRun,
        AnomalyKind::SoftRun,
    ];

    pub fn number(self) -> u8 {
        match self {
            AnomalyKind::TighteningLeap => 1,
            AnomalyKind::FinalTighteningLeap => 2,
            AnomalyKind::HardRun => 3,
            AnomalyKind::SoftRun => 4,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.number() == number)
    }

    pub fn label(self) -> &'static str {
        match self {
            AnomalyKind::TighteningLeap => "anomaly_type_01",
            AnomalyKind::FinalTighteningLeap => "anomaly_type_02",
            AnomalyKind::HardRun => "anomaly_type_03",
            AnomalyKind::SoftRun => "anomaly_type_04",
        }
    }

    pub fn min_points(self) -> usize {
        match self {
            AnomalyKind::TighteningLeap => MIN_POINTS_TIGHTENING_LEAP,
            AnomalyKind::FinalTighteningLeap => MIN_POINTS_FINAL_LEAP,
            AnomalyKind::HardRun | AnomalyKind::SoftRun => MIN_POINTS_INCLINE,
        }
    }

    /// Whether the configuration requests this anomaly, and how many.
    pub fn requested_amount(self, config: &Configuration) -> usize {
        let (generate, amount) = match self {
            AnomalyKind::TighteningLeap => {
                (config.anomalies_type_1.generate, config.anomalies_type_1.amount)
            }
            AnomalyKind::FinalTighteningLeap => {
                (config.anomalies_type_2.generate, config.anomalies_type_2.amount)
            }
            AnomalyKind::HardRun => {
                (config.anomalies_type_3.generate, config.anomalies_type_3.amount)
            }
            AnomalyKind::SoftRun => {
                (config.anomalies_type_4.generate, config.anomalies_type_4.amount)
            }
        };
        if generate {
            amount
        } else {
            0
        }
    }

    /// How many of this kind the mixed preview shows; zero unless generated.
    pub fn preview_amount(self, config: &Configuration) -> usize {
        let (generate, amount) = match self {
            AnomalyKind::TighteningLeap => (
                config.anomalies_type_1.generate,
                config.anomalies_type_1.amount_to_plot,
            ),
            AnomalyKind::FinalTighteningLeap => (
                config.anomalies_type_2.generate,
                config.anomalies_type_2.amount_to_plot,
            ),
            AnomalyKind::HardRun => (
                config.anomalies_type_3.generate,
                config.anomalies_type_3.amount_to_plot,
            ),
            AnomalyKind::SoftRun => (
                config.anomalies_type_4.generate,
                config.anomalies_type_4.amount_to_plot,
            ),
        };
        if generate {
            amount
        } else {
            0
        }
    }

    /// Binds this kind to its parameters.
    pub fn resolve(self, config: &Configuration) -> Anomaly<'_> {
        match self {
            AnomalyKind::TighteningLeap => Anomaly::TighteningLeap {
                leap: &config.anomalies_type_1,
                width: &config.anomalies_type_1_width,
                height: &config.anomalies_type_1_height,
            },
            AnomalyKind::FinalTighteningLeap => Anomaly::FinalTighteningLeap {
                leap: &config.anomalies_type_2,
                position: &config.anomalies_type_2_position,
            },
            AnomalyKind::HardRun => Anomaly::Incline {
                kind: self,
                deltas: HARD_RUN_DELTAS,
                incline: &config.anomalies_type_3,
            },
            AnomalyKind::SoftRun => Anomaly::Incline {
                kind: self,
                deltas: SOFT_RUN_DELTAS,
                incline: &config.anomalies_type_4,
            },
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An anomaly kind together with the parameters that drive it.
#[derive(Debug, Clone, Copy)]
pub enum Anomaly<'a> {
    TighteningLeap {
        leap: &'a TighteningLeapConfig,
        width: &'a DistributionParams,
        height: &'a DistributionParams,
    },
    FinalTighteningLeap {
        leap: &'a FinalLeapConfig,
        position: &'a DistributionParams,
    },
    Incline {
        kind: AnomalyKind,
        deltas: [i64; 5],
        incline: &'a InclineConfig,
    },
}

impl Anomaly<'_> {
    pub fn kind(&self) -> AnomalyKind {
        match self {
            Anomaly::TighteningLeap { .. } => AnomalyKind::TighteningLeap,
            Anomaly::FinalTighteningLeap { .. } => AnomalyKind::FinalTighteningLeap,
            Anomaly::Incline { kind, .. } => *kind,
        }
    }

    /// Reshapes `points` in place.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        points: &mut PointSet,
        rng: &mut R,
    ) -> Result<(), SynthError> {
        let kind = self.kind();
        if points.len() < kind.min_points() {
            return Err(SynthError::InvalidConfig(format!(
                "{kind} needs a basis of at least {} points, got {}",
                kind.min_points(),
                points.len()
            )));
        }

        match *self {
            Anomaly::TighteningLeap {
                leap,
                width,
                height,
            } => apply_tightening_leap(points, leap, width, height, rng),
            Anomaly::FinalTighteningLeap { leap, position } => {
                apply_final_leap(points, leap, position, rng)
            }
            Anomaly::Incline {
                deltas, incline, ..
            } => apply_incline(points, &deltas, incline, rng),
        }
    }
}

fn apply_tightening_leap<R: Rng + ?Sized>(
    points: &mut PointSet,
    leap: &TighteningLeapConfig,
    width_dist: &DistributionParams,
    height_dist: &DistributionParams,
    rng: &mut R,
) -> Result<(), SynthError> {
    if leap.lower_xlimitation < 0 || leap.upper_xlimitation < 0 {
        return Err(SynthError::InvalidConfig(format!(
            "tightening leap limits must not be negative, got lower={} upper={}",
            leap.lower_xlimitation, leap.upper_xlimitation
        )));
    }
    let run_in = points.get(1)?;
    let x2_original = points.x(2)?;
    // The peak is raised from the pre-insertion P3, the run-out lands on the
    // pre-insertion P2.
    let y3_original = points.y(3)?;
    let run_out_y = points.y(2)?;

    let width = (leap.width + width_dist.sample(rng)?).trunc() as i64;
    let height = leap.height + height_dist.sample(rng)?;
    if width <= 0 {
        return Err(SynthError::SamplingDegenerate(format!(
            "tightening leap width must be positive, drew {width}"
        )));
    }

    let lo = run_in.x + leap.lower_xlimitation;
    let hi_limit = x2_original - leap.upper_xlimitation - 1;
    if lo > hi_limit {
        return Err(SynthError::InvalidConfig(format!(
            "tightening leap limits leave no room between x={} and x={x2_original}",
            run_in.x
        )));
    }
    let hi = hi_limit - width;
    if lo > hi {
        return Err(SynthError::SamplingDegenerate(format!(
            "tightening leap width {width} exceeds the available span [{lo}, {hi_limit}]"
        )));
    }

    let start = rng.gen_range(lo..=hi);
    let peak_offset = leap.leap_shape.peak_offset(width, rng).ok_or_else(|| {
        SynthError::SamplingDegenerate(format!(
            "tightening leap width {width} is too narrow for a {:?} peak",
            leap.leap_shape
        ))
    })?;

    points.insert_after(1, ControlPoint::new(start, run_in.y))?;
    points.insert_after(2, ControlPoint::new(start + peak_offset, y3_original + height))?;
    points.insert_after(3, ControlPoint::new(start + width, run_out_y))?;

    debug!(start, width, height, peak_offset, "shaped tightening leap");
    Ok(())
}

fn apply_final_leap<R: Rng + ?Sized>(
    points: &mut PointSet,
    leap: &FinalLeapConfig,
    position: &DistributionParams,
    rng: &mut R,
) -> Result<(), SynthError> {
    let (x, y) = if leap.randomize {
        let sampler = position.sampler()?;
        let dx = rand_distr::Distribution::sample(&sampler, rng);
        let dy = rand_distr::Distribution::sample(&sampler, rng);
        ((leap.x as f64 + dx).trunc() as i64, leap.y + dy)
    } else {
        (leap.x, leap.y)
    };

    points.insert_after(FINAL_LEAP_INDEX - 1, ControlPoint::new(x, y))?;
    debug!(x, y, "shaped final tightening leap");
    Ok(())
}

fn apply_incline<R: Rng + ?Sized>(
    points: &mut PointSet,
    deltas: &[i64; 5],
    incline: &InclineConfig,
    rng: &mut R,
) -> Result<(), SynthError> {
    let sampler = if incline.randomize {
        Some(incline.offset.sampler()?)
    } else {
        None
    };

    for (offset, &delta) in deltas.iter().enumerate() {
        let delta = match &sampler {
            Some(sampler) => {
                let extra = rand_distr::Distribution::sample(sampler, rng);
                (delta as f64 + delta.signum() as f64 * extra).trunc() as i64
            }
            None => delta,
        };
        points.shift_x(INCLINE_FIRST_INDEX + offset, delta)?;
    }

    debug!(xs = ?points.xs(), "shaped incline");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AnomalyKind, LeapShape, HARD_RUN_DELTAS, SOFT_RUN_DELTAS};
    use crate::config::Configuration;
    use crate::distribution::DistributionParams;
    use crate::points::PointSet;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn reference_basis() -> PointSet {
        PointSet::from_steps(
            &[0, 20, 210, 240, 300, 340, 360],
            &[0.0, 2.0, 2.0, 4.5, 17.5, 20.0, 20.0],
        )
        .unwrap()
    }

    fn deterministic_config() -> Configuration {
        let mut cfg = Configuration::default();
        cfg.anomalies_type_1_width = DistributionParams::zero();
        cfg.anomalies_type_1_height = DistributionParams::zero();
        cfg
    }

    #[test]
    fn tightening_leap_inserts_three_points() {
        let cfg = deterministic_config();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut points = reference_basis();
        AnomalyKind::TighteningLeap
            .resolve(&cfg)
            .apply(&mut points, &mut rng)
            .unwrap();

        assert_eq!(points.len(), 10);
        let start = points.x(2).unwrap();
        assert!((30..=159).contains(&start));
        assert_eq!(points.x(3).unwrap(), start + 20);
        assert_eq!(points.x(4).unwrap(), start + 40);
        assert_eq!(points.y(2).unwrap(), 2.0);
        assert_eq!(points.y(3).unwrap(), 7.5);
        assert_eq!(points.y(4).unwrap(), 2.0);
        assert_eq!(&points.xs()[5..], &[210, 240, 300, 340, 360]);
        assert!(points.is_non_decreasing());
    }

    #[test]
    fn leap_shapes_place_peak_inside_their_ranges() {
        for (shape, lo, hi) in [
            (LeapShape::RightSkewed, 1, 19),
            (LeapShape::LeftSkewed, 20, 39),
            (LeapShape::Random, 1, 39),
        ] {
            let mut cfg = deterministic_config();
            cfg.anomalies_type_1.leap_shape = shape;
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            for _ in 0..50 {
                let mut points = reference_basis();
                AnomalyKind::TighteningLeap
                    .resolve(&cfg)
                    .apply(&mut points, &mut rng)
                    .unwrap();
                let offset = points.x(3).unwrap() - points.x(2).unwrap();
                assert!((lo..=hi).contains(&offset), "{shape:?}: {offset}");
            }
        }
    }

    #[test]
    fn negative_leap_limits_are_configuration_errors() {
        let mut cfg = deterministic_config();
        cfg.anomalies_type_1.lower_xlimitation = -50;
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut points = reference_basis();
        let err = AnomalyKind::TighteningLeap
            .resolve(&cfg)
            .apply(&mut points, &mut rng)
            .unwrap_err();
        assert!(err.is_configuration(), "{err}");
        assert_eq!(points, reference_basis());
        assert_eq!(rng, ChaCha8Rng::seed_from_u64(1));
    }

    #[test]
    fn preview_amounts_follow_generate_flags() {
        let mut cfg = Configuration::default();
        cfg.anomalies_type_3.amount_to_plot = 2;
        cfg.anomalies_type_4.generate = false;
        assert_eq!(AnomalyKind::HardRun.preview_amount(&cfg), 2);
        assert_eq!(AnomalyKind::SoftRun.preview_amount(&cfg), 0);
        assert_eq!(AnomalyKind::TighteningLeap.preview_amount(&cfg), 5);
    }

    #[test]
    fn oversized_leap_is_sampling_degenerate() {
        let mut cfg = deterministic_config();
        cfg.anomalies_type_1.width = 500.0;
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut points = reference_basis();
        let err = AnomalyKind::TighteningLeap
            .resolve(&cfg)
            .apply(&mut points, &mut rng)
            .unwrap_err();
        assert!(err.is_sampling_degenerate());

        cfg.anomalies_type_1.width = 0.0;
        let err = AnomalyKind::TighteningLeap
            .resolve(&cfg)
            .apply(&mut reference_basis(), &mut rng)
            .unwrap_err();
        assert!(err.is_sampling_degenerate());
    }

    #[test]
    fn narrow_right_skewed_leap_is_sampling_degenerate() {
        let mut cfg = deterministic_config();
        cfg.anomalies_type_1.width = 3.0;
        cfg.anomalies_type_1.leap_shape = LeapShape::RightSkewed;
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = AnomalyKind::TighteningLeap
            .resolve(&cfg)
            .apply(&mut reference_basis(), &mut rng)
            .unwrap_err();
        assert!(err.is_sampling_degenerate());
    }

    #[test]
    fn contradictory_limits_are_configuration_errors() {
        let mut cfg = deterministic_config();
        cfg.anomalies_type_1.lower_xlimitation = 150;
        cfg.anomalies_type_1.upper_xlimitation = 150;
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = AnomalyKind::TighteningLeap
            .resolve(&cfg)
            .apply(&mut reference_basis(), &mut rng)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn final_leap_uses_literal_defaults() {
        let cfg = Configuration::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut points = reference_basis();
        AnomalyKind::FinalTighteningLeap
            .resolve(&cfg)
            .apply(&mut points, &mut rng)
            .unwrap();
        assert_eq!(points.xs(), vec![0, 20, 210, 240, 300, 320, 340, 360]);
        assert_eq!(points.y(5).unwrap(), 25.0);
        assert_eq!(points.y(6).unwrap(), 20.0);
    }

    #[test]
    fn final_leap_hook_perturbs_position() {
        let mut cfg = Configuration::default();
        cfg.anomalies_type_2.randomize = true;
        cfg.anomalies_type_2_position = DistributionParams::uniform(10.0);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut points = reference_basis();
        AnomalyKind::FinalTighteningLeap
            .resolve(&cfg)
            .apply(&mut points, &mut rng)
            .unwrap();
        assert!((315..=325).contains(&points.x(5).unwrap()));
        assert!((points.y(5).unwrap() - 25.0).abs() <= 5.0);
    }

    #[test]
    fn inclines_apply_literal_deltas() {
        let cfg = Configuration::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut hard = reference_basis();
        AnomalyKind::HardRun.resolve(&cfg).apply(&mut hard, &mut rng).unwrap();
        assert_eq!(hard.xs(), vec![0, 20, 230, 255, 285, 320, 335]);

        let mut soft = reference_basis();
        AnomalyKind::SoftRun.resolve(&cfg).apply(&mut soft, &mut rng).unwrap();
        assert_eq!(soft.xs(), vec![0, 20, 195, 225, 315, 355, 375]);
        assert_eq!(soft.ys(), reference_basis().ys());
    }

    #[test]
    fn incline_hook_only_intensifies_with_weibull() {
        let mut cfg = Configuration::default();
        cfg.anomalies_type_3.randomize = true;
        cfg.anomalies_type_3.offset = DistributionParams::weibull(1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let basis = reference_basis();
        let mut points = basis.clone();
        AnomalyKind::HardRun.resolve(&cfg).apply(&mut points, &mut rng).unwrap();
        for (offset, delta) in HARD_RUN_DELTAS.iter().enumerate() {
            let moved = points.x(2 + offset).unwrap() - basis.x(2 + offset).unwrap();
            assert_eq!(moved.signum(), delta.signum());
            assert!(moved.abs() >= delta.abs());
        }
        assert_eq!(SOFT_RUN_DELTAS.iter().sum::<i64>(), 15);
    }

    #[test]
    fn short_basis_is_rejected() {
        let cfg = Configuration::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut points = PointSet::from_steps(&[0, 10, 20, 30], &[0.0; 4]).unwrap();
        assert!(AnomalyKind::HardRun
            .resolve(&cfg)
            .apply(&mut points, &mut rng)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn labels_round_trip_numbers() {
        for kind in AnomalyKind::ALL {
            assert_eq!(AnomalyKind::from_number(kind.number()), Some(kind));
        }
        assert_eq!(AnomalyKind::SoftRun.label(), "anomaly_type_04");
    }
}

//! screw-synth - synthetic screw-driving run generator
//!
//! Builds artificial torque-over-angle curves from a sparse piecewise-linear
//! basis of control points. Each curve is drawn from an isolated copy of the
//! basis, shifted by random offsets, optionally reshaped into one of four
//! structural anomalies, then resampled onto a unit-stride grid where
//! smoothing, noise and clipping are applied.

pub mod anomaly;
pub mod batch;
pub mod config;
pub mod distribution;
pub mod io;
pub mod logging;
pub mod observation;
pub mod offset;
pub mod points;
pub mod synth {
    pub mod filter;
    pub mod interpolate;
    pub mod noise;

    mod pipeline;

    pub use interpolate::Resampled;
    pub use pipeline::synthesize;
}

use thiserror::Error;

pub use anomaly::{Anomaly, AnomalyKind, LeapShape};
pub use batch::{
    preview, preview_mixed, run_batch, summarize_batch, BatchOptions, BatchPlan, BatchResult,
    BatchSummary,
};
pub use config::Configuration;
pub use distribution::{DistributionKind, DistributionParams, Sampler};
pub use observation::{Observation, ObservationKind};
pub use points::{ControlPoint, PointSet};

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml parse error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("toml write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("degenerate sampling: {0}")]
    SamplingDegenerate(String),
    #[error("point index {index} out of range for {len} control points")]
    PointOutOfRange { index: usize, len: usize },
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
}

impl SynthError {
    /// True for errors caused by malformed or contradictory parameters.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SynthError::InvalidConfig(_)
                | SynthError::PointOutOfRange { .. }
                | SynthError::TomlDe(_)
        )
    }

    pub fn is_sampling_degenerate(&self) -> bool {
        matches!(self, SynthError::SamplingDegenerate(_))
    }
}

pub type Result<T, E = SynthError> = std::result::Result<T, E>;

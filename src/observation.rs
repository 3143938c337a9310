//! One finished synthetic curve and its classification.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::anomaly::AnomalyKind;
use crate::config::Configuration;
use crate::offset::offset_basis;
use crate::points::PointSet;
use crate::synth::{synthesize, Resampled};
use crate::SynthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ObservationKind {
    /// The untouched basis; never offset or reshaped.
    Baseline,
    Ok,
    Anomaly(AnomalyKind),
}

impl ObservationKind {
    pub fn all() -> [ObservationKind; 6] {
        [
            ObservationKind::Baseline,
            ObservationKind::Ok,
            ObservationKind::Anomaly(AnomalyKind::TighteningLeap),
            ObservationKind::Anomaly(AnomalyKind::FinalTighteningLeap),
            ObservationKind::Anomaly(AnomalyKind::HardRun),
            ObservationKind::Anomaly(AnomalyKind::SoftRun),
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            ObservationKind::Baseline => "baseline",
            ObservationKind::Ok => "ok",
            ObservationKind::Anomaly(kind) => kind.label(),
        }
    }

    pub fn anomaly(self) -> Option<AnomalyKind> {
        match self {
            ObservationKind::Anomaly(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ObservationKind {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|kind| kind.label() == s.trim())
            .ok_or_else(|| SynthError::InvalidConfig(format!("unknown observation kind '{s}'")))
    }
}

impl From<ObservationKind> for String {
    fn from(kind: ObservationKind) -> Self {
        kind.label().to_string()
    }
}

impl TryFrom<String> for ObservationKind {
    type Error = SynthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    kind: ObservationKind,
    points: PointSet,
    x_values: Vec<i64>,
    y_values: Vec<f64>,
}

impl Observation {
    /// Builds one observation of `kind` from an isolated copy of the basis.
    ///
    /// Order: offsets (skipped for the baseline), anomaly shaping, then
    /// curve synthesis. `config` is only read.
    pub fn new<R: Rng + ?Sized>(
        config: &Configuration,
        kind: ObservationKind,
        rng: &mut R,
    ) -> Result<Self, SynthError> {
        let mut points = offset_basis(config, kind, rng)?;
        if let Some(anomaly) = kind.anomaly() {
            anomaly.resolve(config).apply(&mut points, rng)?;
        }
        let Resampled { x_values, y_values } = synthesize(&points, config, rng)?;
        if x_values.len() != y_values.len() {
            return Err(SynthError::LengthMismatch {
                context: "observation",
                expected: x_values.len(),
                got: y_values.len(),
            });
        }

        debug!(%kind, points = points.len(), samples = y_values.len(), "built observation");
        Ok(Self {
            kind,
            points,
            x_values,
            y_values,
        })
    }

    pub fn kind(&self) -> ObservationKind {
        self.kind
    }

    /// Final control points after offsets and shaping.
    pub fn points(&self) -> &PointSet {
        &self.points
    }

    pub fn x_values(&self) -> &[i64] {
        &self.x_values
    }

    pub fn y_values(&self) -> &[f64] {
        &self.y_values
    }

    pub fn len(&self) -> usize {
        self.y_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y_values.is_empty()
    }

    pub fn into_parts(self) -> (ObservationKind, PointSet, Vec<i64>, Vec<f64>) {
        (self.kind, self.points, self.x_values, self.y_values)
    }
}

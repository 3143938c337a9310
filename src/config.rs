//! Parameter record for curve synthesis.
//!
//! The TOML form is a flat `group -> option -> value` record. Group names
//! follow the parameter file the dashboard persists between sessions, so a
//! saved file loads back into an identical [`Configuration`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::anomaly::LeapShape;
use crate::distribution::DistributionParams;
use crate::points::{parse_point_label, PointSet};
use crate::SynthError;

/// Smallest basis each anomaly can reshape.
pub const MIN_POINTS_TIGHTENING_LEAP: usize = 4;
pub const MIN_POINTS_FINAL_LEAP: usize = 5;
pub const MIN_POINTS_INCLINE: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    pub init_x: Vec<i64>,
    pub init_y: Vec<f64>,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            init_x: vec![0, 20, 210, 240, 300, 340, 360],
            init_y: vec![0.0, 2.0, 2.0, 4.5, 17.5, 20.0, 20.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountsConfig {
    pub number_of_ok: usize,
    /// Ok runs in the mixed preview
    pub number_of_ok_to_plot: usize,
}

impl Default for AmountsConfig {
    fn default() -> Self {
        Self {
            number_of_ok: 100,
            number_of_ok_to_plot: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    #[serde(rename = "Savitzky-Golay")]
    SavitzkyGolay,
    #[serde(rename = "Convolution")]
    MovingAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub apply: bool,
    pub selected_type: FilterKind,
    pub sg_window_length: usize,
    pub sg_poly_order: usize,
    pub conv_box_pts: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            apply: true,
            selected_type: FilterKind::SavitzkyGolay,
            sg_window_length: 11,
            sg_poly_order: 3,
            conv_box_pts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub apply: bool,
    #[serde(flatten)]
    pub distribution: DistributionParams,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            apply: true,
            distribution: DistributionParams::normal(0.1),
        }
    }
}

/// Noise restricted to sample indices strictly inside `(lower, upper)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowedNoiseConfig {
    pub apply: bool,
    pub lower_xlimitation: i64,
    pub upper_xlimitation: i64,
    #[serde(flatten)]
    pub distribution: DistributionParams,
}

impl Default for WindowedNoiseConfig {
    fn default() -> Self {
        Self {
            apply: true,
            lower_xlimitation: 240,
            upper_xlimitation: 360,
            distribution: DistributionParams::normal(0.2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetConfig {
    pub apply: bool,
    /// Point labels (`P<i>`) that receive an offset
    pub selected_points: Vec<String>,
    /// Share one draw across the whole selection
    pub equalize: bool,
    #[serde(flatten)]
    pub distribution: DistributionParams,
}

impl OffsetConfig {
    pub fn selected_indices(&self) -> Result<Vec<usize>, SynthError> {
        self.selected_points
            .iter()
            .map(|label| parse_point_label(label))
            .collect()
    }

    fn horizontal_default() -> Self {
        Self {
            apply: true,
            selected_points: vec!["P2".to_string(), "P4".to_string()],
            equalize: false,
            distribution: DistributionParams::normal(5.0),
        }
    }

    fn vertical_default() -> Self {
        Self {
            apply: true,
            selected_points: vec!["P4".to_string(), "P5".to_string(), "P6".to_string()],
            equalize: false,
            distribution: DistributionParams::normal(0.5),
        }
    }
}

impl Default for OffsetConfig {
    fn default() -> Self {
        Self {
            apply: false,
            selected_points: Vec::new(),
            equalize: false,
            distribution: DistributionParams::zero(),
        }
    }
}

/// Type 1: leap in the tightening phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TighteningLeapConfig {
    pub generate: bool,
    pub amount: usize,
    pub amount_to_plot: usize,
    pub lower_xlimitation: i64,
    pub upper_xlimitation: i64,
    pub width: f64,
    pub height: f64,
    pub leap_shape: LeapShape,
}

impl Default for TighteningLeapConfig {
    fn default() -> Self {
        Self {
            generate: true,
            amount: 25,
            amount_to_plot: 5,
            lower_xlimitation: 10,
            upper_xlimitation: 10,
            width: 40.0,
            height: 3.0,
            leap_shape: LeapShape::Centered,
        }
    }
}

/// Type 2: leap during the final tightening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalLeapConfig {
    pub generate: bool,
    pub amount: usize,
    pub amount_to_plot: usize,
    pub x: i64,
    pub y: f64,
    /// Perturb `x` and `y` with draws from `anomalies_type_2_position`
    pub randomize: bool,
}

impl Default for FinalLeapConfig {
    fn default() -> Self {
        Self {
            generate: true,
            amount: 25,
            amount_to_plot: 5,
            x: 320,
            y: 25.0,
            randomize: false,
        }
    }
}

/// Types 3 and 4: hard and soft runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InclineConfig {
    pub generate: bool,
    pub amount: usize,
    pub amount_to_plot: usize,
    /// Intensify the fixed x-deltas with draws from the flattened distribution
    pub randomize: bool,
    #[serde(flatten)]
    pub offset: DistributionParams,
}

impl Default for InclineConfig {
    fn default() -> Self {
        Self {
            generate: true,
            amount: 25,
            amount_to_plot: 5,
            randomize: false,
            offset: DistributionParams::zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationConfig {
    pub remove_neg_y_values: bool,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            remove_neg_y_values: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub base: BaseConfig,
    pub amounts: AmountsConfig,
    pub filter: FilterConfig,
    pub randomize_scattering: NoiseConfig,
    pub randomize_tightening: WindowedNoiseConfig,
    pub randomize_horizontal_offset: OffsetConfig,
    pub randomize_vertical_offset: OffsetConfig,
    pub anomalies_type_1: TighteningLeapConfig,
    pub anomalies_type_1_width: DistributionParams,
    pub anomalies_type_1_height: DistributionParams,
    pub anomalies_type_2: FinalLeapConfig,
    pub anomalies_type_2_position: DistributionParams,
    pub anomalies_type_3: InclineConfig,
    pub anomalies_type_4: InclineConfig,
    pub preparation: PreparationConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            base: BaseConfig::default(),
            amounts: AmountsConfig::default(),
            filter: FilterConfig::default(),
            randomize_scattering: NoiseConfig::default(),
            randomize_tightening: WindowedNoiseConfig::default(),
            randomize_horizontal_offset: OffsetConfig::horizontal_default(),
            randomize_vertical_offset: OffsetConfig::vertical_default(),
            anomalies_type_1: TighteningLeapConfig::default(),
            anomalies_type_1_width: DistributionParams::normal(3.0),
            anomalies_type_1_height: DistributionParams::normal(0.5),
            anomalies_type_2: FinalLeapConfig::default(),
            anomalies_type_2_position: DistributionParams::zero(),
            anomalies_type_3: InclineConfig::default(),
            anomalies_type_4: InclineConfig::default(),
            preparation: PreparationConfig::default(),
        }
    }
}

impl Configuration {
    /// A configuration with every stochastic and shaping stage switched off.
    pub fn plain(init_x: Vec<i64>, init_y: Vec<f64>) -> Self {
        let mut cfg = Self {
            base: BaseConfig { init_x, init_y },
            ..Self::default()
        };
        cfg.filter.apply = false;
        cfg.randomize_scattering.apply = false;
        cfg.randomize_tightening.apply = false;
        cfg.randomize_horizontal_offset.apply = false;
        cfg.randomize_vertical_offset.apply = false;
        cfg.preparation.remove_neg_y_values = false;
        cfg.anomalies_type_1.generate = false;
        cfg.anomalies_type_2.generate = false;
        cfg.anomalies_type_3.generate = false;
        cfg.anomalies_type_4.generate = false;
        cfg
    }

    /// Parses a parameter file on top of the defaults.
    ///
    /// Options left out keep the default of their own group. Unknown groups
    /// and options are rejected.
    pub fn from_toml_str(raw: &str) -> Result<Self, SynthError> {
        let overrides: toml::Table = raw.parse()?;
        let toml::Value::Table(mut merged) = toml::Value::try_from(Self::default())? else {
            return Err(SynthError::InvalidConfig(
                "default parameters do not form a table".to_string(),
            ));
        };
        overlay_groups(&mut merged, overrides)?;
        let cfg: Configuration = toml::Value::Table(merged).try_into()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, SynthError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, SynthError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_toml_file(&self, path: &Path) -> Result<(), SynthError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// The canonical control-point basis as a fresh point set.
    pub fn basis(&self) -> Result<PointSet, SynthError> {
        let points = PointSet::from_steps(&self.base.init_x, &self.base.init_y)?;
        if points.len() < 2 {
            return Err(SynthError::InvalidConfig(format!(
                "basis needs at least 2 points, got {}",
                points.len()
            )));
        }
        if let Some(idx) = points.first_decreasing_index() {
            return Err(SynthError::InvalidConfig(format!(
                "basis x-values must be non-decreasing (P{idx} < P{})",
                idx - 1
            )));
        }
        Ok(points)
    }

    /// Replaces the basis with an edited point set.
    pub fn set_basis(&mut self, points: &PointSet) {
        self.base.init_x = points.xs();
        self.base.init_y = points.ys();
    }

    pub fn validate(&self) -> Result<(), SynthError> {
        let basis = self.basis()?;
        let n = basis.len();

        if self.filter.apply {
            match self.filter.selected_type {
                FilterKind::SavitzkyGolay => {
                    let window = self.filter.sg_window_length;
                    if window % 2 == 0 {
                        return Err(SynthError::InvalidConfig(format!(
                            "sg_window_length must be odd, got {window}"
                        )));
                    }
                    if window <= self.filter.sg_poly_order {
                        return Err(SynthError::InvalidConfig(format!(
                            "sg_window_length ({window}) must be greater than sg_poly_order ({})",
                            self.filter.sg_poly_order
                        )));
                    }
                }
                FilterKind::MovingAverage => {
                    if self.filter.conv_box_pts == 0 {
                        return Err(SynthError::InvalidConfig(
                            "conv_box_pts must be greater than zero".to_string(),
                        ));
                    }
                }
            }
        }

        if self.randomize_scattering.apply {
            self.randomize_scattering
                .distribution
                .validate("randomize_scattering")?;
        }
        if self.randomize_tightening.apply {
            self.randomize_tightening
                .distribution
                .validate("randomize_tightening")?;
        }

        for (name, offset) in [
            ("randomize_horizontal_offset", &self.randomize_horizontal_offset),
            ("randomize_vertical_offset", &self.randomize_vertical_offset),
        ] {
            if !offset.apply {
                continue;
            }
            offset.distribution.validate(name)?;
            for idx in offset.selected_indices()? {
                if idx >= n {
                    return Err(SynthError::InvalidConfig(format!(
                        "{name}: selected point P{idx} does not exist in a basis of {n} points"
                    )));
                }
            }
        }

        if self.anomalies_type_1.generate {
            require_points("anomalies_type_1", n, MIN_POINTS_TIGHTENING_LEAP)?;
            self.anomalies_type_1_width
                .validate("anomalies_type_1_width")?;
            self.anomalies_type_1_height
                .validate("anomalies_type_1_height")?;
            let leap = &self.anomalies_type_1;
            if !leap.width.is_finite() || !leap.height.is_finite() {
                return Err(SynthError::InvalidConfig(
                    "anomalies_type_1: width and height must be finite".to_string(),
                ));
            }
            if leap.lower_xlimitation < 0 || leap.upper_xlimitation < 0 {
                return Err(SynthError::InvalidConfig(format!(
                    "anomalies_type_1: limits must not be negative, got lower={} upper={}",
                    leap.lower_xlimitation, leap.upper_xlimitation
                )));
            }
            let lo = basis.x(1)? + leap.lower_xlimitation;
            let hi = basis.x(2)? - leap.upper_xlimitation - 1;
            if lo > hi {
                return Err(SynthError::InvalidConfig(format!(
                    "anomalies_type_1: limits leave no room for a leap between x={} and x={}",
                    basis.x(1)?,
                    basis.x(2)?
                )));
            }
        }

        if self.anomalies_type_2.generate {
            require_points("anomalies_type_2", n, MIN_POINTS_FINAL_LEAP)?;
            if self.anomalies_type_2.randomize {
                self.anomalies_type_2_position
                    .validate("anomalies_type_2_position")?;
            }
        }

        for (name, incline) in [
            ("anomalies_type_3", &self.anomalies_type_3),
            ("anomalies_type_4", &self.anomalies_type_4),
        ] {
            if !incline.generate {
                continue;
            }
            require_points(name, n, MIN_POINTS_INCLINE)?;
            if incline.randomize {
                incline.offset.validate(name)?;
            }
        }

        Ok(())
    }
}

fn overlay_groups(defaults: &mut toml::Table, overrides: toml::Table) -> Result<(), SynthError> {
    for (group, value) in overrides {
        let Some(toml::Value::Table(known)) = defaults.get_mut(&group) else {
            return Err(SynthError::InvalidConfig(format!(
                "unknown parameter group [{group}]"
            )));
        };
        let toml::Value::Table(options) = value else {
            return Err(SynthError::InvalidConfig(format!(
                "[{group}] must be a table of options"
            )));
        };
        for (option, value) in options {
            match known.get_mut(&option) {
                Some(slot) => *slot = value,
                None => {
                    return Err(SynthError::InvalidConfig(format!(
                        "unknown option `{option}` in [{group}]"
                    )))
                }
            }
        }
    }
    Ok(())
}

fn require_points(context: &str, n: usize, min: usize) -> Result<(), SynthError> {
    if n < min {
        return Err(SynthError::InvalidConfig(format!(
            "{context}: needs a basis of at least {min} points, got {n}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Configuration, FilterKind};
    use crate::distribution::DistributionKind;

    #[test]
    fn default_configuration_is_valid() {
        let cfg = Configuration::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.basis().unwrap().len(), 7);
    }

    #[test]
    fn toml_round_trip_preserves_every_group() {
        let mut cfg = Configuration::default();
        cfg.randomize_scattering.distribution.selected_type = DistributionKind::Weibull;
        cfg.randomize_scattering.distribution.weibull_alpha = 2.5;
        cfg.filter.selected_type = FilterKind::MovingAverage;
        cfg.anomalies_type_3.randomize = true;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameter.toml");
        cfg.save_toml_file(&path).unwrap();
        let loaded = Configuration::from_toml_file(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn toml_groups_are_flat() {
        let raw = Configuration::default().to_toml_string().unwrap();
        assert!(raw.contains("[randomize_scattering]"));
        assert!(raw.contains("selected_type = \"Normal\""));
        assert!(raw.contains("[anomalies_type_1_width]"));
        assert!(raw.contains("leap_shape = \"Centered\""));
    }

    #[test]
    fn missing_groups_fall_back_to_defaults() {
        let cfg = Configuration::from_toml_str(
            "[base]\ninit_x = [0, 100, 200, 300]\ninit_y = [0.0, 50.0, 50.0, 0.0]\n\
             [anomalies_type_1]\ngenerate = false\n[anomalies_type_2]\ngenerate = false\n\
             [anomalies_type_3]\ngenerate = false\n[anomalies_type_4]\ngenerate = false\n\
             [randomize_horizontal_offset]\napply = false\n\
             [randomize_vertical_offset]\napply = false\n",
        )
        .unwrap();
        assert_eq!(cfg.base.init_x, vec![0, 100, 200, 300]);
        assert_eq!(cfg.amounts.number_of_ok, 100);
    }

    #[test]
    fn partial_groups_keep_their_own_defaults() {
        let cfg = Configuration::from_toml_str(
            "[randomize_scattering]\napply = true\n\
             [randomize_tightening]\nlower_xlimitation = 200\n\
             [randomize_horizontal_offset]\napply = true\n\
             [anomalies_type_1_width]\nselected_type = \"Normal\"\n",
        )
        .unwrap();
        let defaults = Configuration::default();
        assert_eq!(cfg.randomize_scattering.distribution.normal_stdev, 0.1);
        assert_eq!(cfg.randomize_tightening.lower_xlimitation, 200);
        assert_eq!(cfg.randomize_tightening.distribution.normal_stdev, 0.2);
        assert_eq!(
            cfg.randomize_horizontal_offset,
            defaults.randomize_horizontal_offset
        );
        assert_eq!(cfg.anomalies_type_1_width.normal_stdev, 3.0);
    }

    #[test]
    fn misspelled_options_are_rejected() {
        for raw in [
            "[randomize_scattering]\nnormal_stadev_val = 3.0\n",
            "[anomalies_type_1]\nwidht = 80.0\n",
            "[anomalies_type_1]\nhight_val = 9.0\n",
        ] {
            let err = Configuration::from_toml_str(raw).unwrap_err();
            assert!(err.is_configuration(), "{raw}: {err}");
            assert!(err.to_string().contains("unknown option"), "{err}");
        }
    }

    #[test]
    fn unknown_groups_are_rejected() {
        let err = Configuration::from_toml_str("[anomalies_type_5]\namount = 3\n").unwrap_err();
        assert!(err.is_configuration());
        let err = Configuration::from_toml_str("filter = 3\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn negative_type_1_limits_are_rejected() {
        let mut cfg = Configuration::default();
        cfg.anomalies_type_1.lower_xlimitation = -50;
        assert!(cfg.validate().unwrap_err().is_configuration());
        cfg.anomalies_type_1.lower_xlimitation = 10;
        cfg.anomalies_type_1.upper_xlimitation = -1;
        assert!(cfg.validate().unwrap_err().is_configuration());
        cfg.anomalies_type_1.generate = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_distribution_kind_is_a_configuration_error() {
        let err = Configuration::from_toml_str(
            "[randomize_scattering]\napply = true\nselected_type = \"Cauchy\"\n",
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn mismatched_basis_is_rejected() {
        let mut cfg = Configuration::default();
        cfg.base.init_y.pop();
        assert!(cfg.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn savitzky_golay_window_must_be_odd_and_exceed_order() {
        let mut cfg = Configuration::default();
        cfg.filter.sg_window_length = 10;
        assert!(cfg.validate().is_err());
        cfg.filter.sg_window_length = 3;
        cfg.filter.sg_poly_order = 3;
        assert!(cfg.validate().is_err());
        cfg.filter.apply = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn offset_labels_must_exist() {
        let mut cfg = Configuration::default();
        cfg.randomize_vertical_offset.selected_points = vec!["P9".to_string()];
        assert!(cfg.validate().is_err());
        cfg.randomize_vertical_offset.selected_points = vec!["nine".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_type_1_interval_is_rejected() {
        let mut cfg = Configuration::default();
        cfg.anomalies_type_1.lower_xlimitation = 100;
        cfg.anomalies_type_1.upper_xlimitation = 100;
        assert!(cfg.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn short_basis_cannot_host_inclines() {
        let mut cfg = Configuration::default();
        cfg.base.init_x.truncate(5);
        cfg.base.init_y.truncate(5);
        cfg.randomize_vertical_offset.apply = false;
        assert!(cfg.validate().is_err());
        cfg.anomalies_type_3.generate = false;
        cfg.anomalies_type_4.generate = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn set_basis_writes_edits_back() {
        let mut cfg = Configuration::default();
        let mut points = cfg.basis().unwrap();
        points.insert_point_after(points.len() - 1).unwrap();
        cfg.set_basis(&points);
        assert_eq!(cfg.base.init_x.len(), 8);
        assert_eq!(*cfg.base.init_x.last().unwrap(), 370);
    }
}

//! Configuration types for grid layout, velocity model and brightness evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EmptyDataError, GeneticConfig, SearchError, Survey};

/// One of the four search dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    T,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::T];

    /// Position of this axis inside a `[x, y, z, t]` array.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::T => 3,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::T => "t",
        };
        f.write_str(name)
    }
}

/// Largest number of lattice values accepted along one axis.
pub const MAX_AXIS_POINTS: usize = 1_000_000;

/// Closed interval `[min, max]` sampled every `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl AxisRange {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Validate bounds and step for the given axis.
    pub fn validate(&self, axis: Axis) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.max < self.min {
            return Err(ConfigError::InvalidBounds {
                axis,
                min: self.min,
                max: self.max,
            });
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(ConfigError::InvalidStep {
                axis,
                step: self.step,
            });
        }
        let intervals = (self.max - self.min) / self.step;
        if !intervals.is_finite() || intervals >= MAX_AXIS_POINTS as f64 {
            return Err(ConfigError::TooManyPoints {
                axis,
                step: self.step,
                limit: MAX_AXIS_POINTS,
            });
        }
        Ok(())
    }

    /// Number of lattice values, including both ends when `max` lies on the lattice.
    pub fn len(&self) -> usize {
        if !(self.step > 0.0) || !(self.max >= self.min) {
            return 0;
        }
        // Float-to-int casts saturate, so an unvalidated tiny step cannot overflow.
        (((self.max - self.min) / self.step + 1e-9).floor() as usize).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the lattice values.
    pub fn values(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.min + i as f64 * self.step)
            .collect()
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Origin-time window to search, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Reversed or non-finite windows are configuration errors; a zero-length
    /// window leaves nothing to search.
    pub fn validate(&self) -> Result<(), SearchError> {
        if !self.start.is_finite() || !self.end.is_finite() || self.end < self.start {
            return Err(ConfigError::InvalidTimeWindow {
                start: self.start,
                end: self.end,
            }
            .into());
        }
        if self.end == self.start {
            return Err(EmptyDataError::EmptyTimeWindow {
                start: self.start,
                end: self.end,
            }
            .into());
        }
        Ok(())
    }
}

/// Named grid resolution presets, mapped to (horizontal step, depth step) in meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridResolution {
    Low,
    #[default]
    Medium,
    High,
}

impl GridResolution {
    /// Horizontal and vertical lattice spacing for this preset.
    pub const fn steps(self) -> (f64, f64) {
        match self {
            GridResolution::Low => (500.0, 50.0),
            GridResolution::Medium => (1000.0, 100.0),
            GridResolution::High => (2000.0, 200.0),
        }
    }
}

/// Spatial lattice plus origin-time step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub x: AxisRange,
    pub y: AxisRange,
    pub z: AxisRange,
    /// Origin-time step in seconds.
    pub time_step: f64,
}

impl GridSpec {
    /// Lattice spanning the receiver array horizontally and `depth_range` vertically.
    pub fn from_receivers(
        survey: &Survey,
        resolution: GridResolution,
        depth_range: (f64, f64),
        time_step: f64,
    ) -> Result<Self, SearchError> {
        let (lo, hi) = survey
            .receiver_extent()
            .ok_or(EmptyDataError::NoReceivers)?;
        let (horizontal, vertical) = resolution.steps();
        let grid = Self {
            x: AxisRange::new(lo.x, hi.x, horizontal),
            y: AxisRange::new(lo.y, hi.y, horizontal),
            z: AxisRange::new(depth_range.0, depth_range.1, vertical),
            time_step,
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.x.validate(Axis::X)?;
        self.y.validate(Axis::Y)?;
        self.z.validate(Axis::Z)?;
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(ConfigError::InvalidStep {
                axis: Axis::T,
                step: self.time_step,
            });
        }
        Ok(())
    }
}

/// Seismic phase whose arrival is stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    P,
    S,
}

/// Horizontal layer of a 1D velocity model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Depth of the layer top in meters.
    pub top: f64,
    /// P-wave velocity in m/s.
    pub vp: f64,
    /// S-wave velocity in m/s.
    pub vs: f64,
}

/// Velocity model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VelocityModelConfig {
    /// Homogeneous medium.
    Simple {
        #[serde(default = "default_p_velocity")]
        p_velocity: f64,
        #[serde(default = "default_s_velocity")]
        s_velocity: f64,
    },
    /// Flat-layered reference earth model.
    Layered {
        #[serde(default = "default_layered_name")]
        name: String,
        #[serde(default = "iasp91_crust")]
        layers: Vec<Layer>,
    },
}

impl Default for VelocityModelConfig {
    fn default() -> Self {
        Self::Simple {
            p_velocity: default_p_velocity(),
            s_velocity: default_s_velocity(),
        }
    }
}

pub(crate) fn default_p_velocity() -> f64 {
    5500.0
}
pub(crate) fn default_s_velocity() -> f64 {
    3200.0
}
fn default_layered_name() -> String {
    "iasp91".to_string()
}

/// Crustal section of IASP91 (top depth m, vp m/s, vs m/s).
pub fn iasp91_crust() -> Vec<Layer> {
    vec![
        Layer {
            top: 0.0,
            vp: 5800.0,
            vs: 3360.0,
        },
        Layer {
            top: 20_000.0,
            vp: 6500.0,
            vs: 3750.0,
        },
        Layer {
            top: 35_000.0,
            vp: 8040.0,
            vs: 4470.0,
        },
    ]
}

/// Travel-time settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Model used for travel times.
    #[serde(default)]
    pub model: VelocityModelConfig,
    /// Constant speed override in m/s; also used by the straight-line fallback.
    #[serde(default = "default_fixed_speed")]
    pub fixed_speed: Option<f64>,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            model: VelocityModelConfig::default(),
            fixed_speed: default_fixed_speed(),
        }
    }
}

fn default_fixed_speed() -> Option<f64> {
    Some(3000.0)
}

impl VelocityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(speed) = self.fixed_speed
            && !(speed.is_finite() && speed > 0.0)
        {
            return Err(ConfigError::InvalidVelocity(speed));
        }
        match &self.model {
            VelocityModelConfig::Simple {
                p_velocity,
                s_velocity,
            } => {
                for v in [*p_velocity, *s_velocity] {
                    if !(v.is_finite() && v > 0.0) {
                        return Err(ConfigError::InvalidVelocity(v));
                    }
                }
            }
            VelocityModelConfig::Layered { layers, .. } => validate_layers(layers)?,
        }
        Ok(())
    }
}

pub(crate) fn validate_layers(layers: &[Layer]) -> Result<(), ConfigError> {
    let first = layers.first().ok_or(ConfigError::NoLayers)?;
    if first.top != 0.0 {
        return Err(ConfigError::InvalidLayer {
            index: 0,
            reason: format!("first layer must start at the surface, starts at {}", first.top),
        });
    }
    for (index, layer) in layers.iter().enumerate() {
        if !(layer.vp.is_finite() && layer.vp > 0.0 && layer.vs.is_finite() && layer.vs > 0.0) {
            return Err(ConfigError::InvalidLayer {
                index,
                reason: format!("velocities must be positive (vp={}, vs={})", layer.vp, layer.vs),
            });
        }
        if index > 0 && layer.top <= layers[index - 1].top {
            return Err(ConfigError::InvalidLayer {
                index,
                reason: format!("layer tops must increase, {} follows {}", layer.top, layers[index - 1].top),
            });
        }
    }
    Ok(())
}

/// Brightness evaluation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Samples on each side of the predicted arrival searched for the peak.
    #[serde(default = "default_half_width")]
    pub window_half_width: usize,
    /// Leading samples averaged for the baseline.
    #[serde(default = "default_baseline_samples")]
    pub baseline_samples: usize,
    /// Decimal places kept in cache keys.
    #[serde(default = "default_cache_decimals")]
    pub cache_decimals: u32,
    /// Phase whose arrival is stacked.
    #[serde(default)]
    pub phase: Phase,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            window_half_width: default_half_width(),
            baseline_samples: default_baseline_samples(),
            cache_decimals: default_cache_decimals(),
            phase: Phase::default(),
        }
    }
}

fn default_half_width() -> usize {
    50
}
fn default_baseline_samples() -> usize {
    100
}
fn default_cache_decimals() -> u32 {
    4
}

impl EvaluatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline_samples == 0 {
            return Err(ConfigError::InvalidEvaluator(
                "baseline_samples must be non-zero".into(),
            ));
        }
        // 10^10 times a kilometre-scale coordinate still fits an i64 key.
        if self.cache_decimals > 10 {
            return Err(ConfigError::InvalidEvaluator(format!(
                "cache_decimals must be at most 10, got {}",
                self.cache_decimals
            )));
        }
        Ok(())
    }
}

/// Top-level location run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateConfig {
    /// Grid preset used when the lattice is derived from the receiver array.
    #[serde(default)]
    pub resolution: GridResolution,
    /// Depth interval searched, in meters.
    #[serde(default = "default_depth_range")]
    pub depth_range: (f64, f64),
    /// Origin-time step in seconds.
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    /// Extra seconds searched on both sides of the time window.
    #[serde(default)]
    pub time_padding: f64,
    /// Explicit origin-time window; estimated from the traces when absent.
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    #[serde(default)]
    pub velocity: VelocityConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub genetic: GeneticConfig,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            resolution: GridResolution::default(),
            depth_range: default_depth_range(),
            time_step: default_time_step(),
            time_padding: 0.0,
            time_window: None,
            velocity: VelocityConfig::default(),
            evaluator: EvaluatorConfig::default(),
            genetic: GeneticConfig::default(),
        }
    }
}

fn default_depth_range() -> (f64, f64) {
    (0.0, 6000.0)
}
fn default_time_step() -> f64 {
    0.01
}

impl LocateConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        AxisRange::new(self.depth_range.0, self.depth_range.1, self.resolution.steps().1)
            .validate(Axis::Z)?;
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(ConfigError::InvalidStep {
                axis: Axis::T,
                step: self.time_step,
            });
        }
        if !self.time_padding.is_finite() || self.time_padding < 0.0 {
            return Err(ConfigError::InvalidTimePadding(self.time_padding));
        }
        self.velocity.validate()?;
        self.evaluator.validate()?;
        self.genetic.validate()?;
        Ok(())
    }

    /// Lattice derived from the receiver array using this configuration's preset.
    pub fn grid_for(&self, survey: &Survey) -> Result<GridSpec, SearchError> {
        GridSpec::from_receivers(survey, self.resolution, self.depth_range, self.time_step)
    }

    /// The configured time window widened by `time_padding`.
    pub fn padded_window(&self, window: TimeWindow) -> TimeWindow {
        TimeWindow::new(window.start - self.time_padding, window.end + self.time_padding)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Axis {axis} has invalid bounds [{min}, {max}]")]
    InvalidBounds { axis: Axis, min: f64, max: f64 },
    #[error("Axis {axis} step must be positive, got {step}")]
    InvalidStep { axis: Axis, step: f64 },
    #[error("Axis {axis} step {step} yields more than {limit} lattice values")]
    TooManyPoints { axis: Axis, step: f64, limit: usize },
    #[error("Search lattice is too large to enumerate")]
    GridTooLarge,
    #[error("Time window [{start}, {end}] is reversed or not finite")]
    InvalidTimeWindow { start: f64, end: f64 },
    #[error("Time padding must be non-negative, got {0}")]
    InvalidTimePadding(f64),
    #[error("Velocity must be positive, got {0}")]
    InvalidVelocity(f64),
    #[error("Layered velocity model has no layers")]
    NoLayers,
    #[error("Layer {index} is invalid: {reason}")]
    InvalidLayer { index: usize, reason: String },
    #[error("Invalid evaluator settings: {0}")]
    InvalidEvaluator(String),
    #[error("Invalid genetic search settings: {0}")]
    InvalidGenetic(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Position;

    #[test]
    fn test_default_config_valid() {
        assert!(LocateConfig::default().validate().is_ok());
    }

    #[test]
    fn test_axis_values_inclusive() {
        let axis = AxisRange::new(0.0, 1000.0, 500.0);
        assert_eq!(axis.values(), vec![0.0, 500.0, 1000.0]);

        let t = AxisRange::new(0.0, 0.1, 0.01);
        assert_eq!(t.len(), 11);
    }

    #[test]
    fn test_single_value_axis() {
        let axis = AxisRange::new(250.0, 250.0, 10.0);
        assert!(axis.validate(Axis::Z).is_ok());
        assert_eq!(axis.values(), vec![250.0]);
    }

    #[test]
    fn test_degenerate_axis_rejected() {
        assert!(matches!(
            AxisRange::new(10.0, 0.0, 1.0).validate(Axis::X),
            Err(ConfigError::InvalidBounds { axis: Axis::X, .. })
        ));
        assert!(matches!(
            AxisRange::new(0.0, 10.0, 0.0).validate(Axis::Y),
            Err(ConfigError::InvalidStep { axis: Axis::Y, .. })
        ));
        assert!(AxisRange::new(0.0, f64::NAN, 1.0).validate(Axis::Z).is_err());
    }

    #[test]
    fn test_tiny_step_rejected() {
        let axis = AxisRange::new(0.0, 1.0, 1e-300);
        assert!(matches!(
            axis.validate(Axis::X),
            Err(ConfigError::TooManyPoints { axis: Axis::X, .. })
        ));
        assert_eq!(axis.len(), usize::MAX);

        let dense = AxisRange::new(0.0, 2.0, 1.0 / MAX_AXIS_POINTS as f64);
        assert!(dense.validate(Axis::T).is_err());
        let ok = AxisRange::new(0.0, 1.0, 2.0 / MAX_AXIS_POINTS as f64);
        assert!(ok.validate(Axis::T).is_ok());
    }

    #[test]
    fn test_time_window_validation() {
        assert!(TimeWindow::new(0.0, 1.0).validate().is_ok());
        assert!(matches!(
            TimeWindow::new(1.0, 1.0).validate(),
            Err(SearchError::EmptyData(EmptyDataError::EmptyTimeWindow { .. }))
        ));
        assert!(matches!(
            TimeWindow::new(2.0, 1.0).validate(),
            Err(SearchError::Config(ConfigError::InvalidTimeWindow { .. }))
        ));
    }

    #[test]
    fn test_grid_from_receivers() {
        let survey = Survey::from_channels(
            0.002,
            vec![
                (Position::new(100.0, 200.0, 0.0), vec![0.0; 4]),
                (Position::new(2100.0, 1200.0, 0.0), vec![0.0; 4]),
            ],
        );
        let grid =
            GridSpec::from_receivers(&survey, GridResolution::Medium, (0.0, 500.0), 0.01).unwrap();
        assert_eq!(grid.x.values(), vec![100.0, 1100.0, 2100.0]);
        assert_eq!(grid.y.values(), vec![200.0, 1200.0]);
        assert_eq!(grid.z.step, 100.0);
        assert_eq!(grid.z.len(), 6);
    }

    #[test]
    fn test_layer_validation() {
        assert!(validate_layers(&iasp91_crust()).is_ok());
        assert_eq!(validate_layers(&[]), Err(ConfigError::NoLayers));

        let mut layers = iasp91_crust();
        layers[2].top = 10_000.0;
        assert!(matches!(
            validate_layers(&layers),
            Err(ConfigError::InvalidLayer { index: 2, .. })
        ));
    }

    #[test]
    fn test_serialization() {
        let mut config = LocateConfig::default();
        config.velocity.model = VelocityModelConfig::Layered {
            name: "iasp91".into(),
            layers: iasp91_crust(),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: LocateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.velocity, config.velocity);
        assert_eq!(parsed.genetic.population_size, config.genetic.population_size);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: LocateConfig =
            serde_json::from_str(r#"{ "resolution": "Low", "velocity": { "model": { "type": "Simple" } } }"#)
                .unwrap();
        assert_eq!(parsed.resolution, GridResolution::Low);
        assert_eq!(parsed.velocity.fixed_speed, Some(3000.0));
        assert_eq!(parsed.evaluator.window_half_width, 50);
    }
}

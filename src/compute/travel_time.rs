//! Travel-time models.
//!
//! [`TravelTime`] is the capability the brightness evaluator consumes.
//! [`VelocityModel`] is built from configuration, and [`FallbackTravelTime`]
//! wraps it so that a failing model degrades to a straight-line estimate
//! instead of aborting the run.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::schema::{
    ConfigError, Layer, Phase, Position, VelocityConfig, VelocityModelConfig,
    default_p_velocity, default_s_velocity, validate_layers,
};

/// Source-to-receiver propagation delay.
pub trait TravelTime: Send + Sync {
    /// Seconds for `phase` to travel from `source` to `receiver`.
    ///
    /// `fixed_speed` replaces the model's velocity when set.
    fn time_delay(
        &self,
        source: &Position,
        receiver: &Position,
        fixed_speed: Option<f64>,
        phase: Phase,
    ) -> Result<f64, TravelTimeError>;
}

/// Per-call travel-time failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TravelTimeError {
    #[error("Non-finite source or receiver coordinates")]
    NonFinite,
    #[error("Depth {depth} m lies above the model surface at {surface} m")]
    AboveSurface { depth: f64, surface: f64 },
    #[error("Velocity must be positive, got {0}")]
    InvalidVelocity(f64),
}

fn straight_line(
    source: &Position,
    receiver: &Position,
    speed: f64,
) -> Result<f64, TravelTimeError> {
    if !source.is_finite() || !receiver.is_finite() {
        return Err(TravelTimeError::NonFinite);
    }
    if !(speed.is_finite() && speed > 0.0) {
        return Err(TravelTimeError::InvalidVelocity(speed));
    }
    Ok(source.distance(receiver) / speed)
}

impl<T: TravelTime + ?Sized> TravelTime for Box<T> {
    fn time_delay(
        &self,
        source: &Position,
        receiver: &Position,
        fixed_speed: Option<f64>,
        phase: Phase,
    ) -> Result<f64, TravelTimeError> {
        (**self).time_delay(source, receiver, fixed_speed, phase)
    }
}

// ============================================================================
// Homogeneous model
// ============================================================================

/// Constant-velocity medium.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleModel {
    pub p_velocity: f64,
    pub s_velocity: f64,
}

impl Default for SimpleModel {
    fn default() -> Self {
        Self {
            p_velocity: default_p_velocity(),
            s_velocity: default_s_velocity(),
        }
    }
}

impl SimpleModel {
    #[inline]
    pub fn velocity(&self, phase: Phase) -> f64 {
        match phase {
            Phase::P => self.p_velocity,
            Phase::S => self.s_velocity,
        }
    }
}

impl TravelTime for SimpleModel {
    fn time_delay(
        &self,
        source: &Position,
        receiver: &Position,
        fixed_speed: Option<f64>,
        phase: Phase,
    ) -> Result<f64, TravelTimeError> {
        straight_line(source, receiver, fixed_speed.unwrap_or(self.velocity(phase)))
    }
}

// ============================================================================
// Layered model
// ============================================================================

/// Flat-layered medium traversed by a straight ray.
///
/// Each layer spans from its top to the next layer's top; the last layer
/// extends downward without limit. Travel time is the sum over layers of the
/// ray length inside the layer divided by the layer velocity.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredModel {
    name: String,
    layers: Vec<Layer>,
}

impl LayeredModel {
    pub fn new(name: impl Into<String>, layers: Vec<Layer>) -> Result<Self, ConfigError> {
        validate_layers(&layers)?;
        Ok(Self {
            name: name.into(),
            layers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn surface(&self) -> f64 {
        self.layers.first().map_or(0.0, |l| l.top)
    }

    fn layer_velocity(layer: &Layer, phase: Phase) -> f64 {
        match phase {
            Phase::P => layer.vp,
            Phase::S => layer.vs,
        }
    }

    /// Velocity of the layer containing `depth`.
    fn velocity_at(&self, depth: f64, phase: Phase) -> f64 {
        let layer = self
            .layers
            .iter()
            .rev()
            .find(|l| l.top <= depth)
            .or(self.layers.first());
        layer.map_or(0.0, |l| Self::layer_velocity(l, phase))
    }
}

impl TravelTime for LayeredModel {
    fn time_delay(
        &self,
        source: &Position,
        receiver: &Position,
        fixed_speed: Option<f64>,
        phase: Phase,
    ) -> Result<f64, TravelTimeError> {
        if let Some(speed) = fixed_speed {
            return straight_line(source, receiver, speed);
        }
        if !source.is_finite() || !receiver.is_finite() {
            return Err(TravelTimeError::NonFinite);
        }

        let surface = self.surface();
        for depth in [source.z, receiver.z] {
            if depth < surface {
                return Err(TravelTimeError::AboveSurface { depth, surface });
            }
        }

        let length = source.distance(receiver);
        let top = source.z.min(receiver.z);
        let bottom = source.z.max(receiver.z);
        let vertical = bottom - top;

        if vertical <= f64::EPSILON * length.max(1.0) {
            let velocity = self.velocity_at(top, phase);
            return straight_line(source, receiver, velocity);
        }

        let mut time = 0.0;
        for (i, layer) in self.layers.iter().enumerate() {
            let layer_bottom = self.layers.get(i + 1).map_or(f64::INFINITY, |l| l.top);
            let overlap = bottom.min(layer_bottom) - top.max(layer.top);
            if overlap <= 0.0 {
                continue;
            }
            let velocity = Self::layer_velocity(layer, phase);
            if !(velocity.is_finite() && velocity > 0.0) {
                return Err(TravelTimeError::InvalidVelocity(velocity));
            }
            time += length * (overlap / vertical) / velocity;
        }
        Ok(time)
    }
}

// ============================================================================
// Model selection
// ============================================================================

/// Travel-time model chosen by configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum VelocityModel {
    Simple(SimpleModel),
    Layered(LayeredModel),
}

impl VelocityModel {
    pub fn from_config(config: &VelocityModelConfig) -> Result<Self, ConfigError> {
        match config {
            VelocityModelConfig::Simple {
                p_velocity,
                s_velocity,
            } => Ok(Self::Simple(SimpleModel {
                p_velocity: *p_velocity,
                s_velocity: *s_velocity,
            })),
            VelocityModelConfig::Layered { name, layers } => {
                Ok(Self::Layered(LayeredModel::new(name.clone(), layers.clone())?))
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VelocityModel::Simple(_) => "simple",
            VelocityModel::Layered(model) => model.name(),
        }
    }
}

impl TravelTime for VelocityModel {
    fn time_delay(
        &self,
        source: &Position,
        receiver: &Position,
        fixed_speed: Option<f64>,
        phase: Phase,
    ) -> Result<f64, TravelTimeError> {
        match self {
            VelocityModel::Simple(model) => model.time_delay(source, receiver, fixed_speed, phase),
            VelocityModel::Layered(model) => {
                model.time_delay(source, receiver, fixed_speed, phase)
            }
        }
    }
}

// ============================================================================
// Fallback adapter
// ============================================================================

/// Wraps a model and substitutes a straight-line estimate when it fails.
///
/// The estimate uses `fixed_speed` when configured, otherwise the default
/// homogeneous velocity for the phase. Non-finite input yields `NaN`.
pub struct FallbackTravelTime<M = VelocityModel> {
    primary: M,
    fixed_speed: Option<f64>,
    fallback: SimpleModel,
    failures: AtomicU64,
}

impl FallbackTravelTime<VelocityModel> {
    /// Build the configured model behind the fallback.
    pub fn from_config(config: &VelocityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            VelocityModel::from_config(&config.model)?,
            config.fixed_speed,
        ))
    }
}

impl<M: TravelTime> FallbackTravelTime<M> {
    pub fn new(primary: M, fixed_speed: Option<f64>) -> Self {
        Self {
            primary,
            fixed_speed,
            fallback: SimpleModel::default(),
            failures: AtomicU64::new(0),
        }
    }

    pub fn primary(&self) -> &M {
        &self.primary
    }

    /// Number of calls answered by the fallback so far.
    pub fn fallback_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn reset_fallback_count(&self) {
        self.failures.store(0, Ordering::Relaxed);
    }

    /// Delay in seconds. Never fails.
    pub fn delay(&self, source: &Position, receiver: &Position, phase: Phase) -> f64 {
        match self
            .primary
            .time_delay(source, receiver, self.fixed_speed, phase)
        {
            Ok(delay) => delay,
            Err(err) => {
                let previous = self.failures.fetch_add(1, Ordering::Relaxed);
                if previous == 0 {
                    log::warn!(
                        "Travel-time model failed ({err}); using straight-line estimate"
                    );
                } else {
                    log::debug!("Travel-time fallback #{}: {err}", previous + 1);
                }
                self.fallback
                    .time_delay(source, receiver, self.fixed_speed, phase)
                    .unwrap_or(f64::NAN)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::iasp91_crust;

    /// Model that always fails.
    struct Broken;

    impl TravelTime for Broken {
        fn time_delay(
            &self,
            _: &Position,
            _: &Position,
            _: Option<f64>,
            _: Phase,
        ) -> Result<f64, TravelTimeError> {
            Err(TravelTimeError::InvalidVelocity(0.0))
        }
    }

    #[test]
    fn test_simple_model_phases() {
        let model = SimpleModel::default();
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(5500.0, 0.0, 0.0);
        assert!((model.time_delay(&a, &b, None, Phase::P).unwrap() - 1.0).abs() < 1e-12);
        let s = model.time_delay(&a, &b, None, Phase::S).unwrap();
        assert!((s - 5500.0 / 3200.0).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_speed_overrides() {
        let model = SimpleModel::default();
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(0.0, 3000.0, 0.0);
        let t = model.time_delay(&a, &b, Some(3000.0), Phase::S).unwrap();
        assert!((t - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_rejected() {
        let model = SimpleModel::default();
        let a = Position::new(f64::NAN, 0.0, 0.0);
        let b = Position::new(0.0, 0.0, 0.0);
        assert_eq!(
            model.time_delay(&a, &b, None, Phase::P),
            Err(TravelTimeError::NonFinite)
        );
    }

    #[test]
    fn test_layered_vertical_ray() {
        let model = LayeredModel::new("iasp91", iasp91_crust()).unwrap();
        let surface = Position::new(0.0, 0.0, 0.0);
        let deep = Position::new(0.0, 0.0, 30_000.0);
        let t = model.time_delay(&deep, &surface, None, Phase::P).unwrap();
        let expected = 20_000.0 / 5800.0 + 10_000.0 / 6500.0;
        assert!((t - expected).abs() < 1e-9);
    }

    #[test]
    fn test_layered_oblique_ray_scales_with_length() {
        let model = LayeredModel::new("iasp91", iasp91_crust()).unwrap();
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(30_000.0, 40_000.0, 25_000.0);
        let length = a.distance(&b);
        let t = model.time_delay(&a, &b, None, Phase::P).unwrap();
        let expected = length * 0.8 / 5800.0 + length * 0.2 / 6500.0;
        assert!((t - expected).abs() < 1e-9);
    }

    #[test]
    fn test_layered_horizontal_ray_uses_local_layer() {
        let model = LayeredModel::new("iasp91", iasp91_crust()).unwrap();
        let a = Position::new(0.0, 0.0, 40_000.0);
        let b = Position::new(8040.0, 0.0, 40_000.0);
        let t = model.time_delay(&a, &b, None, Phase::P).unwrap();
        assert!((t - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_layered_above_surface_fails() {
        let model = LayeredModel::new("iasp91", iasp91_crust()).unwrap();
        let a = Position::new(0.0, 0.0, -10.0);
        let b = Position::new(100.0, 0.0, 0.0);
        assert!(matches!(
            model.time_delay(&a, &b, None, Phase::P),
            Err(TravelTimeError::AboveSurface { .. })
        ));
    }

    #[test]
    fn test_fallback_counts_and_recovers() {
        let adapter = FallbackTravelTime::new(Broken, Some(2000.0));
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(4000.0, 0.0, 0.0);

        assert!((adapter.delay(&a, &b, Phase::P) - 2.0).abs() < 1e-12);
        assert!((adapter.delay(&a, &b, Phase::S) - 2.0).abs() < 1e-12);
        assert_eq!(adapter.fallback_count(), 2);

        adapter.reset_fallback_count();
        assert_eq!(adapter.fallback_count(), 0);
    }

    #[test]
    fn test_fallback_uses_default_velocity_without_fixed_speed() {
        let adapter = FallbackTravelTime::new(Broken, None);
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(5500.0, 0.0, 0.0);
        assert!((adapter.delay(&a, &b, Phase::P) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_layered_failure_falls_back() {
        let config = VelocityConfig {
            model: VelocityModelConfig::Layered {
                name: "iasp91".into(),
                layers: iasp91_crust(),
            },
            fixed_speed: None,
        };
        let adapter = FallbackTravelTime::from_config(&config).unwrap();
        let above = Position::new(0.0, 0.0, -5500.0);
        let origin = Position::new(0.0, 0.0, 0.0);
        assert!((adapter.delay(&above, &origin, Phase::P) - 1.0).abs() < 1e-12);
        assert_eq!(adapter.fallback_count(), 1);
        assert_eq!(adapter.primary().name(), "iasp91");
    }
}

//! Brightness (stack amplitude) evaluation with run-local caches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::schema::{EvaluatorConfig, Point, Position, Receiver, SearchError, Survey, VelocityConfig};

use super::trace::{NormalizedTrace, normalize_traces};
use super::travel_time::{FallbackTravelTime, TravelTime, VelocityModel};

type PointKey = [i64; 4];
type DelayKey = ([i64; 3], usize);

/// Cache counters for one evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Cached brightness values.
    pub entries: usize,
    /// Cached source/receiver delays.
    pub delay_entries: usize,
    /// Travel times answered by the straight-line fallback.
    pub fallbacks: u64,
}

/// Scores candidate points against a survey.
///
/// Brightness at `(x, y, z, t)` is the mean, over receivers whose predicted
/// arrival falls inside their trace, of the largest absolute normalized
/// amplitude within `window_half_width` samples of that arrival.
///
/// Values are memoized by coordinates rounded to `cache_decimals` places and
/// always computed at the rounded coordinates, so equal keys give equal
/// values whatever order or thread evaluates them.
pub struct BrightnessEvaluator {
    traces: Vec<NormalizedTrace>,
    receivers: Vec<Receiver>,
    sample_interval: f64,
    travel_time: FallbackTravelTime<Box<dyn TravelTime>>,
    config: EvaluatorConfig,
    scale: f64,
    cache: RwLock<HashMap<PointKey, f64>>,
    delays: RwLock<HashMap<DelayKey, f64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BrightnessEvaluator {
    /// Normalize the survey's traces and build the configured travel-time model.
    pub fn new(
        survey: &Survey,
        velocity: &VelocityConfig,
        config: &EvaluatorConfig,
    ) -> Result<Self, SearchError> {
        velocity.validate()?;
        let model = VelocityModel::from_config(&velocity.model)?;
        Self::with_model(survey, model, velocity.fixed_speed, config)
    }

    /// Use a caller-supplied travel-time model behind the straight-line fallback.
    pub fn with_model(
        survey: &Survey,
        model: impl TravelTime + 'static,
        fixed_speed: Option<f64>,
        config: &EvaluatorConfig,
    ) -> Result<Self, SearchError> {
        survey.validate()?;
        config.validate()?;

        let model: Box<dyn TravelTime> = Box::new(model);
        Ok(Self {
            traces: normalize_traces(&survey.traces, config.baseline_samples),
            receivers: survey.receivers.clone(),
            sample_interval: survey.sample_interval,
            travel_time: FallbackTravelTime::new(model, fixed_speed),
            config: config.clone(),
            scale: 10f64.powi(config.cache_decimals as i32),
            cache: RwLock::new(HashMap::new()),
            delays: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Receiver table, in survey order.
    pub fn receivers(&self) -> &[Receiver] {
        &self.receivers
    }

    /// Seconds between samples.
    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }

    /// Evaluation settings this evaluator was built with.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Brightness of one candidate. Non-finite candidates score zero.
    pub fn evaluate(&self, point: &Point) -> f64 {
        if !point.is_finite() {
            return 0.0;
        }

        let key = self.key(point);
        let cached = self.cache.read().get(&key).copied();
        if let Some(value) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return value;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = self.compute(key);
        self.cache.write().insert(key, value);
        value
    }

    /// Brightness of many candidates, in input order.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn evaluate_batch(&self, points: &[Point]) -> Vec<f64> {
        points.par_iter().map(|p| self.evaluate(p)).collect()
    }

    #[cfg(target_arch = "wasm32")]
    pub fn evaluate_batch(&self, points: &[Point]) -> Vec<f64> {
        points.iter().map(|p| self.evaluate(p)).collect()
    }

    /// Snapshot of the cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.read().len(),
            delay_entries: self.delays.read().len(),
            fallbacks: self.travel_time.fallback_count(),
        }
    }

    /// Number of `evaluate` calls so far, cache hits included.
    pub fn evaluations(&self) -> u64 {
        self.hits.load(Ordering::Relaxed) + self.misses.load(Ordering::Relaxed)
    }

    /// Drop cached values and reset counters.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
        self.delays.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.travel_time.reset_fallback_count();
    }

    #[inline]
    fn key(&self, point: &Point) -> PointKey {
        point.to_array().map(|v| (v * self.scale).round() as i64)
    }

    fn compute(&self, key: PointKey) -> f64 {
        let [x, y, z, t] = key.map(|k| k as f64 / self.scale);
        let source = Position::new(x, y, z);
        let spatial = [key[0], key[1], key[2]];

        let mut sum = 0.0;
        let mut contributing = 0usize;
        for (index, receiver) in self.receivers.iter().enumerate() {
            let Some(trace) = self.traces.get(receiver.trace) else {
                continue;
            };
            let arrival = t + self.delay(&source, spatial, index, &receiver.position);
            let duration = trace.len() as f64 * self.sample_interval;
            if !arrival.is_finite() || arrival < 0.0 || arrival >= duration {
                continue;
            }
            let sample = (arrival / self.sample_interval).floor() as usize;
            sum += trace.local_peak(sample, self.config.window_half_width);
            contributing += 1;
        }

        if contributing == 0 {
            0.0
        } else {
            sum / contributing as f64
        }
    }

    fn delay(&self, source: &Position, spatial: [i64; 3], index: usize, receiver: &Position) -> f64 {
        let key = (spatial, index);
        let cached = self.delays.read().get(&key).copied();
        if let Some(delay) = cached {
            return delay;
        }
        let delay = self.travel_time.delay(source, receiver, self.config.phase);
        self.delays.write().insert(key, delay);
        delay
    }
}

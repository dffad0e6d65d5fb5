//! Search configuration, progress and result types.
//!
//! These types describe a location run from the outside: genetic search
//! hyperparameters, the progress events streamed to callers, and the final
//! outcome (completed or cancelled).

use serde::{Deserialize, Serialize};

use super::{Axis, ConfigError, EmptyDataError, Position};

// ============================================================================
// Candidate points
// ============================================================================

/// Candidate hypocenter and origin time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64, t: f64) -> Self {
        Self { x, y, z, t }
    }

    pub const fn from_array(v: [f64; 4]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
            t: v[3],
        }
    }

    pub const fn to_array(self) -> [f64; 4] {
        [self.x, self.y, self.z, self.t]
    }

    #[inline]
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::T => self.t,
        }
    }

    #[inline]
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::T => self.t = value,
        }
    }

    /// Spatial part of the point.
    #[inline]
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.t.is_finite()
    }
}

/// A point together with its brightness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestPoint {
    pub point: Point,
    pub brightness: f64,
}

// ============================================================================
// Genetic search configuration
// ============================================================================

/// Genetic search hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Individuals per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Generations to evaluate. Zero evaluates the initial population only.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Initial per-dimension mutation probability.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Tournament size for parent selection.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Fraction of the population carried over unchanged (rounded up).
    #[serde(default = "default_elite_fraction")]
    pub elite_fraction: f64,
    /// Relative gain below which a new best does not count as progress.
    #[serde(default = "default_improvement_threshold")]
    pub improvement_threshold: f64,
    /// Stop after this many generations without progress.
    #[serde(default = "default_early_stop_limit")]
    pub early_stop_limit: Option<usize>,
    #[serde(default)]
    pub seeding: SeedingConfig,
    #[serde(default)]
    pub adaptive: AdaptiveMutationConfig,
    #[serde(default)]
    pub refinement: RefinementConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            mutation_rate: default_mutation_rate(),
            tournament_size: default_tournament_size(),
            elite_fraction: default_elite_fraction(),
            improvement_threshold: default_improvement_threshold(),
            early_stop_limit: default_early_stop_limit(),
            seeding: SeedingConfig::default(),
            adaptive: AdaptiveMutationConfig::default(),
            refinement: RefinementConfig::default(),
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    300
}
fn default_generations() -> usize {
    20
}
fn default_mutation_rate() -> f64 {
    0.2
}
fn default_tournament_size() -> usize {
    3
}
fn default_elite_fraction() -> f64 {
    0.1
}
fn default_improvement_threshold() -> f64 {
    0.001
}
fn default_early_stop_limit() -> Option<usize> {
    Some(10)
}

/// How the initial population is spread over the search space.
///
/// Whatever the random and grid fractions leave over is seeded around receivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedingConfig {
    /// Uniformly random individuals.
    #[serde(default = "default_random_fraction")]
    pub random_fraction: f64,
    /// Individuals snapped to the coarse seeding lattice.
    #[serde(default = "default_grid_fraction")]
    pub grid_fraction: f64,
    /// Coarse lattice resolution per axis (x, y, z, t).
    #[serde(default = "default_coarse_grid")]
    pub coarse_grid: [usize; 4],
    /// Receiver jitter half-width, in grid steps.
    #[serde(default = "default_receiver_jitter")]
    pub receiver_jitter: f64,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            random_fraction: default_random_fraction(),
            grid_fraction: default_grid_fraction(),
            coarse_grid: default_coarse_grid(),
            receiver_jitter: default_receiver_jitter(),
        }
    }
}

fn default_random_fraction() -> f64 {
    0.5
}
fn default_grid_fraction() -> f64 {
    0.3
}
fn default_coarse_grid() -> [usize; 4] {
    [10, 10, 5, 5]
}
fn default_receiver_jitter() -> f64 {
    5.0
}

impl SeedingConfig {
    pub fn receiver_fraction(&self) -> f64 {
        (1.0 - self.random_fraction - self.grid_fraction).max(0.0)
    }
}

/// Mutation-rate schedule driven by the no-improvement streak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveMutationConfig {
    /// Streak length above which the rate is boosted.
    #[serde(default = "default_boost_after")]
    pub boost_after: usize,
    #[serde(default = "default_boost_factor")]
    pub boost_factor: f64,
    #[serde(default = "default_max_rate")]
    pub max_rate: f64,
    /// Streak length above which the rate is decayed.
    #[serde(default = "default_decay_after")]
    pub decay_after: usize,
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    #[serde(default = "default_min_rate")]
    pub min_rate: f64,
}

impl Default for AdaptiveMutationConfig {
    fn default() -> Self {
        Self {
            boost_after: default_boost_after(),
            boost_factor: default_boost_factor(),
            max_rate: default_max_rate(),
            decay_after: default_decay_after(),
            decay_factor: default_decay_factor(),
            min_rate: default_min_rate(),
        }
    }
}

fn default_boost_after() -> usize {
    5
}
fn default_boost_factor() -> f64 {
    1.5
}
fn default_max_rate() -> f64 {
    0.5
}
fn default_decay_after() -> usize {
    2
}
fn default_decay_factor() -> f64 {
    0.8
}
fn default_min_rate() -> f64 {
    0.05
}

impl AdaptiveMutationConfig {
    /// Next mutation rate given the current one and the no-improvement streak.
    pub fn next_rate(&self, current: f64, initial: f64, streak: usize) -> f64 {
        if streak > self.boost_after {
            (current * self.boost_factor).min(self.max_rate)
        } else if streak > self.decay_after {
            (current * self.decay_factor).max(self.min_rate)
        } else {
            initial
        }
    }
}

/// Periodic hill-climbing around the current best.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Refine on generations divisible by this.
    #[serde(default = "default_refine_every")]
    pub every: usize,
    /// Samples drawn per refinement.
    #[serde(default = "default_refine_samples")]
    pub samples: usize,
    /// Initial neighborhood half-width, in grid steps.
    #[serde(default = "default_refine_radius")]
    pub radius: f64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            every: default_refine_every(),
            samples: default_refine_samples(),
            radius: default_refine_radius(),
        }
    }
}

fn default_refine_every() -> usize {
    5
}
fn default_refine_samples() -> usize {
    10
}
fn default_refine_radius() -> f64 {
    0.1
}

impl GeneticConfig {
    /// Number of individuals preserved by elitism.
    pub fn elite_count(&self) -> usize {
        ((self.population_size as f64 * self.elite_fraction).ceil() as usize)
            .clamp(1, self.population_size.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::InvalidGenetic(msg));

        if self.population_size < 2 {
            return fail(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return fail(format!(
                "mutation_rate must lie in [0, 1], got {}",
                self.mutation_rate
            ));
        }
        if self.tournament_size == 0 {
            return fail("tournament_size must be non-zero".into());
        }
        if !(0.0..=1.0).contains(&self.elite_fraction) {
            return fail(format!(
                "elite_fraction must lie in [0, 1], got {}",
                self.elite_fraction
            ));
        }
        if !(self.improvement_threshold >= 0.0) {
            return fail("improvement_threshold must be non-negative".into());
        }

        let s = &self.seeding;
        if !(0.0..=1.0).contains(&s.random_fraction)
            || !(0.0..=1.0).contains(&s.grid_fraction)
            || s.random_fraction + s.grid_fraction > 1.0 + 1e-9
        {
            return fail(format!(
                "seeding fractions must be within [0, 1] and sum to at most 1 (random={}, grid={})",
                s.random_fraction, s.grid_fraction
            ));
        }
        if s.coarse_grid.contains(&0) {
            return fail("coarse_grid resolutions must be non-zero".into());
        }
        if !(s.receiver_jitter >= 0.0) {
            return fail("receiver_jitter must be non-negative".into());
        }

        let a = &self.adaptive;
        if !(a.min_rate >= 0.0 && a.min_rate <= a.max_rate && a.max_rate <= 1.0) {
            return fail(format!(
                "adaptive rate bounds must satisfy 0 <= min ({}) <= max ({}) <= 1",
                a.min_rate, a.max_rate
            ));
        }
        if !(a.boost_factor >= 1.0) || !(a.decay_factor > 0.0 && a.decay_factor <= 1.0) {
            return fail("boost_factor must be >= 1 and decay_factor in (0, 1]".into());
        }

        if self.refinement.every == 0 {
            return fail("refinement.every must be non-zero".into());
        }
        if !(self.refinement.radius >= 0.0) {
            return fail("refinement.radius must be non-negative".into());
        }
        Ok(())
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Stage of a search run reported through progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchPhase {
    /// Building caches and the initial population.
    #[default]
    Init,
    /// Scoring candidates.
    Evaluating,
    /// A generation boundary was reached.
    Generations,
    /// Recomputing the 2D slice for display.
    Heatmap,
    /// Run finished.
    Completed,
    /// Run failed before producing a result.
    Error,
}

/// Progress update streamed to the caller's callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProgress {
    pub phase: SearchPhase,
    /// Overall completion, 0-100.
    pub percent: u8,
    /// Index of the unit just processed (point, individual, generation, row).
    pub index: usize,
    /// What `index` counts (point, individual, generation, row).
    pub unit: String,
    /// Best point found so far, once one exists.
    pub best: Option<BestPoint>,
}

impl SearchProgress {
    pub fn new(phase: SearchPhase, percent: u8, index: usize, unit: &str) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            index,
            unit: unit.to_string(),
            best: None,
        }
    }

    pub fn with_best(mut self, best: Option<BestPoint>) -> Self {
        self.best = best;
        self
    }
}

/// Integer percentage of `done` over `total`, clamped to 0-100.
pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as u8
}

// ============================================================================
// Results
// ============================================================================

/// Brightness over the (x, y) plane at a fixed depth and origin time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    /// Row-major values, `values[iy][ix]`.
    pub values: Vec<Vec<f64>>,
    pub axis_x: Vec<f64>,
    pub axis_y: Vec<f64>,
    /// Depth of the slice.
    pub z: f64,
    /// Origin time of the slice.
    pub t: f64,
}

impl Heatmap {
    /// (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.axis_y.len(), self.axis_x.len())
    }

    /// Brightest cell as (iy, ix, value).
    pub fn peak(&self) -> Option<(usize, usize, f64)> {
        let mut peak: Option<(usize, usize, f64)> = None;
        for (iy, row) in self.values.iter().enumerate() {
            for (ix, &value) in row.iter().enumerate() {
                if peak.is_none_or(|(_, _, v)| value > v) {
                    peak = Some((iy, ix, value));
                }
            }
        }
        peak
    }

    /// Cell whose axis coordinates are closest to (x, y), as (iy, ix).
    pub fn nearest_cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((nearest_index(&self.axis_y, y)?, nearest_index(&self.axis_x, x)?))
    }
}

fn nearest_index(axis: &[f64], value: f64) -> Option<usize> {
    axis.iter()
        .enumerate()
        .min_by(|a, b| (a.1 - value).abs().total_cmp(&(b.1 - value).abs()))
        .map(|(i, _)| i)
}

/// Per-generation history for plotting convergence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHistory {
    /// Global best brightness after each generation.
    pub best_brightness: Vec<f64>,
    /// Mean population brightness per generation.
    pub mean_brightness: Vec<f64>,
    /// Mutation rate in effect when each generation was scored.
    pub mutation_rate: Vec<f64>,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Every grid point was evaluated.
    Exhausted,
    /// All configured generations ran.
    MaxGenerations,
    /// No significant improvement for the configured number of generations.
    Stagnation,
    /// The caller cancelled.
    Cancelled,
}

/// Statistics from a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Strategy name.
    pub algorithm: String,
    /// Brightness evaluations requested (cache hits included).
    pub evaluations: u64,
    /// Generations evaluated (genetic search only).
    pub generations: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Travel times that fell back to the straight-line estimate.
    pub travel_time_fallbacks: u64,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
}

/// Result of a run that finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub best: BestPoint,
    /// 2D slice through the optimum, when requested.
    pub heatmap: Option<Heatmap>,
    pub stats: SearchStats,
    pub history: SearchHistory,
}

/// State of a run the caller stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelledSearch {
    /// Best point found before cancellation.
    pub best: Option<BestPoint>,
    pub stats: SearchStats,
    pub history: SearchHistory,
}

/// Completed or cancelled run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum SearchOutcome {
    Completed(SearchResult),
    Cancelled(CancelledSearch),
}

impl SearchOutcome {
    pub fn best(&self) -> Option<&BestPoint> {
        match self {
            SearchOutcome::Completed(result) => Some(&result.best),
            SearchOutcome::Cancelled(cancelled) => cancelled.best.as_ref(),
        }
    }

    pub fn stats(&self) -> &SearchStats {
        match self {
            SearchOutcome::Completed(result) => &result.stats,
            SearchOutcome::Cancelled(cancelled) => &cancelled.stats,
        }
    }

    pub fn history(&self) -> &SearchHistory {
        match self {
            SearchOutcome::Completed(result) => &result.history,
            SearchOutcome::Cancelled(cancelled) => &cancelled.history,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchOutcome::Cancelled(_))
    }

    /// The finished result, if the run was not cancelled.
    pub fn completed(self) -> Option<SearchResult> {
        match self {
            SearchOutcome::Completed(result) => Some(result),
            SearchOutcome::Cancelled(_) => None,
        }
    }
}

/// Structural failures that abort a run before it produces a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Insufficient data: {0}")]
    EmptyData(#[from] EmptyDataError),
}

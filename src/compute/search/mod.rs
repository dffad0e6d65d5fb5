//! Optimizers that search the space-time domain for the brightest point.
//!
//! Both strategies share the [`BrightnessEvaluator`], the progress protocol
//! and the result types, and differ only in how they choose candidates.

mod genetic;
mod grid;
mod heatmap;
mod population;
mod progress;

pub use genetic::*;
pub use grid::*;
pub use heatmap::*;
pub use population::*;
pub use progress::*;

use std::time::Instant;

use crate::schema::{SearchError, SearchOutcome, SearchStats, StopReason};

use super::brightness::{BrightnessEvaluator, CacheStats};
use super::space::SearchSpace;

/// A search strategy.
pub trait SourceSearch {
    /// Short identifier used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Search `space` for the point of maximal brightness.
    ///
    /// Cancellation through `progress` yields `SearchOutcome::Cancelled`,
    /// never an error.
    fn optimize(
        &mut self,
        evaluator: &BrightnessEvaluator,
        space: &SearchSpace,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<SearchOutcome, SearchError>;
}

/// Wall clock and cache counters captured at the start of a run.
pub(crate) struct RunMeter {
    algorithm: &'static str,
    start: Instant,
    baseline: CacheStats,
}

impl RunMeter {
    pub(crate) fn start(algorithm: &'static str, evaluator: &BrightnessEvaluator) -> Self {
        Self {
            algorithm,
            start: Instant::now(),
            baseline: evaluator.cache_stats(),
        }
    }

    pub(crate) fn stats(
        &self,
        evaluator: &BrightnessEvaluator,
        generations: usize,
        stop_reason: StopReason,
    ) -> SearchStats {
        let now = evaluator.cache_stats();
        let hits = now.hits.saturating_sub(self.baseline.hits);
        let misses = now.misses.saturating_sub(self.baseline.misses);
        SearchStats {
            algorithm: self.algorithm.to_string(),
            evaluations: hits + misses,
            generations,
            cache_hits: hits,
            cache_misses: misses,
            travel_time_fallbacks: now.fallbacks.saturating_sub(self.baseline.fallbacks),
            elapsed_seconds: self.start.elapsed().as_secs_f64(),
            stop_reason,
        }
    }
}

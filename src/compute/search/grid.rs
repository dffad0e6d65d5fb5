//! Exhaustive lattice search.

use crate::compute::brightness::BrightnessEvaluator;
use crate::compute::space::SearchSpace;
use crate::schema::{
    Axis, BestPoint, CancelledSearch, SearchError, SearchHistory, SearchOutcome, SearchPhase,
    SearchProgress, SearchResult, StopReason, percent_of,
};

use super::heatmap::project_heatmap;
use super::progress::ProgressReporter;
use super::{RunMeter, SourceSearch};

/// Minimum number of progress updates over a full grid run.
const PROGRESS_UPDATES: usize = 100;

/// Evaluates every lattice point, x varying fastest, then y, z and t.
///
/// Ties keep the first maximum in enumeration order. The result always
/// carries the (x, y) slice at the optimum's depth and origin time.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

impl GridSearch {
    pub fn new() -> Self {
        Self
    }
}

impl SourceSearch for GridSearch {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn optimize(
        &mut self,
        evaluator: &BrightnessEvaluator,
        space: &SearchSpace,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<SearchOutcome, SearchError> {
        let meter = RunMeter::start(self.name(), evaluator);
        let total = space.total_points();
        let chunk = (total / PROGRESS_UPDATES).max(1);

        let [nx, ny, nz, nt] = space.shape();
        log::info!("Grid search: {nx}x{ny}x{nz}x{nt} = {total} points");

        let cancelled = |best: Option<BestPoint>| {
            SearchOutcome::Cancelled(CancelledSearch {
                best,
                stats: meter.stats(evaluator, 0, StopReason::Cancelled),
                history: SearchHistory::default(),
            })
        };

        if !progress.report(SearchProgress::new(SearchPhase::Init, 0, 0, "point")) {
            return Ok(cancelled(None));
        }

        let mut best: Option<BestPoint> = None;
        let mut start = 0;
        while start < total {
            if progress.is_cancelled() {
                return Ok(cancelled(best));
            }
            let end = (start + chunk).min(total);
            let points: Vec<_> = (start..end).map(|i| space.point_at(i)).collect();
            let values = evaluator.evaluate_batch(&points);

            for (point, value) in points.into_iter().zip(values) {
                if best.is_none_or(|b| value > b.brightness) {
                    best = Some(BestPoint {
                        point,
                        brightness: value,
                    });
                }
            }

            let event = SearchProgress::new(
                SearchPhase::Evaluating,
                percent_of(end, total),
                end,
                "point",
            )
            .with_best(best);
            if !progress.report(event) {
                return Ok(cancelled(best));
            }
            start = end;
        }

        let Some(best) = best else {
            return Ok(cancelled(None));
        };

        let Some(heatmap) = project_heatmap(
            evaluator,
            &best,
            space.axis(Axis::X),
            space.axis(Axis::Y),
            false,
            progress,
        ) else {
            return Ok(cancelled(Some(best)));
        };

        let stats = meter.stats(evaluator, 0, StopReason::Exhausted);
        log::info!(
            "Grid search finished: brightness {:.6} at ({:.2}, {:.2}, {:.2}, {:.4}) in {:.2}s",
            best.brightness,
            best.point.x,
            best.point.y,
            best.point.z,
            best.point.t,
            stats.elapsed_seconds
        );
        progress.report(
            SearchProgress::new(SearchPhase::Completed, 100, total, "point").with_best(Some(best)),
        );

        Ok(SearchOutcome::Completed(SearchResult {
            best,
            heatmap: Some(heatmap),
            stats,
            history: SearchHistory::default(),
        }))
    }
}

//! 2D brightness slice through an optimum.

use crate::compute::brightness::BrightnessEvaluator;
use crate::schema::{BestPoint, Heatmap, Point, SearchPhase, SearchProgress, percent_of};

use super::progress::ProgressReporter;

/// Recompute brightness over the (x, y) lattice at the optimum's depth and
/// origin time, one row per progress event.
///
/// With `mark_best`, the cell nearest the optimum is overwritten with its
/// brightness so the peak is visible even off-lattice. Returns `None` when
/// the run is cancelled part way.
pub fn project_heatmap(
    evaluator: &BrightnessEvaluator,
    best: &BestPoint,
    axis_x: &[f64],
    axis_y: &[f64],
    mark_best: bool,
    progress: &mut ProgressReporter<'_>,
) -> Option<Heatmap> {
    let (z, t) = (best.point.z, best.point.t);
    let mut values = Vec::with_capacity(axis_y.len());

    for (iy, &y) in axis_y.iter().enumerate() {
        if progress.is_cancelled() {
            return None;
        }
        let row: Vec<Point> = axis_x.iter().map(|&x| Point::new(x, y, z, t)).collect();
        values.push(evaluator.evaluate_batch(&row));

        let event = SearchProgress::new(
            SearchPhase::Heatmap,
            percent_of(iy + 1, axis_y.len()),
            iy + 1,
            "row",
        )
        .with_best(Some(*best));
        if !progress.report(event) {
            return None;
        }
    }

    let mut heatmap = Heatmap {
        values,
        axis_x: axis_x.to_vec(),
        axis_y: axis_y.to_vec(),
        z,
        t,
    };
    if mark_best
        && let Some((iy, ix)) = heatmap.nearest_cell(best.point.x, best.point.y)
    {
        heatmap.values[iy][ix] = best.brightness;
    }
    Some(heatmap)
}

//! Event time window estimation from trace onsets.

use crate::schema::{EmptyDataError, Survey, TimeWindow};

use super::trace::{NormalizedTrace, normalize_traces};

/// Share of a trace's energy that marks the onset.
const ONSET_ENERGY_FRACTION: f64 = 0.1;
/// Samples the onset is moved earlier.
const ONSET_LEAD_SAMPLES: usize = 10;
const HISTOGRAM_BINS: usize = 50;

/// First sample at which cumulative energy exceeds a tenth of the total,
/// moved ten samples earlier. `None` for a trace with no energy.
pub fn onset_sample(trace: &NormalizedTrace) -> Option<usize> {
    let total: f64 = trace.samples().iter().map(|v| v * v).sum();
    if !(total > 0.0) {
        return None;
    }
    let threshold = ONSET_ENERGY_FRACTION * total;
    let mut energy = 0.0;
    trace.samples().iter().position(|v| {
        energy += v * v;
        energy > threshold
    })
    .map(|i| i.saturating_sub(ONSET_LEAD_SAMPLES))
}

/// Estimate the event window as the densest bin of a histogram of per-trace
/// onset times.
pub fn estimate_event_window(
    survey: &Survey,
    baseline_samples: usize,
) -> Result<TimeWindow, EmptyDataError> {
    survey.validate()?;
    let traces = normalize_traces(&survey.traces, baseline_samples);

    let onsets: Vec<f64> = survey
        .receivers
        .iter()
        .filter_map(|r| traces.get(r.trace))
        .filter_map(onset_sample)
        .map(|i| i as f64 * survey.sample_interval)
        .collect();

    let (lo, hi) = onsets
        .iter()
        .fold(None, |acc: Option<(f64, f64)>, &t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
        .ok_or(EmptyDataError::NoSignal)?;
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };

    let width = (hi - lo) / HISTOGRAM_BINS as f64;
    let mut counts = [0usize; HISTOGRAM_BINS];
    for t in &onsets {
        let bin = (((t - lo) / width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }

    let densest = counts
        .iter()
        .enumerate()
        .fold(0, |best, (i, &c)| if c > counts[best] { i } else { best });

    let window = TimeWindow::new(
        lo + densest as f64 * width,
        lo + (densest + 1) as f64 * width,
    );
    log::debug!(
        "Estimated event window [{:.4}, {:.4}] s from {} onsets",
        window.start,
        window.end,
        onsets.len()
    );
    Ok(window)
}

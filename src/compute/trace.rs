//! Trace normalization and windowed peak lookup.

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// A channel with its baseline removed and its peak scaled to one.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTrace {
    samples: Vec<f64>,
}

impl NormalizedTrace {
    /// Remove the mean of the first `baseline_samples` samples and divide by
    /// the largest absolute value. A trace that is flat after baseline
    /// removal is left unscaled.
    pub fn from_raw(raw: &[f64], baseline_samples: usize) -> Self {
        let n = baseline_samples.min(raw.len());
        let baseline = if n == 0 {
            0.0
        } else {
            raw[..n].iter().sum::<f64>() / n as f64
        };

        let mut samples: Vec<f64> = raw.iter().map(|v| v - baseline).collect();
        let peak = samples.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        if peak > 0.0 && peak.is_finite() {
            for s in &mut samples {
                *s /= peak;
            }
        }

        Self { samples }
    }

    #[inline]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute amplitude in `[index - half_width, index + half_width]`,
    /// clipped to the trace.
    pub fn local_peak(&self, index: usize, half_width: usize) -> f64 {
        let start = index.saturating_sub(half_width);
        let end = index
            .saturating_add(half_width)
            .saturating_add(1)
            .min(self.samples.len());
        if start >= end {
            return 0.0;
        }
        self.samples[start..end]
            .iter()
            .fold(0.0f64, |m, v| m.max(v.abs()))
    }
}

/// Normalize every channel of a survey.
#[cfg(not(target_arch = "wasm32"))]
pub fn normalize_traces(traces: &[Vec<f64>], baseline_samples: usize) -> Vec<NormalizedTrace> {
    traces
        .par_iter()
        .map(|raw| NormalizedTrace::from_raw(raw, baseline_samples))
        .collect()
}

#[cfg(target_arch = "wasm32")]
pub fn normalize_traces(traces: &[Vec<f64>], baseline_samples: usize) -> Vec<NormalizedTrace> {
    traces
        .iter()
        .map(|raw| NormalizedTrace::from_raw(raw, baseline_samples))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_removed_and_scaled() {
        let mut raw = vec![2.0; 200];
        raw[150] = 6.0;
        raw[160] = 0.0;

        let trace = NormalizedTrace::from_raw(&raw, 100);
        assert!((trace.samples()[0]).abs() < 1e-12);
        assert!((trace.samples()[150] - 1.0).abs() < 1e-12);
        assert!((trace.samples()[160] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_flat_trace_stays_unscaled() {
        let trace = NormalizedTrace::from_raw(&[3.0; 50], 100);
        assert!(trace.samples().iter().all(|&v| v == 0.0));
        assert_eq!(trace.len(), 50);
    }

    #[test]
    fn test_short_trace_uses_available_baseline() {
        let trace = NormalizedTrace::from_raw(&[1.0, 3.0], 100);
        assert_eq!(trace.samples(), &[-1.0, 1.0]);
    }

    #[test]
    fn test_local_peak_clips_to_trace() {
        let mut raw = vec![0.0; 20];
        raw[1] = -4.0;
        raw[19] = 2.0;
        let trace = NormalizedTrace::from_raw(&raw, 1);

        assert_eq!(trace.local_peak(2, 3), 1.0);
        assert_eq!(trace.local_peak(17, 3), 0.5);
        assert_eq!(trace.local_peak(10, 3), 0.0);
        assert_eq!(trace.local_peak(500, 3), 0.0);
    }

    #[test]
    fn test_normalize_traces_preserves_order() {
        let traces = vec![vec![0.0, 1.0], vec![0.0, -2.0], vec![]];
        let normalized = normalize_traces(&traces, 1);
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].samples(), &[0.0, 1.0]);
        assert_eq!(normalized[1].samples(), &[0.0, -1.0]);
        assert!(normalized[2].is_empty());
    }
}

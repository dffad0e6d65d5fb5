//! Survey types: receiver geometry and raw waveform channels.

use serde::{Deserialize, Serialize};

/// A position in survey coordinates (meters, z positive downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Easting in meters.
    pub x: f64,
    /// Northing in meters.
    pub y: f64,
    /// Depth in meters.
    pub z: f64,
}

impl Position {
    /// Position from coordinates in meters.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Straight-line distance to another position.
    #[inline]
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Horizontal (map view) distance to another position.
    #[inline]
    pub fn horizontal_distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// All three coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A receiver (geophone) and the trace it recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receiver {
    /// Index into [`Survey::traces`].
    pub trace: usize,
    /// Receiver location.
    pub position: Position,
}

/// Multi-channel waveform recording with its receiver table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    /// Seconds between consecutive samples.
    pub sample_interval: f64,
    /// Receiver table, one entry per channel used for location.
    pub receivers: Vec<Receiver>,
    /// Raw amplitude samples per channel.
    pub traces: Vec<Vec<f64>>,
}

impl Survey {
    /// Build a survey where receiver `i` recorded trace `i`.
    pub fn from_channels(sample_interval: f64, channels: Vec<(Position, Vec<f64>)>) -> Self {
        let mut receivers = Vec::with_capacity(channels.len());
        let mut traces = Vec::with_capacity(channels.len());
        for (trace, (position, samples)) in channels.into_iter().enumerate() {
            receivers.push(Receiver { trace, position });
            traces.push(samples);
        }
        Self {
            sample_interval,
            receivers,
            traces,
        }
    }

    /// Check the survey holds enough data to locate anything.
    pub fn validate(&self) -> Result<(), EmptyDataError> {
        if !(self.sample_interval > 0.0) || !self.sample_interval.is_finite() {
            return Err(EmptyDataError::InvalidSampleInterval(self.sample_interval));
        }
        if self.receivers.is_empty() {
            return Err(EmptyDataError::NoReceivers);
        }
        for (receiver, r) in self.receivers.iter().enumerate() {
            match self.traces.get(r.trace) {
                None => {
                    return Err(EmptyDataError::MissingTrace {
                        receiver,
                        trace: r.trace,
                    });
                }
                Some(samples) if samples.is_empty() => {
                    return Err(EmptyDataError::EmptyTrace(r.trace));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Bounding box of the receiver array as (min, max) corners.
    pub fn receiver_extent(&self) -> Option<(Position, Position)> {
        let first = self.receivers.first()?.position;
        let extent = self
            .receivers
            .iter()
            .fold((first, first), |(lo, hi), r| {
                let p = r.position;
                (
                    Position::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                    Position::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
                )
            });
        Some(extent)
    }

    /// Longest trace duration in seconds.
    pub fn duration(&self) -> f64 {
        let samples = self.traces.iter().map(Vec::len).max().unwrap_or(0);
        samples as f64 * self.sample_interval
    }
}

/// Errors for inputs that leave nothing to search.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmptyDataError {
    #[error("Survey has no receivers")]
    NoReceivers,
    #[error("Trace {0} has no samples")]
    EmptyTrace(usize),
    #[error("Receiver {receiver} references missing trace {trace}")]
    MissingTrace { receiver: usize, trace: usize },
    #[error("Sample interval must be positive, got {0}")]
    InvalidSampleInterval(f64),
    #[error("Time window [{start}, {end}] has zero length")]
    EmptyTimeWindow { start: f64, end: f64 },
    #[error("No trace carries signal energy")]
    NoSignal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_survey() -> Survey {
        Survey::from_channels(
            0.001,
            vec![
                (Position::new(0.0, 0.0, 0.0), vec![0.0; 10]),
                (Position::new(1000.0, 0.0, 0.0), vec![0.0; 10]),
                (Position::new(0.0, 1000.0, 5.0), vec![0.0; 10]),
            ],
        )
    }

    #[test]
    fn test_validate_ok() {
        assert!(square_survey().validate().is_ok());
    }

    #[test]
    fn test_no_receivers() {
        let survey = Survey::from_channels(0.001, Vec::new());
        assert_eq!(survey.validate(), Err(EmptyDataError::NoReceivers));
    }

    #[test]
    fn test_missing_trace() {
        let mut survey = square_survey();
        survey.receivers[1].trace = 7;
        assert_eq!(
            survey.validate(),
            Err(EmptyDataError::MissingTrace {
                receiver: 1,
                trace: 7
            })
        );
    }

    #[test]
    fn test_bad_sample_interval() {
        let mut survey = square_survey();
        survey.sample_interval = 0.0;
        assert!(matches!(
            survey.validate(),
            Err(EmptyDataError::InvalidSampleInterval(_))
        ));
    }

    #[test]
    fn test_receiver_extent() {
        let (lo, hi) = square_survey().receiver_extent().unwrap();
        assert_eq!(lo, Position::new(0.0, 0.0, 0.0));
        assert_eq!(hi, Position::new(1000.0, 1000.0, 5.0));
    }

    #[test]
    fn test_distance() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 12.0);
        assert!((a.distance(&b) - 13.0).abs() < 1e-12);
        assert!((a.horizontal_distance(&b) - 5.0).abs() < 1e-12);
    }
}

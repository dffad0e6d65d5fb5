//! Synthetic surveys with a known source, for demos, benches and tests.

use rand::prelude::*;
use rand_distr::Normal;

use crate::schema::{Position, Survey};

/// A point source recorded by a receiver array in a homogeneous medium.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSurvey {
    pub receivers: Vec<Position>,
    pub source: Position,
    /// Origin time in seconds.
    pub origin_time: f64,
    /// Straight-ray propagation speed in m/s.
    pub velocity: f64,
    pub sample_interval: f64,
    pub samples: usize,
    /// Standard deviation of additive Gaussian noise; zero for clean traces.
    pub noise: f64,
    pub seed: u64,
}

impl SyntheticSurvey {
    /// Four receivers on the corners of a `side` metre square at the surface,
    /// source below its centre.
    pub fn square(side: f64, depth: f64) -> Self {
        Self {
            receivers: vec![
                Position::new(0.0, 0.0, 0.0),
                Position::new(side, 0.0, 0.0),
                Position::new(0.0, side, 0.0),
                Position::new(side, side, 0.0),
            ],
            source: Position::new(side / 2.0, side / 2.0, depth),
            origin_time: 0.05,
            velocity: 3000.0,
            sample_interval: 0.001,
            samples: 1000,
            noise: 0.0,
            seed: 0,
        }
    }

    /// Receivers on a regular `nx` by `ny` surface grid spaced `spacing` metres.
    pub fn grid_array(nx: usize, ny: usize, spacing: f64, source: Position) -> Self {
        let receivers = (0..ny)
            .flat_map(|iy| {
                (0..nx).map(move |ix| Position::new(ix as f64 * spacing, iy as f64 * spacing, 0.0))
            })
            .collect();
        Self {
            receivers,
            source,
            ..Self::square(spacing, source.z)
        }
    }

    /// Sample index of the pulse at a receiver, if it falls inside the trace.
    pub fn arrival_sample(&self, receiver: &Position) -> Option<usize> {
        let arrival = self.origin_time + self.source.distance(receiver) / self.velocity;
        let index = (arrival / self.sample_interval).round();
        (arrival.is_finite() && index >= 0.0 && (index as usize) < self.samples)
            .then_some(index as usize)
    }

    /// Render one trace per receiver: a unit pulse at the arrival sample plus noise.
    pub fn generate(&self) -> Survey {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = (self.noise > 0.0)
            .then(|| Normal::new(0.0, self.noise).ok())
            .flatten();

        let channels = self
            .receivers
            .iter()
            .map(|receiver| {
                let mut trace: Vec<f64> = match &noise {
                    Some(dist) => (0..self.samples).map(|_| dist.sample(&mut rng)).collect(),
                    None => vec![0.0; self.samples],
                };
                if let Some(index) = self.arrival_sample(receiver) {
                    trace[index] += 1.0;
                }
                (*receiver, trace)
            })
            .collect();

        Survey::from_channels(self.sample_interval, channels)
    }
}

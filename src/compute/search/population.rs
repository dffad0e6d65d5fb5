//! Random operators for the genetic search: seeding, selection, crossover
//! and mutation over candidate points.

use rand::prelude::*;
use rand::seq::index::sample;

use crate::compute::space::{SearchSpace, linspace};
use crate::schema::{Axis, GeneticConfig, Point, Receiver};

/// Candidate in the genetic search population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Individual {
    pub point: Point,
    pub fitness: f64,
}

impl Individual {
    pub fn new(point: Point) -> Self {
        Self {
            point,
            fitness: 0.0,
        }
    }
}

/// Random number generator wrapper for population operations.
pub struct PopulationRng {
    rng: StdRng,
}

impl PopulationRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform value in `[lo, hi]`; `lo` when the interval is empty.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi > lo {
            self.rng.gen_range(lo..=hi)
        } else {
            lo
        }
    }

    /// Uniform index below `len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Uniform point in the bounding box.
    pub fn random_point(&mut self, space: &SearchSpace) -> Point {
        let mut point = Point::default();
        for axis in Axis::ALL {
            let range = space.range(axis);
            point.set(axis, self.uniform(range.min, range.max));
        }
        point
    }

    /// Point drawn from a coarse lattice, one axis value at a time.
    pub fn lattice_point(&mut self, lattice: &[Vec<f64>; 4]) -> Point {
        let mut point = Point::default();
        for axis in Axis::ALL {
            let values = &lattice[axis.index()];
            if !values.is_empty() {
                point.set(axis, values[self.index(values.len())]);
            }
        }
        point
    }

    /// Point jittered around a random receiver by up to `jitter` steps in
    /// x, y and z, with a uniform origin time. Not clamped.
    pub fn receiver_point(
        &mut self,
        space: &SearchSpace,
        receivers: &[Receiver],
        jitter: f64,
    ) -> Point {
        if receivers.is_empty() {
            return self.random_point(space);
        }
        let receiver = receivers[self.index(receivers.len())].position;
        let steps = space.steps();
        let time = space.range(Axis::T);
        Point::new(
            receiver.x + self.uniform(-jitter * steps[0], jitter * steps[0]),
            receiver.y + self.uniform(-jitter * steps[1], jitter * steps[1]),
            receiver.z + self.uniform(-jitter * steps[2], jitter * steps[2]),
            self.uniform(time.min, time.max),
        )
    }

    /// Initial population: random, coarse-lattice and receiver-centred
    /// individuals in the configured proportions, clamped to the space.
    pub fn seed_population(
        &mut self,
        space: &SearchSpace,
        receivers: &[Receiver],
        config: &GeneticConfig,
    ) -> Vec<Individual> {
        let n = config.population_size;
        let seeding = &config.seeding;
        let random_count = ((n as f64 * seeding.random_fraction).floor() as usize).min(n);
        let grid_end = ((n as f64 * (seeding.random_fraction + seeding.grid_fraction)).floor()
            as usize)
            .clamp(random_count, n);

        let lattice: [Vec<f64>; 4] = Axis::ALL.map(|axis| {
            let range = space.range(axis);
            linspace(range.min, range.max, seeding.coarse_grid[axis.index()])
        });

        (0..n)
            .map(|i| {
                let point = if i < random_count {
                    self.random_point(space)
                } else if i < grid_end {
                    self.lattice_point(&lattice)
                } else {
                    self.receiver_point(space, receivers, seeding.receiver_jitter)
                };
                Individual::new(space.clamp(point))
            })
            .collect()
    }

    /// Tournament over `size` distinct individuals; the fittest wins, the
    /// earliest index on ties.
    pub fn tournament(&mut self, fitness: &[f64], size: usize) -> usize {
        let contenders = size.clamp(1, fitness.len().max(1));
        if fitness.is_empty() {
            return 0;
        }
        let mut picks = sample(&mut self.rng, fitness.len(), contenders).into_vec();
        picks.sort_unstable();
        picks
            .into_iter()
            .fold(None, |winner: Option<usize>, idx| match winner {
                Some(w) if fitness[w] >= fitness[idx] => Some(w),
                _ => Some(idx),
            })
            .unwrap_or(0)
    }

    /// Single-point crossover at x|y, y|z or z|t, or a uniform per-axis mix,
    /// with equal probability.
    pub fn crossover(&mut self, a: &Point, b: &Point) -> Point {
        let (a, b) = (a.to_array(), b.to_array());
        let mut child = a;
        if self.rng.gen_bool(0.5) {
            let cut = self.rng.gen_range(1..=3);
            child[cut..].copy_from_slice(&b[cut..]);
        } else {
            for (c, &from_b) in child.iter_mut().zip(&b) {
                if self.rng.gen_bool(0.5) {
                    *c = from_b;
                }
            }
        }
        Point::from_array(child)
    }

    /// Perturb each coordinate with probability `rate` by a uniform offset
    /// in `±scales[d] * shrink`. Not clamped.
    pub fn mutate(&mut self, point: &mut Point, rate: f64, scales: [f64; 4], shrink: f64) {
        for axis in Axis::ALL {
            if self.rng.r#gen::<f64>() < rate {
                let half = scales[axis.index()] * shrink;
                let offset = self.uniform(-half, half);
                point.set(axis, point.get(axis) + offset);
            }
        }
    }

    /// Uniform sample in the box `center ± radii`. Not clamped.
    pub fn perturb(&mut self, center: &Point, radii: [f64; 4]) -> Point {
        let mut point = *center;
        for axis in Axis::ALL {
            let r = radii[axis.index()];
            point.set(axis, center.get(axis) + self.uniform(-r, r));
        }
        point
    }
}

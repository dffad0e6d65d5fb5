//! Four-dimensional search domain.

use crate::schema::{Axis, AxisRange, ConfigError, GridSpec, Point, SearchError, TimeWindow};

/// Validated lattice over x, y, z and origin time.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    ranges: [AxisRange; 4],
    axes: [Vec<f64>; 4],
}

impl SearchSpace {
    /// Combine a spatial grid with an origin-time window.
    pub fn new(grid: &GridSpec, window: TimeWindow) -> Result<Self, SearchError> {
        grid.validate()?;
        window.validate()?;

        let ranges = [
            grid.x,
            grid.y,
            grid.z,
            AxisRange::new(window.start, window.end, grid.time_step),
        ];
        for axis in Axis::ALL {
            ranges[axis.index()].validate(axis)?;
        }
        ranges
            .iter()
            .try_fold(1usize, |total, r| total.checked_mul(r.len()))
            .ok_or(ConfigError::GridTooLarge)?;
        let axes = ranges.map(|r| r.values());
        Ok(Self { ranges, axes })
    }

    /// Bounds and step of `axis`.
    #[inline]
    pub fn range(&self, axis: Axis) -> &AxisRange {
        &self.ranges[axis.index()]
    }

    /// Materialized lattice values along `axis`.
    #[inline]
    pub fn axis(&self, axis: Axis) -> &[f64] {
        &self.axes[axis.index()]
    }

    /// Lattice spacing per axis.
    pub fn steps(&self) -> [f64; 4] {
        self.ranges.map(|r| r.step)
    }

    /// Perturbation scale per axis used by mutation and refinement: the
    /// lattice step, origin time included.
    pub fn perturbation_scales(&self) -> [f64; 4] {
        self.steps()
    }

    /// Corner with every coordinate at its minimum.
    pub fn lower(&self) -> Point {
        Point::from_array(self.ranges.map(|r| r.min))
    }

    /// Corner with every coordinate at its maximum.
    pub fn upper(&self) -> Point {
        Point::from_array(self.ranges.map(|r| r.max))
    }

    /// Clamp every coordinate into the bounding box.
    pub fn clamp(&self, point: Point) -> Point {
        let mut v = point.to_array();
        for (value, range) in v.iter_mut().zip(&self.ranges) {
            *value = range.clamp(*value);
        }
        Point::from_array(v)
    }

    pub fn contains(&self, point: &Point) -> bool {
        point
            .to_array()
            .iter()
            .zip(&self.ranges)
            .all(|(v, r)| *v >= r.min && *v <= r.max)
    }

    /// Lattice size per axis as (x, y, z, t).
    pub fn shape(&self) -> [usize; 4] {
        [0, 1, 2, 3].map(|i| self.axes[i].len())
    }

    /// Number of lattice points; fits in `usize` by construction.
    pub fn total_points(&self) -> usize {
        self.shape().iter().product()
    }

    /// Lattice point at a flat index, x varying fastest, then y, z and t.
    pub fn point_at(&self, index: usize) -> Point {
        let [nx, ny, nz, _] = self.shape();
        let ix = index % nx;
        let iy = (index / nx) % ny;
        let iz = (index / (nx * ny)) % nz;
        let it = index / (nx * ny * nz);
        Point::new(
            self.axes[0][ix],
            self.axes[1][iy],
            self.axes[2][iz],
            self.axes[3][it],
        )
    }
}

/// `count` evenly spaced values over `[min, max]`, both ends included.
pub fn linspace(min: f64, max: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (count - 1) as f64;
            (0..count).map(|i| min + i as f64 * step).collect()
        }
    }
}

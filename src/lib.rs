//! Seismic Locate - Brightness-stacking source location for microseismic surveys.
//!
//! This crate locates a seismic source by searching the space-time domain
//! `(x, y, z, t)` for the point where predicted arrivals line up with the
//! largest normalized amplitudes across a receiver array.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Survey data, configuration and result types
//! - `compute`: Travel times, brightness evaluation and the grid and genetic searches
//!
//! # Example
//!
//! ```rust,no_run
//! use seismic_locate::{
//!     compute::{SyntheticSurvey, run_grid_search},
//!     schema::{LocateConfig, TimeWindow},
//! };
//!
//! let survey = SyntheticSurvey::square(1000.0, 1000.0).generate();
//! let config = LocateConfig::default();
//! let grid = config.grid_for(&survey).unwrap();
//!
//! let outcome = run_grid_search(&survey, TimeWindow::new(0.0, 0.1), &grid, &config, |event| {
//!     println!("{:?} {}%", event.phase, event.percent);
//!     true
//! })
//! .unwrap();
//!
//! if let Some(best) = outcome.best() {
//!     println!("Brightest point {:?} ({:.3})", best.point, best.brightness);
//! }
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{BrightnessEvaluator, run_genetic_search, run_grid_search};
pub use schema::{LocateConfig, SearchOutcome, SearchProgress, Survey};

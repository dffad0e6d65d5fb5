//! Schema module - Survey, configuration and result types for event location.

mod config;
mod search;
mod survey;

pub use config::*;
pub use search::*;
pub use survey::*;

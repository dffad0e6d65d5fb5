//! Compute module - Travel times, brightness stacking and source search.

mod brightness;
mod locate;
mod space;
mod synthetic;
mod trace;
mod travel_time;
mod window;

pub mod search;

pub use brightness::*;
pub use locate::*;
pub use space::*;
pub use synthetic::*;
pub use trace::*;
pub use travel_time::*;
pub use window::*;

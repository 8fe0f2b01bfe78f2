//! Schema module - Configuration types for grid-archive search.

mod config;
mod schedule;

pub use config::*;
pub use schedule::*;

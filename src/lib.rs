//! Grid Elites - MAP-Elites style quality-diversity search over a 2-D grid archive.
//!
//! This crate keeps one elite per behavior cell and improves the archive with
//! an annealed Gaussian emitter. Elite search adds a local-competition parent
//! selection and periodic elite reinjection on top of the plain loop.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration types and the reinjection schedule
//! - `search`: Archive, parent selection, emitters and the optimization loop
//!
//! # Example
//!
//! ```rust,no_run
//! use grid_elites::{
//!     schema::{SearchConfig, SearchMode},
//!     search::{BenchmarkEvaluator, GridArchive, OptimizationLoop},
//! };
//!
//! let config = SearchConfig::default();
//! let mode = SearchMode::EliteSearch;
//! let mut evaluator = BenchmarkEvaluator::rastrigin(&config, mode);
//!
//! let mut engine = OptimizationLoop::new(config.clone());
//! let mut archive = GridArchive::new(config.solution.dimension(), config.grid_for(mode));
//! engine
//!     .initialize_archive(&mut archive, 1024, &mut evaluator)
//!     .unwrap();
//!
//! let result = engine.run(mode, archive, None, &mut evaluator).unwrap();
//! println!("Coverage: {:.1}%", result.stats.archive.coverage * 100.0);
//! ```

pub mod schema;
pub mod search;

// Re-export commonly used types
pub use schema::{ConfigError, GridConfig, SearchConfig, SearchMode};
pub use search::{
    Archive, GridArchive, OptimizationLoop, SearchError, SearchResult, SearchStats,
};

//! Quality-diversity search over a grid archive.
//!
//! # Overview
//!
//! - **Archive** (`archive`): 2-D behavior grid holding one elite per cell
//! - **Parent Selection** (`selection`): uniform sampling or local competition
//! - **Emitter** (`emitter`): bound-scaled Gaussian perturbation of parents
//! - **Scheduler** (`scheduler`): couples emitters to a target archive
//! - **Evaluators** (`evaluator`): the pluggable objective/behavior interface
//! - **Optimization Loop** (`engine`): annealed main loop with reinjection bursts
//!
//! # Example
//!
//! ```rust,no_run
//! use grid_elites::schema::{SearchConfig, SearchMode};
//! use grid_elites::search::{BenchmarkEvaluator, GridArchive, OptimizationLoop};
//!
//! let config = SearchConfig::default();
//! let mut evaluator = BenchmarkEvaluator::rastrigin(&config, SearchMode::EliteSearch);
//! let mut engine = OptimizationLoop::new(config.clone());
//!
//! let mut archive = GridArchive::new(config.solution.dimension(), config.archives.acquisition);
//! engine.initialize_archive(&mut archive, 256, &mut evaluator).unwrap();
//!
//! let result = engine
//!     .run(SearchMode::EliteSearch, archive, None, &mut evaluator)
//!     .unwrap();
//! println!("QD score: {:.3}", result.stats.archive.qd_score);
//! ```

mod archive;
mod emitter;
mod engine;
mod evaluator;
mod rng;
mod scheduler;
mod selection;

pub use archive::{AddSummary, Archive, ArchiveStats, Elite, EliteRow, GridArchive};
pub use emitter::{CandidateGenerator, GaussianEmitter};
pub use engine::{OptimizationLoop, SearchPhase, SearchProgress, SearchResult, SearchStats};
pub use evaluator::{
    Benchmark, BenchmarkEvaluator, Evaluation, EvaluationContext, Evaluator,
};
pub use rng::SeedSequence;
pub use scheduler::Scheduler;
pub use selection::{
    LocalCompetition, ParentSelection, UniformSelection, relative_improvement_scores,
};

use crate::schema::ConfigError;

/// A bounded real-valued solution vector.
pub type Solution = Vec<f64>;

/// A 2-D behavior descriptor.
pub type Behavior = [f64; 2];

/// Errors raised by the search engine. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Archive has no elites to select from")]
    EmptyArchive,
    #[error("Local competition needs {required} scored elites but only {available} have neighbors")]
    SelectionShortfall { required: usize, available: usize },
    #[error("{what} has length {actual}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Evaluator failed: {0}")]
    Evaluator(String),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Fail with `ShapeMismatch` unless `actual == expected`.
pub(crate) fn check_len(
    what: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), SearchError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SearchError::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}

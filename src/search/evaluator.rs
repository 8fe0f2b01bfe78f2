//! Evaluator interface and analytic benchmark evaluators.

use serde::{Deserialize, Serialize};

use crate::schema::{SearchConfig, SearchMode, SolutionSpace};

use super::{Behavior, SearchError, Solution, check_len};

/// Context handed to the evaluator with every batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationContext {
    /// Mode of the running search.
    pub mode: SearchMode,
    /// Annealed mutation strength of the current iteration or reinjection pass.
    pub mutation_strength: f64,
    /// Set for reinjection passes and elite-search iterations.
    pub niche_restricted: bool,
}

/// Result of evaluating one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub objectives: Vec<f64>,
    pub behaviors: Vec<Behavior>,
    /// Solutions to archive in place of the submitted ones, e.g. when the
    /// evaluator refines candidates against a model.
    pub solutions: Option<Vec<Solution>>,
}

impl Evaluation {
    pub fn new(objectives: Vec<f64>, behaviors: Vec<Behavior>) -> Self {
        Self {
            objectives,
            behaviors,
            solutions: None,
        }
    }

    /// Replace the archived solutions.
    pub fn with_solutions(mut self, solutions: Vec<Solution>) -> Self {
        self.solutions = Some(solutions);
        self
    }

    /// Check every batch matches the number of submitted solutions.
    pub(crate) fn check(&self, submitted: usize) -> Result<(), SearchError> {
        check_len("objective batch", submitted, self.objectives.len())?;
        check_len("behavior batch", submitted, self.behaviors.len())?;
        if let Some(solutions) = &self.solutions {
            check_len("substituted solution batch", submitted, solutions.len())?;
        }
        Ok(())
    }
}

/// Maps a batch of solutions to objectives and behaviors.
///
/// Must be a pure function of its inputs for runs to be reproducible.
pub trait Evaluator {
    fn evaluate(
        &mut self,
        solutions: &[Solution],
        context: &EvaluationContext,
    ) -> Result<Evaluation, SearchError>;
}

impl<F> Evaluator for F
where
    F: FnMut(&[Solution], &EvaluationContext) -> Result<Evaluation, SearchError>,
{
    fn evaluate(
        &mut self,
        solutions: &[Solution],
        context: &EvaluationContext,
    ) -> Result<Evaluation, SearchError> {
        self(solutions, context)
    }
}

/// Analytic test functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Benchmark {
    Sphere,
    Rastrigin,
    Rosenbrock,
}

impl Benchmark {
    /// Native domain half-width; solutions are rescaled into `[-w, w]`.
    fn half_width(&self) -> f64 {
        match self {
            Self::Sphere | Self::Rastrigin => 5.12,
            Self::Rosenbrock => 2.048,
        }
    }

    /// Raw function value (lower is better, minimum 0).
    fn raw(&self, x: &[f64]) -> f64 {
        match self {
            Self::Sphere => x.iter().map(|v| v * v).sum(),
            Self::Rastrigin => {
                10.0 * x.len() as f64
                    + x.iter()
                        .map(|v| v * v - 10.0 * (2.0 * std::f64::consts::PI * v).cos())
                        .sum::<f64>()
            }
            Self::Rosenbrock => x
                .windows(2)
                .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
                .sum(),
        }
    }

    /// Upper bound of `raw` over the domain for `dim` components.
    fn raw_bound(&self, dim: usize) -> f64 {
        let w = self.half_width();
        match self {
            Self::Sphere => dim as f64 * w * w,
            Self::Rastrigin => dim as f64 * (w * w + 20.0),
            Self::Rosenbrock => {
                let pair = 100.0 * (w + w * w).powi(2) + (1.0 + w).powi(2);
                dim.saturating_sub(1) as f64 * pair
            }
        }
    }
}

/// Benchmark objective in `[0, 100]` (higher is better) with behavior read
/// from two solution components.
#[derive(Debug, Clone)]
pub struct BenchmarkEvaluator {
    benchmark: Benchmark,
    lower: Vec<f64>,
    upper: Vec<f64>,
    descriptor: (usize, usize),
    ranges: [(f64, f64); 2],
    evaluations: usize,
}

impl BenchmarkEvaluator {
    /// Behavior from components 1 and 2 when the space has them.
    pub fn new(benchmark: Benchmark, space: &SolutionSpace, ranges: [(f64, f64); 2]) -> Self {
        let last = space.dimension().saturating_sub(1);
        Self {
            benchmark,
            lower: space.lower(),
            upper: space.upper(),
            descriptor: (1.min(last), 2.min(last)),
            ranges,
            evaluations: 0,
        }
    }

    /// Rastrigin over the configured solution space, with behavior mapped
    /// into the ranges of the archive `mode` optimizes.
    pub fn rastrigin(config: &SearchConfig, mode: SearchMode) -> Self {
        Self::new(
            Benchmark::Rastrigin,
            &config.solution,
            config.grid_for(mode).ranges,
        )
    }

    /// Read behavior from other solution components.
    pub fn with_descriptor(mut self, first: usize, second: usize) -> Self {
        let last = self.lower.len().saturating_sub(1);
        self.descriptor = (first.min(last), second.min(last));
        self
    }

    /// Solutions evaluated so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn objective(&self, solution: &[f64]) -> f64 {
        let w = self.benchmark.half_width();
        let x: Vec<f64> = solution
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&lo, &hi))| -w + 2.0 * w * normalize(v, lo, hi))
            .collect();

        let bound = self.benchmark.raw_bound(x.len());
        if bound <= 0.0 {
            return 100.0;
        }
        100.0 * (1.0 - self.benchmark.raw(&x) / bound).clamp(0.0, 1.0)
    }

    fn behavior(&self, solution: &[f64]) -> Behavior {
        let component = |axis: usize, d: usize| {
            let (lo, hi) = self.ranges[axis];
            lo + (hi - lo) * normalize(solution[d], self.lower[d], self.upper[d])
        };
        [
            component(0, self.descriptor.0),
            component(1, self.descriptor.1),
        ]
    }
}

fn normalize(value: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        (value - lo) / (hi - lo)
    } else {
        0.5
    }
}

impl Evaluator for BenchmarkEvaluator {
    fn evaluate(
        &mut self,
        solutions: &[Solution],
        _context: &EvaluationContext,
    ) -> Result<Evaluation, SearchError> {
        for solution in solutions {
            check_len("solution", self.lower.len(), solution.len())?;
        }
        self.evaluations += solutions.len();

        Ok(Evaluation::new(
            solutions.iter().map(|s| self.objective(s)).collect(),
            solutions.iter().map(|s| self.behavior(s)).collect(),
        ))
    }
}

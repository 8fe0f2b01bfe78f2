//! Optimization loop: annealed MAP-Elites iterations with elite reinjection.

use std::time::Instant;

use serde::Serialize;

use crate::schema::{ConfigError, SearchConfig, SearchMode};

use super::rng::{SeedSequence, gaussian_perturb, uniform_solution};
use super::{
    AddSummary, Archive, ArchiveStats, Behavior, EvaluationContext, Evaluator, GaussianEmitter,
    GridArchive, Scheduler, SearchError, Solution, check_len,
};

/// Stage of a run reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Seed-phase reinjection finished.
    Seeding,
    /// One main-loop iteration finished.
    Iterating,
    /// A checkpoint reinjection burst finished.
    Reinjection,
    /// Final refinement passes finished.
    Refinement,
    /// Run complete.
    Finished,
}

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, Copy)]
pub struct SearchProgress<'a> {
    pub phase: SearchPhase,
    pub iteration: usize,
    pub total_iterations: usize,
    pub remaining_evals: usize,
    /// Emitter sigma of the latest iteration.
    pub sigma_emitter: f64,
    pub archive: &'a GridArchive,
}

/// Run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchStats {
    /// Main-loop iterations.
    pub iterations: usize,
    /// Candidates evaluated by the main loop.
    pub evaluations: usize,
    /// Solutions evaluated by reinjection passes.
    pub reinjection_evaluations: usize,
    /// Reinjection passes, seed phase and final refinement included.
    pub reinjection_passes: usize,
    /// Target archive at the end of the run.
    pub archive: ArchiveStats,
    pub elapsed_seconds: f64,
}

/// Final archive and statistics of a run.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub archive: GridArchive,
    pub stats: SearchStats,
}

/// Drives seed phase, main loop, reinjection bursts and final refinement.
pub struct OptimizationLoop {
    config: SearchConfig,
    seeds: SeedSequence,
    reinjection_passes: usize,
    reinjection_evaluations: usize,
}

impl OptimizationLoop {
    /// Create a loop; the seed sequence starts from `config.random_seed`.
    pub fn new(config: SearchConfig) -> Self {
        let seeds = match config.random_seed {
            Some(seed) => SeedSequence::new(seed),
            None => SeedSequence::random(),
        };

        Self {
            config,
            seeds,
            reinjection_passes: 0,
            reinjection_evaluations: 0,
        }
    }

    /// Search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Fill an archive with `samples` uniform random solutions, evaluated once.
    pub fn initialize_archive(
        &mut self,
        archive: &mut GridArchive,
        samples: usize,
        evaluator: &mut dyn Evaluator,
    ) -> Result<AddSummary, SearchError> {
        let lower = self.config.solution.lower();
        let upper = self.config.solution.upper();
        let mut rng = self.seeds.next_rng();
        let solutions: Vec<Solution> = (0..samples)
            .map(|_| uniform_solution(&mut rng, &lower, &upper))
            .collect();

        let context = EvaluationContext {
            mode: SearchMode::Exploration,
            mutation_strength: self.config.emitter.sigma_mutants,
            niche_restricted: false,
        };
        let evaluation = evaluator.evaluate(&solutions, &context)?;
        evaluation.check(solutions.len())?;
        let summary = archive.add(
            evaluation.solutions.as_deref().unwrap_or(&solutions),
            &evaluation.objectives,
            &evaluation.behaviors,
        )?;

        log::info!(
            "Initialized archive with {} samples: {} cells filled",
            samples,
            archive.len()
        );
        Ok(summary)
    }

    /// Re-score `elites` in their own cells, then insert one perturbed copy of each.
    ///
    /// Perturbation noise is `strength * (upper - lower)` per component, clipped
    /// into bounds. Every insertion goes through the replace-if-better rule.
    pub fn reinject(
        &mut self,
        archive: &mut GridArchive,
        elites: &[Solution],
        behaviors: &[Behavior],
        strength: f64,
        mode: SearchMode,
        evaluator: &mut dyn Evaluator,
    ) -> Result<AddSummary, SearchError> {
        check_len("behavior batch", elites.len(), behaviors.len())?;
        if elites.is_empty() {
            return Ok(AddSummary::default());
        }

        let context = EvaluationContext {
            mode,
            mutation_strength: strength,
            niche_restricted: true,
        };

        let rescored = evaluator.evaluate(elites, &context)?;
        rescored.check(elites.len())?;
        let mut summary = archive.add(
            rescored.solutions.as_deref().unwrap_or(elites),
            &rescored.objectives,
            behaviors,
        )?;

        let lower = self.config.solution.lower();
        let upper = self.config.solution.upper();
        let sigma = vec![strength; lower.len()];
        let mut rng = self.seeds.next_rng();
        let mutants: Vec<Solution> = elites
            .iter()
            .map(|elite| gaussian_perturb(&mut rng, elite, &sigma, &lower, &upper))
            .collect();

        let evaluation = evaluator.evaluate(&mutants, &context)?;
        evaluation.check(mutants.len())?;
        summary += archive.add(
            evaluation.solutions.as_deref().unwrap_or(&mutants),
            &evaluation.objectives,
            &evaluation.behaviors,
        )?;

        self.reinjection_passes += 1;
        self.reinjection_evaluations += elites.len() + mutants.len();
        Ok(summary)
    }

    /// Reinject the archive's current elites into itself.
    fn reinject_own(
        &mut self,
        archive: &mut GridArchive,
        strength: f64,
        mode: SearchMode,
        evaluator: &mut dyn Evaluator,
    ) -> Result<AddSummary, SearchError> {
        let before = archive.stats().qd_score;
        let (elites, behaviors) = archive.elite_batch();
        let summary = self.reinject(archive, &elites, &behaviors, strength, mode, evaluator)?;
        log::debug!(
            "Reinjection at strength {:.3}: QD score {:.3} -> {:.3} ({} inserted)",
            strength,
            before,
            archive.stats().qd_score,
            summary.inserted()
        );
        Ok(summary)
    }

    /// Run the search without progress reporting.
    pub fn run(
        &mut self,
        mode: SearchMode,
        target: GridArchive,
        companion: Option<&GridArchive>,
        evaluator: &mut dyn Evaluator,
    ) -> Result<SearchResult, SearchError> {
        self.run_with_callback(mode, target, companion, evaluator, |_| {})
    }

    /// Run the search, reporting after seeding, every iteration, every
    /// reinjection burst and the final refinement.
    pub fn run_with_callback<F>(
        &mut self,
        mode: SearchMode,
        mut target: GridArchive,
        companion: Option<&GridArchive>,
        evaluator: &mut dyn Evaluator,
        mut callback: F,
    ) -> Result<SearchResult, SearchError>
    where
        F: FnMut(&SearchProgress),
    {
        let start_time = Instant::now();
        let config = self.config.clone();
        config.validate()?;
        check_len(
            "archive solution dimension",
            config.solution.dimension(),
            target.solution_dim(),
        )?;

        let total = config.evaluation_budget(mode);
        let batch_size = config.emitter.batch_size;
        if total < batch_size {
            return Err(ConfigError::BudgetTooSmall {
                budget: total,
                batch_size,
            }
            .into());
        }
        let total_iterations = total / batch_size;
        let schedule = &config.reinjection.schedule;
        let seed_strength = config.reinjection.seed_strength;

        self.reinjection_passes = 0;
        self.reinjection_evaluations = 0;

        log::info!(
            "Starting {:?} search: {} evaluations in {} iterations of {}",
            mode,
            total,
            total_iterations,
            batch_size
        );

        // Seed phase
        if config.reinjection.rebuild_on_seed {
            let (elites, behaviors) = target.elite_batch();
            target.clear();
            self.reinject(&mut target, &elites, &behaviors, seed_strength, mode, evaluator)?;
        }
        if let Some(companion) = companion {
            let (elites, behaviors) = companion.elite_batch();
            self.reinject(
                &mut target,
                &elites,
                &behaviors,
                config.emitter.sigma_mutants,
                mode,
                evaluator,
            )?;
        }
        if mode.reinjects() {
            self.reinject_own(&mut target, seed_strength, mode, evaluator)?;
        }
        callback(&SearchProgress {
            phase: SearchPhase::Seeding,
            iteration: 0,
            total_iterations,
            remaining_evals: total,
            sigma_emitter: config.emitter.annealed_sigma_emitter(total, total),
            archive: &target,
        });

        // Main loop
        let mut remaining = total;
        let mut iteration = 0;
        let mut evaluations = 0;
        let report_every = (total_iterations / 10).max(1);

        while remaining >= batch_size {
            let sigma_emitter = config.emitter.annealed_sigma_emitter(remaining, total);
            let sigma_mutants = config.emitter.annealed_sigma_mutants(remaining, total);

            let candidates = {
                let emitter = GaussianEmitter::for_mode(
                    &target,
                    &config,
                    mode,
                    sigma_emitter,
                    self.seeds.next_seed(),
                )?;
                let mut scheduler = Scheduler::new(vec![Box::new(emitter)]);
                scheduler.ask()?
            };

            let context = EvaluationContext {
                mode,
                mutation_strength: sigma_mutants,
                niche_restricted: true,
            };
            let evaluation = evaluator.evaluate(&candidates, &context)?;
            evaluation.check(candidates.len())?;
            target.add(
                evaluation.solutions.as_deref().unwrap_or(&candidates),
                &evaluation.objectives,
                &evaluation.behaviors,
            )?;
            evaluations += candidates.len();
            iteration += 1;

            if mode.reinjects() {
                let passes = schedule.burst_at(remaining, total, batch_size);
                if !passes.is_empty() {
                    log::debug!("Reinjection burst at {remaining} remaining: {passes:?}");
                    for strength in passes {
                        self.reinject_own(&mut target, strength, mode, evaluator)?;
                    }
                    callback(&SearchProgress {
                        phase: SearchPhase::Reinjection,
                        iteration,
                        total_iterations,
                        remaining_evals: remaining,
                        sigma_emitter,
                        archive: &target,
                    });
                }
            }

            remaining -= batch_size;

            if iteration % report_every == 0 {
                let stats = target.stats();
                log::info!(
                    "Iteration {}/{}: {} elites, QD score {:.3}, sigma {:.3}",
                    iteration,
                    total_iterations,
                    stats.num_elites,
                    stats.qd_score,
                    sigma_emitter
                );
            }
            callback(&SearchProgress {
                phase: SearchPhase::Iterating,
                iteration,
                total_iterations,
                remaining_evals: remaining,
                sigma_emitter,
                archive: &target,
            });
        }

        // Final refinement
        if mode.reinjects() {
            for strength in schedule.final_passes() {
                self.reinject_own(&mut target, strength, mode, evaluator)?;
            }
            callback(&SearchProgress {
                phase: SearchPhase::Refinement,
                iteration,
                total_iterations,
                remaining_evals: remaining,
                sigma_emitter: config.emitter.sigma_emitter,
                archive: &target,
            });
        }

        let stats = SearchStats {
            iterations: iteration,
            evaluations,
            reinjection_evaluations: self.reinjection_evaluations,
            reinjection_passes: self.reinjection_passes,
            archive: target.stats(),
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        };
        callback(&SearchProgress {
            phase: SearchPhase::Finished,
            iteration,
            total_iterations,
            remaining_evals: remaining,
            sigma_emitter: config.emitter.sigma_emitter,
            archive: &target,
        });

        log::info!(
            "Finished {:?} search: {} elites, QD score {:.3}, {} reinjection passes in {:.2}s",
            mode,
            stats.archive.num_elites,
            stats.archive.qd_score,
            stats.reinjection_passes,
            stats.elapsed_seconds
        );

        Ok(SearchResult {
            archive: target,
            stats,
        })
    }
}

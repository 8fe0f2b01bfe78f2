//! Parent selection strategies for emitters.

use rand::rngs::StdRng;
use rand::seq::index;
use rayon::prelude::*;

use super::{Archive, Elite, SearchError, Solution};

/// Chooses the parents an emitter perturbs.
pub trait ParentSelection: Send + Sync {
    /// Select exactly `batch_size` parent solutions.
    fn select(
        &self,
        archive: &dyn Archive,
        batch_size: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Solution>, SearchError>;
}

/// Parents drawn uniformly, with replacement, from all elites.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSelection;

impl ParentSelection for UniformSelection {
    fn select(
        &self,
        archive: &dyn Archive,
        batch_size: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Solution>, SearchError> {
        Ok(archive
            .sample_elites(batch_size, rng)?
            .into_iter()
            .map(|e| e.solution.clone())
            .collect())
    }
}

/// Parents ranked by how much they outperform their grid neighbors.
#[derive(Debug, Clone, Copy)]
pub struct LocalCompetition {
    /// Fraction of scored elites retained before sampling.
    pub retain_fraction: f64,
}

impl Default for LocalCompetition {
    fn default() -> Self {
        Self {
            retain_fraction: 0.65,
        }
    }
}

impl LocalCompetition {
    pub fn new(retain_fraction: f64) -> Self {
        Self { retain_fraction }
    }

    /// Ranked pool the parents are sampled from.
    ///
    /// The ranking is cut to `batch_size` before the retention cut, so the
    /// retention fraction never shrinks the pool below one batch and never
    /// grows it beyond one either: the pool is always the top `batch_size`.
    pub fn candidate_pool<'a>(
        &self,
        archive: &'a dyn Archive,
        batch_size: usize,
    ) -> Result<Vec<&'a Elite>, SearchError> {
        let elites = archive.elites();
        if elites.is_empty() {
            return Err(SearchError::EmptyArchive);
        }

        let scores = relative_improvement_scores(archive);
        let mut scored: Vec<(&Elite, f64)> = elites
            .into_iter()
            .zip(scores)
            .filter_map(|(elite, score)| score.map(|s| (elite, s)))
            .collect();

        if scored.len() < batch_size {
            return Err(SearchError::SelectionShortfall {
                required: batch_size,
                available: scored.len(),
            });
        }

        // Stable: ties keep cell order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let retained =
            batch_size.max((self.retain_fraction * scored.len() as f64).round() as usize);
        scored.truncate(batch_size);
        scored.truncate(retained);

        Ok(scored.into_iter().map(|(elite, _)| elite).collect())
    }
}

impl ParentSelection for LocalCompetition {
    fn select(
        &self,
        archive: &dyn Archive,
        batch_size: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Solution>, SearchError> {
        let pool = self.candidate_pool(archive, batch_size)?;
        Ok(index::sample(rng, pool.len(), batch_size)
            .into_iter()
            .map(|i| pool[i].solution.clone())
            .collect())
    }
}

/// Mean ratio of each elite's objective to each filled Moore neighbor's objective.
///
/// Aligned with `archive.elites()`. `None` when an elite has no filled
/// neighbor or the mean is NaN.
pub fn relative_improvement_scores(archive: &dyn Archive) -> Vec<Option<f64>> {
    archive
        .elites()
        .par_iter()
        .map(|elite| {
            let ratios: Vec<f64> = archive
                .neighbors(elite.index)
                .into_iter()
                .filter_map(|j| archive.elite(j))
                .map(|neighbor| elite.objective / neighbor.objective)
                .collect();

            if ratios.is_empty() {
                return None;
            }
            let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
            (!mean.is_nan()).then_some(mean)
        })
        .collect()
}

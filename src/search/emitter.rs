//! Gaussian emitter: perturbs archive elites with bound-scaled noise.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::schema::{SearchConfig, SearchMode};

use super::rng::gaussian_perturb;
use super::{
    Archive, LocalCompetition, ParentSelection, SearchError, Solution, UniformSelection,
    check_len,
};

/// Produces batches of candidate solutions.
pub trait CandidateGenerator {
    /// Candidates returned per `ask`.
    fn batch_size(&self) -> usize;

    /// Generate one batch of candidates.
    fn ask(&mut self) -> Result<Vec<Solution>, SearchError>;
}

/// Emitter adding clipped Gaussian noise to selected parents.
///
/// Noise on component `d` has standard deviation `|sigma_d * (upper_d - lower_d)|`.
pub struct GaussianEmitter<'a> {
    archive: &'a dyn Archive,
    sigma: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    batch_size: usize,
    selection: Box<dyn ParentSelection>,
    rng: StdRng,
}

impl<'a> GaussianEmitter<'a> {
    /// Create an emitter over a non-empty archive.
    pub fn new(
        archive: &'a dyn Archive,
        sigma: Vec<f64>,
        bounds: (Vec<f64>, Vec<f64>),
        batch_size: usize,
        selection: Box<dyn ParentSelection>,
        seed: u64,
    ) -> Result<Self, SearchError> {
        if archive.is_empty() {
            return Err(SearchError::EmptyArchive);
        }
        let (lower, upper) = bounds;
        let dim = archive.solution_dim();
        check_len("sigma", dim, sigma.len())?;
        check_len("lower bounds", dim, lower.len())?;
        check_len("upper bounds", dim, upper.len())?;

        Ok(Self {
            archive,
            sigma,
            lower,
            upper,
            batch_size,
            selection,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Emitter for `mode` with a uniform scalar sigma, parent selection picked by the mode.
    pub fn for_mode(
        archive: &'a dyn Archive,
        config: &SearchConfig,
        mode: SearchMode,
        sigma: f64,
        seed: u64,
    ) -> Result<Self, SearchError> {
        let selection: Box<dyn ParentSelection> = if mode.uses_local_competition() {
            Box::new(LocalCompetition::new(config.emitter.retain_fraction))
        } else {
            Box::new(UniformSelection)
        };

        Self::new(
            archive,
            vec![sigma; config.solution.dimension()],
            (config.solution.lower(), config.solution.upper()),
            config.emitter.batch_size,
            selection,
            seed,
        )
    }
}

impl CandidateGenerator for GaussianEmitter<'_> {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn ask(&mut self) -> Result<Vec<Solution>, SearchError> {
        let parents = self
            .selection
            .select(self.archive, self.batch_size, &mut self.rng)?;

        Ok(parents
            .iter()
            .map(|parent| {
                gaussian_perturb(&mut self.rng, parent, &self.sigma, &self.lower, &self.upper)
            })
            .collect())
    }
}

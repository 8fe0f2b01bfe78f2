//! Configuration types for grid-archive quality-diversity search.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ReinjectionSchedule;

/// Top-level search configuration.
///
/// Passed explicitly into the archive, emitter and loop constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Solution space (dimensionality and per-dimension bounds).
    pub solution: SolutionSpace,
    /// Grid layouts for the objective, acquisition and prediction archives.
    pub archives: ArchiveLayout,
    /// Emitter noise scales and batch size.
    pub emitter: EmitterConfig,
    /// Evaluation budgets per phase.
    pub budget: BudgetConfig,
    /// Reinjection settings.
    #[serde(default)]
    pub reinjection: ReinjectionConfig,
    /// Master random seed. `None` draws one from entropy.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            solution: SolutionSpace::default(),
            archives: ArchiveLayout::default(),
            emitter: EmitterConfig::default(),
            budget: BudgetConfig::default(),
            reinjection: ReinjectionConfig::default(),
            random_seed: None,
        }
    }
}

/// Bounded real-vector solution space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionSpace {
    /// `(lower, upper)` bound for every solution component.
    pub bounds: Vec<(f64, f64)>,
}

impl Default for SolutionSpace {
    fn default() -> Self {
        Self {
            bounds: vec![(0.0, 1.0); 10],
        }
    }
}

impl SolutionSpace {
    /// Uniform bounds for every dimension.
    pub fn uniform(dimension: usize, lower: f64, upper: f64) -> Self {
        Self {
            bounds: vec![(lower, upper); dimension],
        }
    }

    /// Solution dimensionality.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.bounds.len()
    }

    /// Lower bound vector.
    pub fn lower(&self) -> Vec<f64> {
        self.bounds.iter().map(|b| b.0).collect()
    }

    /// Upper bound vector.
    pub fn upper(&self) -> Vec<f64> {
        self.bounds.iter().map(|b| b.1).collect()
    }
}

/// Grid shape and behavior-space ranges for one archive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// `(rows, cols)`. Behavior component 0 is binned over rows, 1 over columns.
    pub dims: (usize, usize),
    /// `[(lo0, hi0), (lo1, hi1)]`.
    #[serde(default = "default_behavior_ranges")]
    pub ranges: [(f64, f64); 2],
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            dims: (25, 25),
            ranges: default_behavior_ranges(),
        }
    }
}

impl GridConfig {
    /// Square grid over the unit behavior square.
    pub fn square(bins: usize) -> Self {
        Self {
            dims: (bins, bins),
            ranges: default_behavior_ranges(),
        }
    }

    /// Total number of cells.
    #[inline]
    pub fn cells(&self) -> usize {
        self.dims.0 * self.dims.1
    }
}

fn default_behavior_ranges() -> [(f64, f64); 2] {
    [(0.0, 1.0), (0.0, 1.0)]
}

/// Layouts for the independent archive instances of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveLayout {
    /// Objective-space archive (true evaluations).
    #[serde(default)]
    pub objective: GridConfig,
    /// Acquisition-space archive (exploration and elite search).
    #[serde(default)]
    pub acquisition: GridConfig,
    /// Prediction-space archive (prediction refinement).
    #[serde(default)]
    pub prediction: GridConfig,
}

/// Emitter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Candidates per emitter ask.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Base emitter noise as a fraction of the bound width.
    #[serde(default = "default_sigma_emitter")]
    pub sigma_emitter: f64,
    /// Base mutation strength handed to the evaluator.
    #[serde(default = "default_sigma_mutants")]
    pub sigma_mutants: f64,
    /// Extra noise added at the start of a run, decaying linearly to zero.
    #[serde(default = "default_anneal_boost")]
    pub anneal_boost: f64,
    /// Fraction of scored elites retained by local competition.
    #[serde(default = "default_retain_fraction")]
    pub retain_fraction: f64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            sigma_emitter: default_sigma_emitter(),
            sigma_mutants: default_sigma_mutants(),
            anneal_boost: default_anneal_boost(),
            retain_fraction: default_retain_fraction(),
        }
    }
}

fn default_batch_size() -> usize {
    32
}
fn default_sigma_emitter() -> f64 {
    0.05
}
fn default_sigma_mutants() -> f64 {
    0.05
}
fn default_anneal_boost() -> f64 {
    0.2
}
fn default_retain_fraction() -> f64 {
    0.65
}

impl EmitterConfig {
    /// Emitter sigma after annealing for `remaining` of `total` evaluations.
    pub fn annealed_sigma_emitter(&self, remaining: usize, total: usize) -> f64 {
        anneal(self.sigma_emitter, self.anneal_boost, remaining, total)
    }

    /// Mutation strength after annealing for `remaining` of `total` evaluations.
    pub fn annealed_sigma_mutants(&self, remaining: usize, total: usize) -> f64 {
        anneal(self.sigma_mutants, self.anneal_boost, remaining, total)
    }
}

/// `base + boost * remaining / total`, equal to `base` once the budget is spent.
pub fn anneal(base: f64, boost: f64, remaining: usize, total: usize) -> f64 {
    if total == 0 {
        return base;
    }
    base + boost * (remaining as f64 / total as f64)
}

/// Evaluation budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Evaluations for an acquisition (elite search) run.
    #[serde(default = "default_acquisition_evals")]
    pub acquisition_evals: usize,
    /// Multiplier applied to `acquisition_evals` for plain exploration runs.
    #[serde(default = "default_exploration_multiplier")]
    pub exploration_multiplier: usize,
    /// Evaluations for a prediction refinement run.
    #[serde(default = "default_prediction_evals")]
    pub prediction_evals: usize,
    /// Verification passes sharing the prediction budget.
    #[serde(default)]
    pub prediction_verifications: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            acquisition_evals: default_acquisition_evals(),
            exploration_multiplier: default_exploration_multiplier(),
            prediction_evals: default_prediction_evals(),
            prediction_verifications: 0,
        }
    }
}

fn default_acquisition_evals() -> usize {
    2048
}
fn default_exploration_multiplier() -> usize {
    20
}
fn default_prediction_evals() -> usize {
    4096
}

/// Reinjection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinjectionConfig {
    /// Clear the target archive and reinject its own elites before the main loop.
    #[serde(default = "default_rebuild_on_seed")]
    pub rebuild_on_seed: bool,
    /// Mutation strength of the seed-phase passes.
    #[serde(default = "default_seed_strength")]
    pub seed_strength: f64,
    /// Checkpoint and final-refinement strengths.
    #[serde(default)]
    pub schedule: ReinjectionSchedule,
}

impl Default for ReinjectionConfig {
    fn default() -> Self {
        Self {
            rebuild_on_seed: default_rebuild_on_seed(),
            seed_strength: default_seed_strength(),
            schedule: ReinjectionSchedule::default(),
        }
    }
}

fn default_rebuild_on_seed() -> bool {
    true
}
fn default_seed_strength() -> f64 {
    0.2
}

/// Which archive a run optimizes and how parents are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SearchMode {
    /// Acquisition search with uniform parent selection.
    Exploration,
    /// Prediction refinement with uniform parent selection.
    Prediction {
        /// Split the budget across verification passes.
        #[serde(default)]
        verification: bool,
    },
    /// Model-based elite search: local competition plus reinjection.
    EliteSearch,
}

impl SearchMode {
    /// Whether parents are chosen by local competition.
    #[inline]
    pub fn uses_local_competition(&self) -> bool {
        matches!(self, Self::EliteSearch)
    }

    /// Whether checkpoint reinjection and final refinement run.
    #[inline]
    pub fn reinjects(&self) -> bool {
        matches!(self, Self::EliteSearch)
    }
}

impl SearchConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Grid layout of the archive a mode optimizes.
    pub fn grid_for(&self, mode: SearchMode) -> GridConfig {
        match mode {
            SearchMode::Exploration | SearchMode::EliteSearch => self.archives.acquisition,
            SearchMode::Prediction { .. } => self.archives.prediction,
        }
    }

    /// Total evaluation budget `N` of a run in `mode`.
    pub fn evaluation_budget(&self, mode: SearchMode) -> usize {
        match mode {
            SearchMode::EliteSearch => self.budget.acquisition_evals,
            SearchMode::Exploration => {
                self.budget.acquisition_evals * self.budget.exploration_multiplier
            }
            SearchMode::Prediction { verification: false } => self.budget.prediction_evals,
            SearchMode::Prediction { verification: true } => {
                self.budget.prediction_evals / (self.budget.prediction_verifications + 1)
            }
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solution.dimension() == 0 {
            return Err(ConfigError::EmptySolutionSpace);
        }
        for (dim, &(lower, upper)) in self.solution.bounds.iter().enumerate() {
            if !(lower.is_finite() && upper.is_finite()) || lower > upper {
                return Err(ConfigError::InvalidBounds { dim, lower, upper });
            }
        }

        for (name, grid) in [
            ("objective", &self.archives.objective),
            ("acquisition", &self.archives.acquisition),
            ("prediction", &self.archives.prediction),
        ] {
            validate_grid(name, grid)?;
        }

        if self.emitter.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        for (name, value) in [
            ("sigma_emitter", self.emitter.sigma_emitter),
            ("sigma_mutants", self.emitter.sigma_mutants),
            ("anneal_boost", self.emitter.anneal_boost),
            ("seed_strength", self.reinjection.seed_strength),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidSigma { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.emitter.retain_fraction) {
            return Err(ConfigError::InvalidRetainFraction(
                self.emitter.retain_fraction,
            ));
        }

        self.reinjection.schedule.validate()?;
        Ok(())
    }
}

fn validate_grid(name: &'static str, grid: &GridConfig) -> Result<(), ConfigError> {
    if grid.dims.0 == 0 || grid.dims.1 == 0 {
        return Err(ConfigError::InvalidGridDims(name));
    }
    for (dim, &(lo, hi)) in grid.ranges.iter().enumerate() {
        if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
            return Err(ConfigError::InvalidBehaviorRange { archive: name, dim });
        }
    }
    Ok(())
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Solution space must have at least one dimension")]
    EmptySolutionSpace,
    #[error("Invalid bounds for dimension {dim}: [{lower}, {upper}]")]
    InvalidBounds { dim: usize, lower: f64, upper: f64 },
    #[error("Grid dimensions of the {0} archive must be non-zero")]
    InvalidGridDims(&'static str),
    #[error("Behavior range {dim} of the {archive} archive must be finite and non-empty")]
    InvalidBehaviorRange { archive: &'static str, dim: usize },
    #[error("Batch size must be non-zero")]
    InvalidBatchSize,
    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidSigma { name: &'static str, value: f64 },
    #[error("Retain fraction must lie in [0, 1], got {0}")]
    InvalidRetainFraction(f64),
    #[error("Evaluation budget {budget} is smaller than one batch of {batch_size}")]
    BudgetTooSmall { budget: usize, batch_size: usize },
    #[error("Invalid reinjection schedule: {0}")]
    InvalidSchedule(String),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_evaluation_budget_per_mode() {
        let mut config = SearchConfig::default();
        config.budget.acquisition_evals = 100;
        config.budget.prediction_evals = 300;
        config.budget.prediction_verifications = 2;

        assert_eq!(config.evaluation_budget(SearchMode::EliteSearch), 100);
        assert_eq!(config.evaluation_budget(SearchMode::Exploration), 2000);
        assert_eq!(
            config.evaluation_budget(SearchMode::Prediction {
                verification: false
            }),
            300
        );
        assert_eq!(
            config.evaluation_budget(SearchMode::Prediction { verification: true }),
            100
        );
    }

    #[test]
    fn test_unused_mode_budget_does_not_invalidate() {
        let mut config = SearchConfig::default();
        config.budget.prediction_evals = 0;
        config.budget.acquisition_evals = 16;
        assert!(config.validate().is_ok());
        assert_eq!(
            config.evaluation_budget(SearchMode::Prediction {
                verification: false
            }),
            0
        );
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = SearchConfig::default();
        config.solution.bounds[3] = (1.0, 0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds { dim: 3, .. })
        ));
    }

    #[test]
    fn test_empty_behavior_range_rejected() {
        let mut config = SearchConfig::default();
        config.archives.prediction.ranges[1] = (2.0, 2.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBehaviorRange {
                archive: "prediction",
                dim: 1
            })
        ));
    }

    #[test]
    fn test_annealing_reaches_base() {
        let emitter = EmitterConfig::default();
        assert_eq!(emitter.annealed_sigma_emitter(0, 100), emitter.sigma_emitter);
        let start = emitter.annealed_sigma_emitter(100, 100);
        assert!((start - (emitter.sigma_emitter + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_serialization() {
        let config = SearchConfig {
            random_seed: Some(7),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.emitter.batch_size, config.emitter.batch_size);
        assert_eq!(parsed.random_seed, Some(7));
        assert_eq!(parsed.archives.acquisition, config.archives.acquisition);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "solution": {{ "bounds": [[0.0, 1.0], [-1.0, 1.0], [0.0, 2.0]] }},
                "archives": {{ "acquisition": {{ "dims": [5, 4] }} }},
                "emitter": {{ "batch_size": 8 }},
                "budget": {{ "acquisition_evals": 64 }},
                "random_seed": 3
            }}"#
        )
        .unwrap();

        let config = SearchConfig::from_json_file(&path).unwrap();
        assert_eq!(config.solution.dimension(), 3);
        assert_eq!(config.archives.acquisition.dims, (5, 4));
        assert_eq!(config.archives.acquisition.ranges, [(0.0, 1.0), (0.0, 1.0)]);
        assert_eq!(config.emitter.sigma_emitter, 0.05);
        assert_eq!(config.evaluation_budget(SearchMode::EliteSearch), 64);
    }

    #[test]
    fn test_from_json_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{ "solution": { "bounds": [] }, "archives": {}, "emitter": {}, "budget": {} }"#,
        )
        .unwrap();
        assert!(matches!(
            SearchConfig::from_json_file(&path),
            Err(ConfigError::EmptySolutionSpace)
        ));
    }
}

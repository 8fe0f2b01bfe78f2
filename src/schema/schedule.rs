//! Reinjection schedule: which mutation strengths run at which budget checkpoint.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// A mutation strength that may grow with the remaining budget fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationStrength {
    /// Strength once the budget is exhausted.
    pub base: f64,
    /// Extra strength per unit of remaining budget fraction.
    #[serde(default)]
    pub anneal: f64,
}

impl MutationStrength {
    /// Constant strength.
    pub const fn fixed(base: f64) -> Self {
        Self { base, anneal: 0.0 }
    }

    /// `base + anneal * remaining_fraction`.
    pub const fn annealed(base: f64, anneal: f64) -> Self {
        Self { base, anneal }
    }

    /// Strength for the given remaining budget fraction in `[0, 1]`.
    #[inline]
    pub fn at(&self, remaining_fraction: f64) -> f64 {
        self.base + self.anneal * remaining_fraction
    }
}

/// A budget checkpoint firing whenever `remaining` is a multiple of `total / divisor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Number of equal budget slices.
    pub divisor: usize,
    /// Passes run, in order, when the checkpoint fires.
    pub strengths: Vec<MutationStrength>,
}

impl Checkpoint {
    /// Whether the checkpoint fires. The first and last iteration never fire.
    pub fn is_due(&self, remaining: usize, total: usize, batch_size: usize) -> bool {
        let step = total / self.divisor.max(1);
        step > 0 && remaining % step == 0 && remaining != total && remaining != batch_size
    }
}

/// Ordered mutation strengths for checkpoint bursts and the final refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReinjectionSchedule {
    /// Lighter pass run first at the halfway checkpoint.
    pub halfway: Checkpoint,
    /// Burst run at every periodic checkpoint.
    pub periodic: Checkpoint,
    /// Strictly decreasing passes after the main loop.
    pub final_refinement: Vec<MutationStrength>,
}

impl Default for ReinjectionSchedule {
    fn default() -> Self {
        Self {
            halfway: Checkpoint {
                divisor: 2,
                strengths: vec![MutationStrength::fixed(0.1)],
            },
            periodic: Checkpoint {
                divisor: 8,
                strengths: vec![
                    MutationStrength::fixed(0.5),
                    MutationStrength::annealed(0.3, 0.1),
                    MutationStrength::fixed(0.3),
                    MutationStrength::annealed(0.15, 0.15),
                ],
            },
            final_refinement: vec![
                MutationStrength::fixed(0.5),
                MutationStrength::fixed(0.2),
                MutationStrength::fixed(0.1),
            ],
        }
    }
}

impl ReinjectionSchedule {
    /// Strengths of the burst due at this point of the main loop, empty when none is due.
    ///
    /// The halfway pass only runs as part of a periodic burst.
    pub fn burst_at(&self, remaining: usize, total: usize, batch_size: usize) -> Vec<f64> {
        if !self.periodic.is_due(remaining, total, batch_size) {
            return Vec::new();
        }

        let fraction = remaining as f64 / total as f64;
        let mut passes = Vec::with_capacity(self.periodic.strengths.len() + 1);
        if self.halfway.is_due(remaining, total, batch_size) {
            passes.extend(self.halfway.strengths.iter().map(|s| s.at(fraction)));
        }
        passes.extend(self.periodic.strengths.iter().map(|s| s.at(fraction)));
        passes
    }

    /// Strengths of the final refinement passes.
    pub fn final_passes(&self) -> Vec<f64> {
        self.final_refinement.iter().map(|s| s.at(0.0)).collect()
    }

    /// Validate schedule entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, checkpoint) in [("halfway", &self.halfway), ("periodic", &self.periodic)] {
            if checkpoint.divisor == 0 {
                return Err(ConfigError::InvalidSchedule(format!(
                    "{name} divisor must be non-zero"
                )));
            }
            check_strengths(name, &checkpoint.strengths)?;
        }
        check_strengths("final_refinement", &self.final_refinement)?;

        let finals = self.final_passes();
        if finals.windows(2).any(|w| w[1] >= w[0]) {
            return Err(ConfigError::InvalidSchedule(
                "final refinement strengths must be strictly decreasing".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_strengths(name: &str, strengths: &[MutationStrength]) -> Result<(), ConfigError> {
    for s in strengths {
        if !(s.base.is_finite() && s.anneal.is_finite()) || s.base < 0.0 || s.at(1.0) < 0.0 {
            return Err(ConfigError::InvalidSchedule(format!(
                "{name} strength {s:?} must be finite and non-negative"
            )));
        }
    }
    Ok(())
}

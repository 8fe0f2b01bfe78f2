//! Grid archive holding one elite per behavior cell.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use rand::Rng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::schema::GridConfig;

use super::{Behavior, SearchError, Solution, check_len};

/// Absorbs floating-point error for behaviors that sit exactly on a bin edge.
const BIN_EPSILON: f64 = 1e-9;

/// Best-known occupant of one archive cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Elite {
    /// Solution vector.
    pub solution: Solution,
    /// Objective value (higher is better).
    pub objective: f64,
    /// Behavior the elite was binned by.
    pub behavior: Behavior,
    /// Row-major cell index.
    pub index: usize,
}

/// One exported archive row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EliteRow {
    /// Row-major cell index.
    pub index: usize,
    /// Objective value.
    pub objective: f64,
    /// Behavior descriptor.
    pub behavior: Behavior,
    /// Solution vector, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
}

/// Outcome of one batch insertion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddSummary {
    /// Candidates that filled an empty cell.
    pub new_cells: usize,
    /// Candidates that replaced a worse incumbent.
    pub improved: usize,
    /// Candidates that lost to the incumbent (ties included).
    pub rejected: usize,
}

impl AddSummary {
    /// Candidates that ended up in the archive.
    #[inline]
    pub fn inserted(&self) -> usize {
        self.new_cells + self.improved
    }
}

impl AddAssign for AddSummary {
    fn add_assign(&mut self, other: Self) {
        self.new_cells += other.new_cells;
        self.improved += other.improved;
        self.rejected += other.rejected;
    }
}

/// Summary statistics over the filled cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ArchiveStats {
    /// Number of filled cells.
    pub num_elites: usize,
    /// Total number of cells.
    pub cells: usize,
    /// Fraction of filled cells.
    pub coverage: f64,
    /// Sum of elite objectives.
    pub qd_score: f64,
    /// Best objective, `None` when empty.
    pub obj_max: Option<f64>,
    /// Mean objective, `None` when empty.
    pub obj_mean: Option<f64>,
}

/// Storage and lookup of elites over a behavior grid.
pub trait Archive: Send + Sync {
    /// Length of every stored solution.
    fn solution_dim(&self) -> usize;

    /// Total number of cells.
    fn cells(&self) -> usize;

    /// Cell index of a behavior, clamped into the grid.
    fn index_of(&self, behavior: &Behavior) -> usize;

    /// Moore neighborhood of a cell, without wrapping across rows or edges.
    fn neighbors(&self, index: usize) -> Vec<usize>;

    /// Elite occupying a cell.
    fn elite(&self, index: usize) -> Option<&Elite>;

    /// All elites in ascending cell order.
    fn elites(&self) -> Vec<&Elite>;

    /// Number of filled cells.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a batch, in order, keeping the better candidate per cell.
    fn add(
        &mut self,
        solutions: &[Solution],
        objectives: &[f64],
        behaviors: &[Behavior],
    ) -> Result<AddSummary, SearchError>;

    /// Remove every elite; shape and ranges are kept.
    fn clear(&mut self);

    /// Filled cells as rows in ascending cell order.
    fn as_table(&self, include_solutions: bool) -> Vec<EliteRow> {
        self.elites()
            .into_iter()
            .map(|e| EliteRow {
                index: e.index,
                objective: e.objective,
                behavior: e.behavior,
                solution: include_solutions.then(|| e.solution.clone()),
            })
            .collect()
    }

    /// `n` elites drawn uniformly with replacement.
    fn sample_elites(&self, n: usize, rng: &mut StdRng) -> Result<Vec<&Elite>, SearchError> {
        let elites = self.elites();
        if elites.is_empty() {
            return Err(SearchError::EmptyArchive);
        }
        Ok((0..n)
            .map(|_| elites[rng.gen_range(0..elites.len())])
            .collect())
    }

    /// Summary statistics over the filled cells.
    fn stats(&self) -> ArchiveStats {
        let elites = self.elites();
        let num_elites = elites.len();
        let qd_score: f64 = elites.iter().map(|e| e.objective).sum();
        let obj_max = elites
            .iter()
            .map(|e| e.objective)
            .max_by(|a, b| a.total_cmp(b));

        ArchiveStats {
            num_elites,
            cells: self.cells(),
            coverage: num_elites as f64 / self.cells().max(1) as f64,
            qd_score,
            obj_max,
            obj_mean: (num_elites > 0).then(|| qd_score / num_elites as f64),
        }
    }
}

/// Fixed-size 2-D grid archive over a rectangular behavior range.
#[derive(Debug, Clone)]
pub struct GridArchive {
    solution_dim: usize,
    grid: GridConfig,
    elites: BTreeMap<usize, Elite>,
}

impl GridArchive {
    /// Create an empty archive.
    pub fn new(solution_dim: usize, grid: GridConfig) -> Self {
        Self {
            solution_dim,
            grid,
            elites: BTreeMap::new(),
        }
    }

    /// Rebuild-style seeding: re-bin every elite of `other` into this grid.
    pub fn extend_from(&mut self, other: &dyn Archive) -> Result<AddSummary, SearchError> {
        let elites = other.elites();
        let solutions: Vec<Solution> = elites.iter().map(|e| e.solution.clone()).collect();
        let objectives: Vec<f64> = elites.iter().map(|e| e.objective).collect();
        let behaviors: Vec<Behavior> = elites.iter().map(|e| e.behavior).collect();
        self.add(&solutions, &objectives, &behaviors)
    }

    /// Solutions and behaviors of the current elites, in cell order.
    pub fn elite_batch(&self) -> (Vec<Solution>, Vec<Behavior>) {
        self.elites
            .values()
            .map(|e| (e.solution.clone(), e.behavior))
            .unzip()
    }

    fn insert(&mut self, solution: &Solution, objective: f64, behavior: Behavior) -> Insertion {
        if objective.is_nan() {
            return Insertion::Rejected;
        }

        let index = self.index_of(&behavior);
        let outcome = match self.elites.get(&index) {
            Some(incumbent) if objective <= incumbent.objective => return Insertion::Rejected,
            Some(_) => Insertion::Improved,
            None => Insertion::New,
        };

        self.elites.insert(
            index,
            Elite {
                solution: solution.clone(),
                objective,
                behavior,
                index,
            },
        );
        outcome
    }
}

enum Insertion {
    New,
    Improved,
    Rejected,
}

/// Linear bin of `value` into `[0, bins)`, clamping out-of-range values.
fn bin(value: f64, (lo, hi): (f64, f64), bins: usize) -> usize {
    let scaled = bins as f64 * (value - lo) / (hi - lo) + BIN_EPSILON;
    if scaled.is_nan() {
        return 0;
    }
    scaled.floor().clamp(0.0, bins.saturating_sub(1) as f64) as usize
}

impl Archive for GridArchive {
    fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    fn cells(&self) -> usize {
        self.grid.cells()
    }

    fn index_of(&self, behavior: &Behavior) -> usize {
        let (rows, cols) = self.grid.dims;
        let row = bin(behavior[0], self.grid.ranges[0], rows);
        let col = bin(behavior[1], self.grid.ranges[1], cols);
        row * cols + col
    }

    fn neighbors(&self, index: usize) -> Vec<usize> {
        let (rows, cols) = self.grid.dims;
        if index >= rows * cols {
            return Vec::new();
        }
        let (row, col) = ((index / cols) as isize, (index % cols) as isize);

        let mut neighbors = Vec::with_capacity(8);
        for dr in -1..=1isize {
            for dc in -1..=1isize {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let (r, c) = (row + dr, col + dc);
                if r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols {
                    neighbors.push(r as usize * cols + c as usize);
                }
            }
        }
        neighbors
    }

    fn elite(&self, index: usize) -> Option<&Elite> {
        self.elites.get(&index)
    }

    fn elites(&self) -> Vec<&Elite> {
        self.elites.values().collect()
    }

    fn len(&self) -> usize {
        self.elites.len()
    }

    fn add(
        &mut self,
        solutions: &[Solution],
        objectives: &[f64],
        behaviors: &[Behavior],
    ) -> Result<AddSummary, SearchError> {
        check_len("objective batch", solutions.len(), objectives.len())?;
        check_len("behavior batch", solutions.len(), behaviors.len())?;
        for solution in solutions {
            check_len("solution", self.solution_dim, solution.len())?;
        }

        let mut summary = AddSummary::default();
        for ((solution, &objective), &behavior) in solutions.iter().zip(objectives).zip(behaviors)
        {
            match self.insert(solution, objective, behavior) {
                Insertion::New => summary.new_cells += 1,
                Insertion::Improved => summary.improved += 1,
                Insertion::Rejected => summary.rejected += 1,
            }
        }

        log::trace!(
            "archive add: {} new, {} improved, {} rejected",
            summary.new_cells,
            summary.improved,
            summary.rejected
        );
        Ok(summary)
    }

    fn clear(&mut self) {
        self.elites.clear();
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn grid_3x3() -> GridArchive {
        GridArchive::new(
            2,
            GridConfig {
                dims: (3, 3),
                ranges: [(0.0, 3.0), (0.0, 3.0)],
            },
        )
    }

    #[test]
    fn test_replace_if_better_scenario() {
        let mut archive = grid_3x3();
        archive
            .add(&[vec![0.1, 0.1]], &[10.0], &[[1.5, 1.5]])
            .unwrap();
        assert_eq!(archive.index_of(&[1.5, 1.5]), 4);

        let summary = archive
            .add(&[vec![0.9, 0.9]], &[9.0], &[[1.5, 1.5]])
            .unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(archive.elite(4).unwrap().objective, 10.0);
        assert_eq!(archive.elite(4).unwrap().solution, vec![0.1, 0.1]);

        let summary = archive
            .add(&[vec![0.5, 0.5]], &[11.0], &[[1.5, 1.5]])
            .unwrap();
        assert_eq!(summary.improved, 1);
        assert_eq!(archive.elite(4).unwrap().objective, 11.0);
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_ties_keep_incumbent() {
        let mut archive = grid_3x3();
        archive
            .add(
                &[vec![1.0, 1.0], vec![2.0, 2.0]],
                &[5.0, 5.0],
                &[[0.5, 0.5], [0.6, 0.6]],
            )
            .unwrap();
        assert_eq!(archive.elite(0).unwrap().solution, vec![1.0, 1.0]);
    }

    #[test]
    fn test_batch_keeps_maximum_per_cell() {
        let mut archive = grid_3x3();
        let objectives = [3.0, 7.0, 1.0, 7.0, 6.5];
        let solutions: Vec<Solution> = (0..5).map(|i| vec![i as f64, 0.0]).collect();
        let behaviors = vec![[2.5, 0.2]; 5];
        let summary = archive.add(&solutions, &objectives, &behaviors).unwrap();

        assert_eq!(summary.new_cells, 1);
        assert_eq!(summary.improved, 1);
        assert_eq!(summary.rejected, 3);
        let elite = archive.elite(6).unwrap();
        assert_eq!(elite.objective, 7.0);
        // The first 7.0 wins, the later tie loses.
        assert_eq!(elite.solution, vec![1.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_behavior_is_clamped() {
        let archive = grid_3x3();
        assert_eq!(archive.index_of(&[-10.0, -10.0]), 0);
        assert_eq!(archive.index_of(&[10.0, 10.0]), 8);
        assert_eq!(archive.index_of(&[3.0, 0.0]), 6);
        assert_eq!(archive.index_of(&[0.0, 3.0]), 2);
        assert_eq!(archive.index_of(&[f64::NAN, 1.5]), 1);
    }

    #[test]
    fn test_row_major_binning() {
        let archive = GridArchive::new(
            1,
            GridConfig {
                dims: (2, 4),
                ranges: [(0.0, 1.0), (0.0, 1.0)],
            },
        );
        assert_eq!(archive.index_of(&[0.75, 0.0]), 4);
        assert_eq!(archive.index_of(&[0.25, 0.8]), 3);
        assert_eq!(archive.index_of(&[0.99, 0.99]), 7);
    }

    #[test]
    fn test_shape_mismatch_rejects_whole_batch() {
        let mut archive = grid_3x3();
        let result = archive.add(
            &[vec![0.0, 0.0], vec![1.0, 1.0]],
            &[1.0],
            &[[0.0, 0.0], [1.0, 1.0]],
        );
        assert!(matches!(result, Err(SearchError::ShapeMismatch { .. })));
        assert!(archive.is_empty());

        let result = archive.add(
            &[vec![0.0, 0.0], vec![1.0]],
            &[1.0, 2.0],
            &[[0.0, 0.0], [1.0, 1.0]],
        );
        assert!(matches!(
            result,
            Err(SearchError::ShapeMismatch {
                what: "solution",
                expected: 2,
                actual: 1
            })
        ));
        assert!(archive.is_empty());
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut archive = grid_3x3();
        let summary = archive.add(&[], &[], &[]).unwrap();
        assert_eq!(summary, AddSummary::default());
    }

    #[test]
    fn test_nan_objective_rejected() {
        let mut archive = grid_3x3();
        let summary = archive.add(&[vec![0.0, 0.0]], &[f64::NAN], &[[0.0, 0.0]]).unwrap();
        assert_eq!(summary.rejected, 1);
        assert!(archive.is_empty());
    }

    #[test]
    fn test_neighbors() {
        let archive = grid_3x3();
        assert_eq!(archive.neighbors(4), vec![0, 1, 2, 3, 5, 6, 7, 8]);
        assert_eq!(archive.neighbors(0), vec![1, 3, 4]);
        assert_eq!(archive.neighbors(5), vec![1, 2, 4, 7, 8]);
        assert_eq!(archive.neighbors(6), vec![3, 4, 7]);
        assert!(archive.neighbors(9).is_empty());
    }

    #[test]
    fn test_neighbors_do_not_wrap_rows() {
        let archive = GridArchive::new(
            1,
            GridConfig {
                dims: (3, 4),
                ranges: [(0.0, 1.0), (0.0, 1.0)],
            },
        );
        // Index 3 ends the first row; 4 starts the second.
        let n3 = archive.neighbors(3);
        assert_eq!(n3, vec![2, 6, 7]);
        assert!(!archive.neighbors(4).contains(&3));
    }

    #[test]
    fn test_table_is_ordered_and_optional_solutions() {
        let mut archive = grid_3x3();
        archive
            .add(
                &[vec![8.0, 8.0], vec![0.0, 0.0]],
                &[1.0, 2.0],
                &[[2.9, 2.9], [0.1, 0.1]],
            )
            .unwrap();
        let table = archive.as_table(false);
        assert_eq!(table.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 8]);
        assert!(table.iter().all(|r| r.solution.is_none()));
        let table = archive.as_table(true);
        assert_eq!(table[1].solution.as_deref(), Some(&[8.0, 8.0][..]));
    }

    #[test]
    fn test_sample_elites() {
        let mut archive = grid_3x3();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            archive.sample_elites(4, &mut rng),
            Err(SearchError::EmptyArchive)
        ));

        archive
            .add(
                &[vec![0.0, 0.0], vec![1.0, 1.0]],
                &[1.0, 2.0],
                &[[0.1, 0.1], [2.9, 2.9]],
            )
            .unwrap();
        let sampled = archive.sample_elites(50, &mut rng).unwrap();
        assert_eq!(sampled.len(), 50);
        assert!(sampled.iter().any(|e| e.index == 0));
        assert!(sampled.iter().any(|e| e.index == 8));
    }

    #[test]
    fn test_clear_keeps_shape() {
        let mut archive = grid_3x3();
        archive.add(&[vec![0.0, 0.0]], &[1.0], &[[0.1, 0.1]]).unwrap();
        archive.clear();
        assert!(archive.is_empty());
        assert_eq!(archive.cells(), 9);
        assert_eq!(archive.index_of(&[1.5, 1.5]), 4);
    }

    #[test]
    fn test_extend_from_rebins() {
        let mut source = grid_3x3();
        source
            .add(
                &[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]],
                &[1.0, 2.0, 3.0],
                &[[0.1, 0.1], [1.5, 1.5], [2.9, 2.9]],
            )
            .unwrap();
        assert_eq!(source.len(), 3);

        let mut coarse = GridArchive::new(
            2,
            GridConfig {
                dims: (1, 1),
                ranges: [(0.0, 3.0), (0.0, 3.0)],
            },
        );
        let summary = coarse.extend_from(&source).unwrap();
        assert_eq!(summary.inserted(), 3);
        assert_eq!(coarse.len(), 1);
        assert_eq!(coarse.elite(0).unwrap().objective, 3.0);
    }

    #[test]
    fn test_stats() {
        let mut archive = grid_3x3();
        assert_eq!(archive.stats().obj_mean, None);
        archive
            .add(
                &[vec![0.0, 0.0], vec![1.0, 1.0]],
                &[1.0, 3.0],
                &[[0.1, 0.1], [2.9, 2.9]],
            )
            .unwrap();
        let stats = archive.stats();
        assert_eq!(stats.num_elites, 2);
        assert_eq!(stats.qd_score, 4.0);
        assert_eq!(stats.obj_max, Some(3.0));
        assert_eq!(stats.obj_mean, Some(2.0));
        assert!((stats.coverage - 2.0 / 9.0).abs() < 1e-12);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn binning_stays_in_grid(
                rows in 1usize..20,
                cols in 1usize..20,
                b0 in -1e3f64..1e3,
                b1 in -1e3f64..1e3,
            ) {
                let archive = GridArchive::new(1, GridConfig {
                    dims: (rows, cols),
                    ranges: [(-5.0, 5.0), (0.0, 2.0)],
                });
                let index = archive.index_of(&[b0, b1]);
                prop_assert!(index < rows * cols);
                prop_assert_eq!(index, archive.index_of(&[b0, b1]));
            }

            #[test]
            fn interior_neighbors_are_symmetric(
                rows in 3usize..15,
                cols in 3usize..15,
                seed in 0usize..10_000,
            ) {
                let archive = GridArchive::new(1, GridConfig {
                    dims: (rows, cols),
                    ranges: [(0.0, 1.0), (0.0, 1.0)],
                });
                let i = seed % (rows * cols);
                for j in archive.neighbors(i) {
                    prop_assert!(archive.neighbors(j).contains(&i));
                }
            }

            #[test]
            fn cell_keeps_maximum(objectives in proptest::collection::vec(-100.0f64..100.0, 1..30)) {
                let mut archive = GridArchive::new(1, GridConfig::square(4));
                for &objective in &objectives {
                    archive.add(&[vec![objective]], &[objective], &[[0.5, 0.5]]).unwrap();
                }
                let max = objectives.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert_eq!(archive.len(), 1);
                prop_assert_eq!(archive.elites()[0].objective, max);
            }
        }
    }
}

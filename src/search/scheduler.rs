//! Scheduler coupling emitters to a target archive.

use super::{Archive, AddSummary, Behavior, CandidateGenerator, SearchError, Solution, check_len};

/// Couples one or more emitters to one archive.
///
/// `ask` may be called repeatedly without a matching `tell`; callers are free
/// to evaluate candidates and insert them into the archive themselves.
pub struct Scheduler<'a> {
    emitters: Vec<Box<dyn CandidateGenerator + 'a>>,
    num_emitted: Vec<usize>,
    last_batch: Vec<Solution>,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler over the given emitters.
    pub fn new(emitters: Vec<Box<dyn CandidateGenerator + 'a>>) -> Self {
        let num_emitted = vec![0; emitters.len()];
        Self {
            emitters,
            num_emitted,
            last_batch: Vec::new(),
        }
    }

    /// Ask every emitter in order and concatenate their batches.
    pub fn ask(&mut self) -> Result<Vec<Solution>, SearchError> {
        let capacity = self.emitters.iter().map(|e| e.batch_size()).sum();
        let mut batch = Vec::with_capacity(capacity);
        for (i, emitter) in self.emitters.iter_mut().enumerate() {
            let solutions = emitter.ask()?;
            self.num_emitted[i] = solutions.len();
            batch.extend(solutions);
        }
        self.last_batch = batch.clone();
        Ok(batch)
    }

    /// Insert the last asked batch with its evaluation results.
    pub fn tell(
        &self,
        archive: &mut dyn Archive,
        objectives: &[f64],
        behaviors: &[Behavior],
    ) -> Result<AddSummary, SearchError> {
        check_len("objective batch", self.last_batch.len(), objectives.len())?;
        check_len("behavior batch", self.last_batch.len(), behaviors.len())?;
        archive.add(&self.last_batch, objectives, behaviors)
    }

    /// Candidates produced by each emitter in the last `ask`.
    pub fn num_emitted(&self) -> &[usize] {
        &self.num_emitted
    }
}

use serde::{Deserialize, Serialize};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Nothing survived the price filter; the GA loop never ran
    EmptyCatalog,
    GenerationLimit,
    Stagnation,
}

/// Bookkeeping for one run. Created when the run starts and dropped with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    /// Completed reproduction cycles
    pub generation: usize,
    pub best_fitness: f64,
    /// Consecutive generations whose best did not strictly beat `best_fitness`
    pub stagnant_generations: usize,
    pub fitness_evaluations: usize,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            generation: 0,
            best_fitness: f64::NEG_INFINITY,
            stagnant_generations: 0,
            fitness_evaluations: 0,
        }
    }

    /// Records a generation's best fitness. Returns true on strict improvement.
    ///
    /// Ties count as stagnation.
    pub fn observe(&mut self, generation_best: f64) -> bool {
        if generation_best > self.best_fitness {
            self.best_fitness = generation_best;
            self.stagnant_generations = 0;
            true
        } else {
            self.stagnant_generations += 1;
            false
        }
    }
}

/// Decides, after each evaluated generation, whether the run is over.
pub trait TerminationPolicy: Send + Sync {
    fn should_stop(&self, state: &RunState) -> Option<StopReason>;
}

/// Fixed generation ceiling plus plateau detection.
#[derive(Debug, Clone, Copy)]
pub struct StagnationPolicy {
    max_generations: usize,
    /// 0 disables early stopping
    stagnation_limit: usize,
}

impl StagnationPolicy {
    pub fn new(max_generations: usize, stagnation_limit: usize) -> Self {
        Self {
            max_generations,
            stagnation_limit,
        }
    }
}

impl TerminationPolicy for StagnationPolicy {
    fn should_stop(&self, state: &RunState) -> Option<StopReason> {
        if state.generation >= self.max_generations {
            return Some(StopReason::GenerationLimit);
        }
        if self.stagnation_limit > 0 && state.stagnant_generations >= self.stagnation_limit {
            return Some(StopReason::Stagnation);
        }
        None
    }
}

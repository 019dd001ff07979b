pub mod fitness;
pub mod operators;
pub mod state;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{dedup_by_tags, Catalog, PriceRange, Product};
use crate::config::{AffinityKind, CrossoverKind, GaConfig, ScoringConfig, SelectionKind};
use crate::profile::{PreferenceMode, TasteProfile};
use crate::scoring::{AffinityModel, AnyMatchAffinity, FacetCardinalityAffinity};

pub use fitness::{FitnessBreakdown, RelevantIndex, SubsetFitness};
pub use operators::{
    rank_by_fitness, BitFlipMutation, CrossoverStrategy, MutationStrategy, SelectionStrategy,
    SinglePointCrossover, SteadyStateSelection, TournamentSelection, UniformCrossover,
};
pub use state::{RunState, StagnationPolicy, StopReason, TerminationPolicy};

/// Marks an individual whose fitness has not been computed yet
const UNEVALUATED: f64 = f64::NEG_INFINITY;

/// One inclusion bit per price-filtered candidate
pub type Genome = Vec<bool>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid GA configuration: {0}")]
    InvalidGaConfig(String),
    #[error("Invalid scoring configuration: {0}")]
    InvalidScoringConfig(String),
}

/// A candidate subset together with its fitness
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub genome: Genome,
    pub fitness: f64,
}

impl Individual {
    pub fn unevaluated(genome: Genome) -> Self {
        Self {
            genome,
            fitness: UNEVALUATED,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness != UNEVALUATED
    }

    pub fn selected_count(&self) -> usize {
        self.genome.iter().filter(|&&g| g).count()
    }
}

/// Result of one `recommend` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Selected candidates, one per distinct tag set, in catalog order
    pub products: Vec<Product>,
    /// `None` when the price filter left nothing to search
    pub best_fitness: Option<f64>,
    pub generations_completed: usize,
    pub fitness_evaluations: usize,
    /// Best fitness of each evaluated generation, initial population first
    pub fitness_trace: Vec<f64>,
    pub stop_reason: StopReason,
    pub candidate_count: usize,
    pub relevant_count: usize,
    pub seed: Option<u64>,
}

impl Recommendation {
    fn empty() -> Self {
        Self {
            products: Vec::new(),
            best_fitness: None,
            generations_completed: 0,
            fitness_evaluations: 0,
            fitness_trace: Vec::new(),
            stop_reason: StopReason::EmptyCatalog,
            candidate_count: 0,
            relevant_count: 0,
            seed: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Searches a catalog for the product subset that best fits one taste profile.
///
/// The engine itself is immutable: every `recommend` call builds a fresh `SearchRun` with its
/// own population, RNG and `RunState`, so calls never influence each other.
pub struct SubsetEngine<'a> {
    config: &'a GaConfig,
    scoring: &'a ScoringConfig,
    catalog: &'a Catalog,
    profile: &'a TasteProfile,
    price_range: PriceRange,
    mode: PreferenceMode,
    affinity: Box<dyn AffinityModel>,
    selection: Box<dyn SelectionStrategy>,
    crossover: Box<dyn CrossoverStrategy>,
    mutation: Box<dyn MutationStrategy>,
    termination: Box<dyn TerminationPolicy>,
}

impl<'a> SubsetEngine<'a> {
    /// Creates a new engine for one (catalog, profile, price range, mode) request.
    ///
    /// # Arguments
    /// * `config` - GA parameters; validated here
    /// * `scoring` - affinity weights and fitness penalties; validated here
    /// * `catalog` - the full catalog, filtered by `price_range` at the start of every run
    /// * `profile` - the listener's taste
    /// * `price_range` - inclusive bounds, either side optional
    /// * `mode` - which facets count; an unknown mode is accepted and scores nothing
    ///
    /// # Returns
    /// * `Result<Self, EngineError>` - the engine with operators chosen from `config`
    pub fn new(
        config: &'a GaConfig,
        scoring: &'a ScoringConfig,
        catalog: &'a Catalog,
        profile: &'a TasteProfile,
        price_range: PriceRange,
        mode: PreferenceMode,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidGaConfig)?;
        scoring
            .validate()
            .map_err(EngineError::InvalidScoringConfig)?;

        let affinity: Box<dyn AffinityModel> = match config.affinity_model {
            AffinityKind::AnyMatch => Box::new(AnyMatchAffinity::new(scoring)),
            AffinityKind::FacetCardinality => {
                Box::new(FacetCardinalityAffinity::new(scoring.facet_weights))
            }
        };
        let selection: Box<dyn SelectionStrategy> = match config.selection {
            SelectionKind::SteadyState => Box::new(SteadyStateSelection),
            SelectionKind::Tournament => Box::new(TournamentSelection::new(config.tournament_size)),
        };
        let crossover: Box<dyn CrossoverStrategy> = match config.crossover {
            CrossoverKind::Uniform => Box::new(UniformCrossover::new(config.crossover_rate())),
            CrossoverKind::SinglePoint => {
                Box::new(SinglePointCrossover::new(config.crossover_rate()))
            }
        };

        Ok(Self {
            config,
            scoring,
            catalog,
            profile,
            price_range,
            mode,
            affinity,
            selection,
            crossover,
            mutation: Box::new(BitFlipMutation::new(config.mutation_rate())),
            termination: Box::new(StagnationPolicy::new(
                config.num_generations,
                config.stagnation_limit,
            )),
        })
    }

    pub fn with_affinity(mut self, affinity: Box<dyn AffinityModel>) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn with_selection(mut self, selection: Box<dyn SelectionStrategy>) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_crossover(mut self, crossover: Box<dyn CrossoverStrategy>) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn with_mutation(mut self, mutation: Box<dyn MutationStrategy>) -> Self {
        self.mutation = mutation;
        self
    }

    pub fn with_termination(mut self, termination: Box<dyn TerminationPolicy>) -> Self {
        self.termination = termination;
        self
    }

    pub fn price_range(&self) -> &PriceRange {
        &self.price_range
    }

    pub fn mode(&self) -> &PreferenceMode {
        &self.mode
    }

    /// Runs the whole search and returns the best subset found.
    pub fn recommend(&self) -> Recommendation {
        match self.start_run() {
            Some(run) => run.run(),
            None => Recommendation::empty(),
        }
    }

    /// Prepares a run: filters the catalog, precomputes affinities and seeds the RNG.
    ///
    /// Returns `None` when no product falls inside the price range.
    pub fn start_run(&self) -> Option<SearchRun<'_>> {
        let candidates = self.catalog.filter_by_price(&self.price_range);
        if candidates.is_empty() {
            warn!(
                "No products in price range {}; nothing to recommend",
                self.price_range
            );
            return None;
        }
        if !self.mode.is_known() {
            warn!(
                "Unknown preference mode '{}'; every product will score zero",
                self.mode
            );
        }
        if self.profile.is_empty() {
            warn!("Taste profile is empty; every product will score zero");
        }

        let fitness = SubsetFitness::new(
            candidates.products(),
            self.profile,
            &self.mode,
            self.affinity.as_ref(),
            self.scoring,
        );
        let seed = self.config.seed.unwrap_or_else(|| rand::rng().random());
        info!(
            "Starting run: {} candidates ({} relevant) in {} | mode={} | affinity={} | selection={} | crossover={} | seed={}",
            candidates.len(),
            fitness.relevant().len(),
            self.price_range,
            self.mode,
            self.affinity.name(),
            self.selection.name(),
            self.crossover.name(),
            seed
        );

        Some(SearchRun {
            engine: self,
            candidates,
            fitness,
            population: Vec::with_capacity(self.config.sol_per_pop),
            state: RunState::new(),
            rng: StdRng::seed_from_u64(seed),
            best: None,
            fitness_trace: Vec::new(),
            seed,
        })
    }
}

/// One execution of the GA over a fixed candidate list.
pub struct SearchRun<'e> {
    engine: &'e SubsetEngine<'e>,
    candidates: Catalog,
    fitness: SubsetFitness,
    population: Vec<Individual>,
    state: RunState,
    rng: StdRng,
    best: Option<Individual>,
    fitness_trace: Vec<f64>,
    seed: u64,
}

impl<'e> SearchRun<'e> {
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn candidates(&self) -> &Catalog {
        &self.candidates
    }

    pub fn fitness(&self) -> &SubsetFitness {
        &self.fitness
    }

    /// Fills the population with random genomes, each topped up to `min_selected` genes.
    pub fn initialize_population(&mut self) {
        let genome_len = self.candidates.len();
        let min_selected = self.engine.config.min_selected.min(genome_len);
        let size = self.engine.config.sol_per_pop;
        info!("Initializing population of size {}...", size);

        let mut population = Vec::with_capacity(size);
        for _ in 0..size {
            let mut genome: Genome = (0..genome_len).map(|_| self.rng.random()).collect();
            top_up(&mut genome, min_selected, &mut self.rng);
            population.push(Individual::unevaluated(genome));
        }
        self.population = population;
    }

    /// Scores every unevaluated individual in parallel and returns how many were scored.
    ///
    /// Elites carried over from the previous generation keep their fitness.
    pub fn evaluate_population(&mut self) -> usize {
        let fitness = &self.fitness;
        let results: Vec<(usize, f64)> = self
            .population
            .par_iter()
            .enumerate()
            .filter(|(_, ind)| !ind.is_evaluated())
            .map(|(i, ind)| (i, fitness.evaluate(&ind.genome)))
            .collect();

        // Nothing is written back until the whole generation is scored
        let evaluated = results.len();
        for (i, score) in results {
            self.population[i].fitness = score;
        }
        evaluated
    }

    /// Builds the next generation: elites first, then mutated offspring of the selected parents.
    pub fn reproduce(&mut self) {
        let config = self.engine.config;
        let parents =
            self.engine
                .selection
                .select(&self.population, config.num_parents_mating, &mut self.rng);

        let mut next_generation: Vec<Individual> = rank_by_fitness(&self.population)
            .into_iter()
            .take(config.keep_elitism)
            .map(|i| self.population[i].clone())
            .collect();

        let offspring_count = config.sol_per_pop - next_generation.len();
        let mut offspring = self
            .engine
            .crossover
            .offspring(&parents, offspring_count, &mut self.rng);
        for genome in offspring.iter_mut() {
            self.engine.mutation.mutate(genome, &mut self.rng);
        }
        next_generation.extend(offspring.into_iter().map(Individual::unevaluated));
        self.population = next_generation;
    }

    /// Runs the GA loop to completion.
    pub fn run(mut self) -> Recommendation {
        self.initialize_population();

        let stop_reason = loop {
            self.state.fitness_evaluations += self.evaluate_population();

            let generation_best = match rank_by_fitness(&self.population).first() {
                Some(&i) => self.population[i].clone(),
                None => break StopReason::GenerationLimit,
            };
            let mean = self.population.iter().map(|ind| ind.fitness).sum::<f64>()
                / self.population.len() as f64;
            self.fitness_trace.push(generation_best.fitness);
            let improved = self.state.observe(generation_best.fitness);
            info!(
                "Gen {}: Best Fitness={:.4} | Mean={:.4} | Selected={} | Stagnant={}",
                self.state.generation,
                generation_best.fitness,
                mean,
                generation_best.selected_count(),
                self.state.stagnant_generations
            );
            if improved {
                self.best = Some(generation_best);
            }

            if let Some(reason) = self.engine.termination.should_stop(&self.state) {
                break reason;
            }
            self.reproduce();
            self.state.generation += 1;
        };

        self.finish(stop_reason)
    }

    fn finish(self, stop_reason: StopReason) -> Recommendation {
        let (products, best_fitness) = match &self.best {
            Some(best) => {
                let b = self.fitness.breakdown(&best.genome);
                debug!(
                    "Best breakdown: affinity={:.2} non_matching={} missing_relevant={}",
                    b.affinity, b.non_matching, b.missing_relevant
                );
                let selected = best
                    .genome
                    .iter()
                    .zip(self.candidates.products())
                    .filter(|(included, _)| **included)
                    .map(|(_, p)| p.clone())
                    .collect();
                (dedup_by_tags(selected), Some(best.fitness))
            }
            None => (Vec::new(), None),
        };
        info!(
            "Run complete after {} generations ({:?}): best fitness {:.4}, {} products selected, {} fitness evaluations",
            self.state.generation,
            stop_reason,
            best_fitness.unwrap_or(f64::NAN),
            products.len(),
            self.state.fitness_evaluations
        );

        Recommendation {
            products,
            best_fitness,
            generations_completed: self.state.generation,
            fitness_evaluations: self.state.fitness_evaluations,
            fitness_trace: self.fitness_trace,
            stop_reason,
            candidate_count: self.candidates.len(),
            relevant_count: self.fitness.relevant().len(),
            seed: Some(self.seed),
        }
    }
}

/// Switches random unselected genes on until at least `min_selected` are set.
fn top_up(genome: &mut Genome, min_selected: usize, rng: &mut StdRng) {
    let selected = genome.iter().filter(|&&g| g).count();
    if selected >= min_selected {
        return;
    }
    let unselected: Vec<usize> = genome
        .iter()
        .enumerate()
        .filter(|(_, g)| !**g)
        .map(|(i, _)| i)
        .collect();
    let picks: Vec<usize> = unselected
        .choose_multiple(rng, min_selected - selected)
        .copied()
        .collect();
    for i in picks {
        genome[i] = true;
    }
}

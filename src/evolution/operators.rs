//! Selection, crossover and mutation operators.
//!
//! Every operator draws from the run's `StdRng`, never from a thread-local generator, so a
//! seeded run replays exactly.

use log::warn;
use rand::rngs::StdRng;
use rand::Rng;
use std::cmp::Ordering;

use super::{Genome, Individual};

/// Population indices ordered best first. Ties keep population order.
pub fn rank_by_fitness(population: &[Individual]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| {
        population[b]
            .fitness
            .partial_cmp(&population[a].fitness)
            .unwrap_or(Ordering::Equal)
    });
    order
}

/// Picks the individuals allowed to breed.
pub trait SelectionStrategy: Send + Sync {
    fn select(
        &self,
        population: &[Individual],
        num_parents: usize,
        rng: &mut StdRng,
    ) -> Vec<Individual>;

    fn name(&self) -> &'static str;
}

/// Truncation selection: the `num_parents` fittest individuals, no randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct SteadyStateSelection;

impl SelectionStrategy for SteadyStateSelection {
    fn select(
        &self,
        population: &[Individual],
        num_parents: usize,
        _rng: &mut StdRng,
    ) -> Vec<Individual> {
        rank_by_fitness(population)
            .into_iter()
            .take(num_parents)
            .map(|i| population[i].clone())
            .collect()
    }

    fn name(&self) -> &'static str {
        "steady_state"
    }
}

/// k-way tournament with replacement; each slot goes to the fittest of `size` random draws.
#[derive(Debug, Clone, Copy)]
pub struct TournamentSelection {
    size: usize,
}

impl TournamentSelection {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }
}

impl SelectionStrategy for TournamentSelection {
    fn select(
        &self,
        population: &[Individual],
        num_parents: usize,
        rng: &mut StdRng,
    ) -> Vec<Individual> {
        if population.is_empty() {
            return Vec::new();
        }
        let mut selected_parents = Vec::with_capacity(num_parents);
        for _ in 0..num_parents {
            let mut winner = &population[rng.random_range(0..population.len())];
            for _ in 1..self.size {
                let contestant = &population[rng.random_range(0..population.len())];
                if contestant.fitness > winner.fitness {
                    winner = contestant;
                }
            }
            selected_parents.push(winner.clone());
        }
        selected_parents
    }

    fn name(&self) -> &'static str {
        "tournament"
    }
}

/// Produces offspring genomes from a parent pool.
///
/// Offspring `k` is bred from `parents[k % P]` and `parents[(k + 1) % P]`. With probability
/// `1 - rate` recombination is skipped and the child is a copy of the first parent.
pub trait CrossoverStrategy: Send + Sync {
    fn offspring(&self, parents: &[Individual], count: usize, rng: &mut StdRng) -> Vec<Genome>;

    fn name(&self) -> &'static str;
}

fn breed<F>(parents: &[Individual], count: usize, rate: f64, rng: &mut StdRng, mut cross: F) -> Vec<Genome>
where
    F: FnMut(&Genome, &Genome, &mut StdRng) -> Genome,
{
    if parents.is_empty() {
        warn!("crossover operator received an empty parent pool");
        return Vec::new();
    }
    (0..count)
        .map(|k| {
            let parent1 = &parents[k % parents.len()].genome;
            let parent2 = &parents[(k + 1) % parents.len()].genome;
            let child = cross(parent1, parent2, rng);
            if rng.random::<f64>() >= rate {
                parent1.clone()
            } else {
                child
            }
        })
        .collect()
}

/// Each gene comes from either parent with equal probability.
#[derive(Debug, Clone, Copy)]
pub struct UniformCrossover {
    rate: f64,
}

impl UniformCrossover {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl CrossoverStrategy for UniformCrossover {
    fn offspring(&self, parents: &[Individual], count: usize, rng: &mut StdRng) -> Vec<Genome> {
        breed(parents, count, self.rate, rng, |p1, p2, rng| {
            p1.iter()
                .zip(p2)
                .map(|(&a, &b)| if rng.random::<f64>() < 0.5 { a } else { b })
                .collect()
        })
    }

    fn name(&self) -> &'static str {
        "uniform"
    }
}

/// Head of the first parent spliced to the tail of the second at one random cut.
#[derive(Debug, Clone, Copy)]
pub struct SinglePointCrossover {
    rate: f64,
}

impl SinglePointCrossover {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl CrossoverStrategy for SinglePointCrossover {
    fn offspring(&self, parents: &[Individual], count: usize, rng: &mut StdRng) -> Vec<Genome> {
        breed(parents, count, self.rate, rng, |p1, p2, rng| {
            // allows taking none, all, and everything in between
            let cut = rng.random_range(0..=p1.len());
            p1[..cut].iter().chain(&p2[cut..]).copied().collect()
        })
    }

    fn name(&self) -> &'static str {
        "single_point"
    }
}

/// Alters a freshly bred genome in place.
pub trait MutationStrategy: Send + Sync {
    fn mutate(&self, genome: &mut Genome, rng: &mut StdRng);

    fn name(&self) -> &'static str;
}

/// Per-gene probabilistic bit flip
#[derive(Debug, Clone, Copy)]
pub struct BitFlipMutation {
    rate: f64,
}

impl BitFlipMutation {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl MutationStrategy for BitFlipMutation {
    fn mutate(&self, genome: &mut Genome, rng: &mut StdRng) {
        genome.iter_mut().for_each(|gene| {
            if rng.random::<f64>() < self.rate {
                *gene = !*gene;
            }
        });
    }

    fn name(&self) -> &'static str {
        "bit_flip"
    }
}

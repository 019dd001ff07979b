use std::collections::BTreeSet;

use crate::catalog::Product;
use crate::config::ScoringConfig;
use crate::profile::{PreferenceMode, TasteProfile};
use crate::scoring::AffinityModel;

/// Positions (gene indices) of the candidates that match the active mode's relevance rule.
///
/// Built once per run over the price-filtered candidates and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelevantIndex {
    positions: BTreeSet<usize>,
}

impl RelevantIndex {
    pub fn build(candidates: &[Product], profile: &TasteProfile, mode: &PreferenceMode) -> Self {
        let positions = candidates
            .iter()
            .enumerate()
            .filter(|(_, p)| mode.is_relevant(&p.tags, profile))
            .map(|(i, _)| i)
            .collect();
        Self { positions }
    }

    pub fn contains(&self, position: usize) -> bool {
        self.positions.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions.iter().copied()
    }
}

/// The three terms that make up a solution's fitness
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessBreakdown {
    pub affinity: f64,
    pub non_matching: usize,
    pub missing_relevant: usize,
    pub fitness: f64,
}

/// Fitness of an inclusion vector over the candidates.
///
/// `fitness = Σ affinity(selected) - penalty_non_match * |selected with zero affinity|
///            - penalty_missing_relevant * |relevant not selected|`
///
/// Per-candidate affinities are computed up front, so evaluation is a single pass over the
/// genome with no allocation and is safe to run from many threads at once.
#[derive(Debug, Clone)]
pub struct SubsetFitness {
    affinities: Vec<f64>,
    relevant: RelevantIndex,
    relevant_mask: Vec<bool>,
    penalty_non_match: f64,
    penalty_missing_relevant: f64,
}

impl SubsetFitness {
    pub fn new(
        candidates: &[Product],
        profile: &TasteProfile,
        mode: &PreferenceMode,
        model: &dyn AffinityModel,
        scoring: &ScoringConfig,
    ) -> Self {
        let affinities = candidates
            .iter()
            .map(|p| model.score(&p.tags, profile, mode).score)
            .collect();
        let relevant = RelevantIndex::build(candidates, profile, mode);
        let mut relevant_mask = vec![false; candidates.len()];
        for position in relevant.iter() {
            relevant_mask[position] = true;
        }
        Self {
            affinities,
            relevant,
            relevant_mask,
            penalty_non_match: scoring.penalty_non_match,
            penalty_missing_relevant: scoring.penalty_missing_relevant,
        }
    }

    pub fn genome_len(&self) -> usize {
        self.affinities.len()
    }

    pub fn relevant(&self) -> &RelevantIndex {
        &self.relevant
    }

    pub fn affinity_of(&self, position: usize) -> f64 {
        self.affinities[position]
    }

    pub fn evaluate(&self, genome: &[bool]) -> f64 {
        self.breakdown(genome).fitness
    }

    pub fn breakdown(&self, genome: &[bool]) -> FitnessBreakdown {
        debug_assert_eq!(genome.len(), self.affinities.len());
        let mut affinity = 0.0;
        let mut non_matching = 0;
        let mut missing_relevant = 0;

        for ((&selected, &score), &relevant) in genome
            .iter()
            .zip(&self.affinities)
            .zip(&self.relevant_mask)
        {
            if selected {
                if score > 0.0 {
                    affinity += score;
                } else {
                    non_matching += 1;
                }
            } else if relevant {
                missing_relevant += 1;
            }
        }

        let fitness = affinity
            - self.penalty_non_match * non_matching as f64
            - self.penalty_missing_relevant * missing_relevant as f64;
        FitnessBreakdown {
            affinity,
            non_matching,
            missing_relevant,
            fitness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, PriceRange};
    use crate::scoring::{AnyMatchAffinity, FacetWeights};

    fn get_scoring_config() -> ScoringConfig {
        ScoringConfig {
            artist_weight: 8.0,
            genre_weight: 10.0,
            penalty_non_match: 5.0,
            penalty_missing_relevant: 2.0,
            facet_weights: FacetWeights::default(),
        }
    }

    fn profile() -> TasteProfile {
        TasteProfile::new(vec!["tool"], vec!["metal"], vec![], vec![])
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Product::new("A", 20.0, &["tool"]),
            Product::new("B", 80.0, &["metal"]),
            Product::new("C", 20.0, &["pop"]),
        ])
    }

    fn fitness_for(mode: PreferenceMode, range: PriceRange) -> SubsetFitness {
        let scoring = get_scoring_config();
        let candidates = catalog().filter_by_price(&range);
        let model = AnyMatchAffinity::new(&scoring);
        SubsetFitness::new(candidates.products(), &profile(), &mode, &model, &scoring)
    }

    #[test]
    fn test_relevant_index_is_per_mode() {
        let products = catalog().into_products();
        let artist = RelevantIndex::build(&products, &profile(), &PreferenceMode::Artist);
        let genre = RelevantIndex::build(&products, &profile(), &PreferenceMode::Genre);
        let balanced = RelevantIndex::build(&products, &profile(), &PreferenceMode::Balanced);

        assert_eq!(artist.iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(genre.iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(balanced.iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_ne!(artist, genre);
    }

    #[test]
    fn test_relevant_index_over_filtered_candidates() {
        let fitness = fitness_for(PreferenceMode::Balanced, PriceRange::new(Some(0.0), Some(50.0)));
        // B is priced out, so only A (position 0) remains relevant
        assert_eq!(fitness.genome_len(), 2);
        assert_eq!(fitness.relevant().iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_fitness_terms() {
        let fitness = fitness_for(PreferenceMode::Balanced, PriceRange::new(Some(0.0), Some(50.0)));

        assert_eq!(fitness.evaluate(&[true, false]), 8.0);
        assert_eq!(fitness.evaluate(&[true, true]), 3.0);
        assert_eq!(fitness.evaluate(&[false, false]), -2.0);
        assert_eq!(fitness.evaluate(&[false, true]), -7.0);

        let b = fitness.breakdown(&[false, true]);
        assert_eq!(b.affinity, 0.0);
        assert_eq!(b.non_matching, 1);
        assert_eq!(b.missing_relevant, 1);
    }

    #[test]
    fn test_unknown_mode_penalizes_every_selection() {
        let fitness = fitness_for(
            PreferenceMode::Unknown("nope".into()),
            PriceRange::unbounded(),
        );
        assert!(fitness.relevant().is_empty());
        assert_eq!(fitness.evaluate(&[false, false, false]), 0.0);
        assert_eq!(fitness.evaluate(&[true, true, false]), -10.0);
    }
}

//! Offline scoring of a recommendation against the full catalog.
//!
//! Relevance here is the same rule the engine uses to build its relevant index, so a perfect
//! run in a given mode scores 100% precision and 100% coverage.

pub mod benchmark;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::{Catalog, PriceRange, Product};
use crate::evolution::Recommendation;
use crate::profile::{PreferenceMode, TasteProfile};

/// Quality report for one recommendation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Percentage of selected rows that are relevant; 0 when nothing was selected
    pub precision: f64,
    /// Percentage of in-range relevant rows that were selected; 100 when there were none
    pub coverage: f64,
    /// Relevant, in range, not selected
    pub missing_relevant: Vec<String>,
    /// Relevant but priced outside the range
    pub missing_relevant_out_of_price: Vec<String>,
    /// Artist mode only: in-range rows matching the profile's genres that were not selected
    pub genre_mismatched: Vec<String>,
    /// Genre mode only: in-range rows matching the profile's artists that were not selected
    pub artist_mismatched: Vec<String>,
}

impl Metrics {
    pub fn total_missing(&self) -> usize {
        self.missing_relevant.len() + self.missing_relevant_out_of_price.len()
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64 * 100.0
}

fn names<'p>(products: impl Iterator<Item = &'p Product>) -> Vec<String> {
    products.map(|p| p.name.clone()).collect()
}

/// Scores `selected` against the full catalog.
///
/// Selected rows are matched to catalog rows by product id, so `selected` must come from
/// `full_catalog` (directly or via its price-filtered view).
pub fn evaluate(
    selected: &[Product],
    full_catalog: &Catalog,
    profile: &TasteProfile,
    price_range: &PriceRange,
    mode: &PreferenceMode,
) -> Metrics {
    let precision = if selected.is_empty() {
        0.0
    } else {
        let relevant = selected
            .iter()
            .filter(|p| mode.is_relevant(&p.tags, profile))
            .count();
        percentage(relevant, selected.len())
    };

    let selected_ids: HashSet<usize> = selected.iter().map(|p| p.id).collect();
    let (in_range, out_of_range): (Vec<&Product>, Vec<&Product>) = full_catalog
        .iter()
        .filter(|p| mode.is_relevant(&p.tags, profile))
        .partition(|p| price_range.contains(p.price));

    let in_range_ids: HashSet<usize> = in_range.iter().map(|p| p.id).collect();
    let covered = selected
        .iter()
        .filter(|p| in_range_ids.contains(&p.id))
        .count();
    let coverage = if in_range.is_empty() {
        100.0
    } else {
        percentage(covered, in_range.len())
    };

    let unselected_in_range: Vec<&Product> = full_catalog
        .iter()
        .filter(|p| price_range.contains(p.price) && !selected_ids.contains(&p.id))
        .collect();
    let (genre_mismatched, artist_mismatched) = match mode {
        PreferenceMode::Artist => (
            names(
                unselected_in_range
                    .iter()
                    .copied()
                    .filter(|p| profile.matches_genre(&p.tags)),
            ),
            Vec::new(),
        ),
        PreferenceMode::Genre => (
            Vec::new(),
            names(
                unselected_in_range
                    .iter()
                    .copied()
                    .filter(|p| profile.matches_artist(&p.tags)),
            ),
        ),
        _ => (Vec::new(), Vec::new()),
    };

    Metrics {
        precision,
        coverage,
        missing_relevant: names(
            in_range
                .iter()
                .copied()
                .filter(|p| !selected_ids.contains(&p.id)),
        ),
        missing_relevant_out_of_price: names(out_of_range.into_iter()),
        genre_mismatched,
        artist_mismatched,
    }
}

fn print_names(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{} ({}):", label, items.len());
    for name in items {
        println!("   - {}", name);
    }
}

/// Prints the selected products and their metrics.
pub fn print_recommendation(recommendation: &Recommendation, metrics: &Metrics) {
    println!("\n=== RECOMMENDATION ===");
    println!(
        "{:<5} | {:<40} | {:>9} | {}",
        "#", "Product", "Price", "Tags"
    );
    println!("{}", "-".repeat(90));
    for (i, p) in recommendation.products.iter().enumerate() {
        let tags: Vec<&str> = p.tags.iter().map(String::as_str).collect();
        println!(
            "{:<5} | {:<40} | {:>9.2} | {}",
            i + 1,
            p.name,
            p.price,
            tags.join(", ")
        );
    }

    println!("\n=== METRICS ===");
    println!("   Precision : {:.1}%", metrics.precision);
    println!("   Coverage  : {:.1}%", metrics.coverage);
    match recommendation.best_fitness {
        Some(f) => println!("   Fitness   : {:.2}", f),
        None => println!("   Fitness   : n/a"),
    }
    println!(
        "   Run       : {} generations, {} evaluations, stopped by {:?}",
        recommendation.generations_completed,
        recommendation.fitness_evaluations,
        recommendation.stop_reason
    );

    print_names("Relevant but not selected", &metrics.missing_relevant);
    print_names(
        "Relevant but outside the price range",
        &metrics.missing_relevant_out_of_price,
    );
    print_names("Genre matches skipped in artist mode", &metrics.genre_mismatched);
    print_names("Artist matches skipped in genre mode", &metrics.artist_mismatched);
}

//! Recommendation export for persisting a run together with everything needed to replay it.
//!
//! An export records the GA and scoring configuration, the request (profile, price range,
//! mode), the seed, and a fingerprint of the catalog it was computed against. Re-running the
//! same request with the same seed against a catalog with a matching fingerprint reproduces
//! the recorded products.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::catalog::{Catalog, PriceRange, Product};
use crate::config::{GaConfig, ScoringConfig};
use crate::evaluation::Metrics;
use crate::evolution::{Recommendation, StopReason};
use crate::profile::{PreferenceMode, TasteProfile};

pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to access export file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to (de)serialize export: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// The request a recommendation answered
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RequestSnapshot {
    /// Name of the profile in the config, if it came from one
    pub profile_name: Option<String>,
    pub profile: TasteProfile,
    pub price_range: PriceRange,
    pub mode: PreferenceMode,
}

/// Summary of the search that produced the products
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSummary {
    pub seed: Option<u64>,
    pub best_fitness: Option<f64>,
    pub generations_completed: usize,
    pub fitness_evaluations: usize,
    pub stop_reason: StopReason,
    pub candidate_count: usize,
    pub relevant_count: usize,
    pub fitness_trace: Vec<f64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RecommendationExport {
    /// Schema version for forward/backward compatibility
    pub schema_version: String,
    /// Unix timestamp when export was generated
    pub generated_at: i64,
    pub ga: GaConfig,
    pub scoring: ScoringConfig,
    pub request: RequestSnapshot,
    /// Fingerprint of the full catalog the run was computed against
    pub catalog_fingerprint: String,
    pub run: RunSummary,
    pub metrics: Metrics,
    pub products: Vec<Product>,
}

impl RecommendationExport {
    /// Creates a new export from a finished recommendation.
    ///
    /// # Arguments
    /// * `recommendation` - The engine's output; its products are moved into the export
    /// * `metrics` - Evaluation of `recommendation` against `catalog`
    /// * `catalog` - The full catalog, fingerprinted for later verification
    /// * `ga`, `scoring` - Configuration the run used
    /// * `request` - Profile, price range and mode of the run
    pub fn new(
        recommendation: Recommendation,
        metrics: Metrics,
        catalog: &Catalog,
        ga: &GaConfig,
        scoring: &ScoringConfig,
        request: RequestSnapshot,
    ) -> Self {
        let run = RunSummary {
            seed: recommendation.seed,
            best_fitness: recommendation.best_fitness,
            generations_completed: recommendation.generations_completed,
            fitness_evaluations: recommendation.fitness_evaluations,
            stop_reason: recommendation.stop_reason,
            candidate_count: recommendation.candidate_count,
            relevant_count: recommendation.relevant_count,
            fitness_trace: recommendation.fitness_trace,
        };
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().timestamp(),
            ga: ga.clone(),
            scoring: scoring.clone(),
            request,
            catalog_fingerprint: catalog.fingerprint(),
            run,
            metrics,
            products: recommendation.products,
        }
    }

    /// True when `catalog` has the same content as the one this export was computed against.
    pub fn matches_catalog(&self, catalog: &Catalog) -> bool {
        catalog.fingerprint() == self.catalog_fingerprint
    }

    /// GA configuration with the recorded seed pinned, for replaying the run.
    pub fn replay_config(&self) -> GaConfig {
        let mut ga = self.ga.clone();
        ga.seed = self.run.seed;
        ga
    }
}

/// Writes a recommendation export to a JSON file.
pub fn write_export_to_json(
    export: &RecommendationExport,
    output_path: &Path,
) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(export)?;
    std::fs::write(output_path, json)?;
    Ok(())
}

/// Reads a recommendation export from a JSON file.
pub fn read_export_from_json(input_path: &Path) -> Result<RecommendationExport, ExportError> {
    let content = std::fs::read_to_string(input_path)?;
    let export: RecommendationExport = serde_json::from_str(&content)?;
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AffinityKind, CrossoverKind, SelectionKind};
    use crate::evaluation::evaluate;
    use crate::evolution::SubsetEngine;
    use crate::scoring::FacetWeights;
    use tempfile::NamedTempFile;

    fn create_test_config() -> (GaConfig, ScoringConfig) {
        (
            GaConfig {
                num_generations: 30,
                num_parents_mating: 4,
                sol_per_pop: 10,
                mutation_percent_genes: 10.0,
                crossover_probability: 70.0,
                keep_elitism: 1,
                stagnation_limit: 15,
                min_selected: 0,
                seed: None,
                selection: SelectionKind::SteadyState,
                tournament_size: 3,
                crossover: CrossoverKind::Uniform,
                affinity_model: AffinityKind::AnyMatch,
            },
            ScoringConfig {
                artist_weight: 8.0,
                genre_weight: 10.0,
                penalty_non_match: 5.0,
                penalty_missing_relevant: 2.0,
                facet_weights: FacetWeights::default(),
            },
        )
    }

    fn create_test_catalog() -> Catalog {
        Catalog::new(vec![
            Product::new("Tool tee", 20.0, &["tool", "metal"]),
            Product::new("Pop vinyl", 30.0, &["pop"]),
            Product::new("Metal patch", 12.0, &["metal", "patch"]),
            Product::new("Jazz mug", 9.0, &["jazz"]),
        ])
    }

    fn create_test_export(catalog: &Catalog) -> RecommendationExport {
        let (ga, scoring) = create_test_config();
        let profile = TasteProfile::new(vec!["tool"], vec!["metal"], vec![], vec![]);
        let range = PriceRange::unbounded();
        let mode = PreferenceMode::Genre;
        let engine = SubsetEngine::new(&ga, &scoring, catalog, &profile, range, mode.clone())
            .unwrap();
        let recommendation = engine.recommend();
        let metrics = evaluate(&recommendation.products, catalog, &profile, &range, &mode);
        RecommendationExport::new(
            recommendation,
            metrics,
            catalog,
            &ga,
            &scoring,
            RequestSnapshot {
                profile_name: Some("metal".to_string()),
                profile,
                price_range: range,
                mode,
            },
        )
    }

    #[test]
    fn test_export_creation() {
        let catalog = create_test_catalog();
        let export = create_test_export(&catalog);

        assert_eq!(export.schema_version, SCHEMA_VERSION);
        assert!(export.run.seed.is_some());
        assert_eq!(export.run.candidate_count, 4);
        assert_eq!(export.run.relevant_count, 2);
        assert!(export.matches_catalog(&catalog));
        assert_eq!(export.metrics.precision, 100.0);
    }

    #[test]
    fn test_export_serialization() {
        let catalog = create_test_catalog();
        let export = create_test_export(&catalog);

        let temp_file = NamedTempFile::new().unwrap();
        write_export_to_json(&export, temp_file.path()).unwrap();

        let loaded = read_export_from_json(temp_file.path()).unwrap();
        assert_eq!(loaded.schema_version, export.schema_version);
        assert_eq!(loaded.products, export.products);
        assert_eq!(loaded.request.mode, PreferenceMode::Genre);
        assert_eq!(loaded.run.stop_reason, export.run.stop_reason);
        assert!(loaded.matches_catalog(&catalog));
    }

    #[test]
    fn test_replay_reproduces_products() {
        let catalog = create_test_catalog();
        let export = create_test_export(&catalog);

        let ga = export.replay_config();
        let replayed = SubsetEngine::new(
            &ga,
            &export.scoring,
            &catalog,
            &export.request.profile,
            export.request.price_range,
            export.request.mode.clone(),
        )
        .unwrap()
        .recommend();

        assert_eq!(replayed.products, export.products);
        assert_eq!(replayed.fitness_trace, export.run.fitness_trace);
    }

    #[test]
    fn test_fingerprint_mismatch_detected() {
        let catalog = create_test_catalog();
        let export = create_test_export(&catalog);

        let mut products = catalog.into_products();
        products[0].price = 21.0;
        assert!(!export.matches_catalog(&Catalog::new(products)));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_export_from_json(Path::new("/nonexistent/export.json"));
        assert!(matches!(result, Err(ExportError::IoError(_))));
    }
}

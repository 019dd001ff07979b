use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;

use super::evaluate;
use crate::catalog::{Catalog, PriceRange};
use crate::config::Config;
use crate::evolution::{EngineError, StopReason, SubsetEngine};
use crate::export::ExportError;
use crate::profile::{PreferenceMode, TasteProfile};

/// One cell of the profile x price range x mode matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRow {
    pub profile: String,
    pub price_range: PriceRange,
    pub mode: PreferenceMode,
    pub precision: f64,
    pub coverage: f64,
    pub selected: usize,
    pub missing_relevant: usize,
    pub missing_relevant_out_of_price: usize,
    pub genre_mismatched: usize,
    pub artist_mismatched: usize,
    pub best_fitness: Option<f64>,
    pub generations: usize,
    pub stop_reason: StopReason,
    pub duration_secs: f64,
}

/// Serializable wrapper for a benchmark run
#[derive(Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Tracks version of schema
    pub schema_version: String,
    /// Unix timestamp for when the file was generated
    pub generated_at: i64,
    pub catalog_fingerprint: String,
    pub rows: Vec<BenchmarkRow>,
}

/// Runs one recommendation per (profile, price range, mode) and scores each.
///
/// Rows come out in profile-name order, then in the configured range and mode order.
pub fn run_benchmark(config: &Config, catalog: &Catalog) -> Result<Vec<BenchmarkRow>, EngineError> {
    let profiles: Vec<(&str, &TasteProfile)> = config
        .profiles
        .iter()
        .map(|(name, profile)| (name.as_str(), profile))
        .collect();
    run_matrix(
        config,
        catalog,
        &profiles,
        &config.benchmark.price_ranges,
        &config.benchmark.modes,
    )
}

pub fn run_matrix(
    config: &Config,
    catalog: &Catalog,
    profiles: &[(&str, &TasteProfile)],
    price_ranges: &[PriceRange],
    modes: &[PreferenceMode],
) -> Result<Vec<BenchmarkRow>, EngineError> {
    let total = profiles.len() * price_ranges.len() * modes.len();
    info!("Running benchmark matrix of {} cases", total);

    let mut rows = Vec::with_capacity(total);
    for &(name, profile) in profiles {
        for range in price_ranges {
            for mode in modes {
                let engine = SubsetEngine::new(
                    &config.ga,
                    &config.scoring,
                    catalog,
                    profile,
                    *range,
                    mode.clone(),
                )?;
                let start = Instant::now();
                let recommendation = engine.recommend();
                let duration_secs = start.elapsed().as_secs_f64();
                let metrics = evaluate(&recommendation.products, catalog, profile, range, mode);

                info!(
                    "[{}] {} {}: precision={:.1}% coverage={:.1}% in {:.3}s",
                    name, range, mode, metrics.precision, metrics.coverage, duration_secs
                );
                rows.push(BenchmarkRow {
                    profile: name.to_string(),
                    price_range: *range,
                    mode: mode.clone(),
                    precision: metrics.precision,
                    coverage: metrics.coverage,
                    selected: recommendation.products.len(),
                    missing_relevant: metrics.missing_relevant.len(),
                    missing_relevant_out_of_price: metrics.missing_relevant_out_of_price.len(),
                    genre_mismatched: metrics.genre_mismatched.len(),
                    artist_mismatched: metrics.artist_mismatched.len(),
                    best_fitness: recommendation.best_fitness,
                    generations: recommendation.generations_completed,
                    stop_reason: recommendation.stop_reason,
                    duration_secs,
                });
            }
        }
    }
    Ok(rows)
}

/// Prints the benchmark matrix as a table, followed by per-mode averages.
pub fn print_benchmark_results(rows: &[BenchmarkRow]) {
    println!("\n=== BENCHMARK RESULTS ===");
    println!(
        "{:<12} | {:<16} | {:<8} | {:>9} | {:>9} | {:>4} | {:>7} | {:>7} | {:>10} | {:>5} | {:>8}",
        "Profile",
        "Price Range",
        "Mode",
        "Precision",
        "Coverage",
        "Sel",
        "Missing",
        "OutPrice",
        "Fitness",
        "Gens",
        "Time (s)"
    );
    println!("{}", "-".repeat(124));
    for r in rows {
        let fitness = r
            .best_fitness
            .map(|f| format!("{:.2}", f))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<12} | {:<16} | {:<8} | {:>8.1}% | {:>8.1}% | {:>4} | {:>7} | {:>8} | {:>10} | {:>5} | {:>8.3}",
            r.profile,
            r.price_range.to_string(),
            r.mode.to_string(),
            r.precision,
            r.coverage,
            r.selected,
            r.missing_relevant,
            r.missing_relevant_out_of_price,
            fitness,
            r.generations,
            r.duration_secs
        );
    }

    println!("\nAverages by mode:");
    let mut modes: Vec<&PreferenceMode> = Vec::new();
    for r in rows {
        if !modes.contains(&&r.mode) {
            modes.push(&r.mode);
        }
    }
    for mode in modes {
        let of_mode: Vec<&BenchmarkRow> = rows.iter().filter(|r| &r.mode == mode).collect();
        let n = of_mode.len() as f64;
        println!(
            "   {:<8}: precision {:.1}% | coverage {:.1}% | {:.3}s per run",
            mode.to_string(),
            of_mode.iter().map(|r| r.precision).sum::<f64>() / n,
            of_mode.iter().map(|r| r.coverage).sum::<f64>() / n,
            of_mode.iter().map(|r| r.duration_secs).sum::<f64>() / n
        );
    }
}

/// Writes the rows to `path` as a versioned JSON report.
pub fn write_benchmark_report(
    rows: &[BenchmarkRow],
    catalog: &Catalog,
    path: &Path,
) -> Result<(), ExportError> {
    info!("Writing benchmark report to '{}'", path.display());
    let report = BenchmarkReport {
        schema_version: "1.0.0".to_string(), // bump when adding new fields
        generated_at: chrono::Utc::now().timestamp(),
        catalog_fingerprint: catalog.fingerprint(),
        rows: rows.to_vec(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn read_benchmark_report(path: &Path) -> Result<BenchmarkReport, ExportError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Product;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
[catalog]
file_path = "unused.csv"

[ga]
num_generations = 40
num_parents_mating = 4
sol_per_pop = 12
mutation_percent_genes = 10.0
crossover_probability = 70.0
keep_elitism = 1
stagnation_limit = 25
seed = 7

[scoring]
artist_weight = 8.0
genre_weight = 10.0
penalty_non_match = 5.0
penalty_missing_relevant = 2.0

[profiles.metal]
artists = ["tool"]
genres = ["metal"]

[profiles.pop]
artists = ["dua lipa"]
genres = ["pop"]

[[benchmark.price_ranges]]
min_price = 0.0
max_price = 50.0

[[benchmark.price_ranges]]
"#;

    fn get_test_config() -> Config {
        toml::from_str(CONFIG).unwrap()
    }

    fn get_test_catalog() -> Catalog {
        Catalog::new(vec![
            Product::new("Tool tee", 20.0, &["tool", "metal"]),
            Product::new("Metal patch", 80.0, &["metal"]),
            Product::new("Pop vinyl", 30.0, &["pop"]),
            Product::new("Dua poster", 15.0, &["dua lipa"]),
        ])
    }

    #[test]
    fn test_matrix_shape_and_order() {
        let config = get_test_config();
        let catalog = get_test_catalog();
        let rows = run_benchmark(&config, &catalog).unwrap();

        // 2 profiles x 2 ranges x 3 default modes
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].profile, "metal");
        assert_eq!(rows[0].mode, PreferenceMode::Artist);
        assert_eq!(rows[0].price_range, PriceRange::new(Some(0.0), Some(50.0)));
        assert_eq!(rows[6].profile, "pop");
        for row in &rows {
            assert!((0.0..=100.0).contains(&row.precision));
            assert!((0.0..=100.0).contains(&row.coverage));
        }
    }

    #[test]
    fn test_balanced_run_covers_everything_in_range() {
        let config = get_test_config();
        let catalog = get_test_catalog();
        let profile = config.profiles["metal"].clone();
        let rows = run_matrix(
            &config,
            &catalog,
            &[("metal", &profile)],
            &[PriceRange::new(Some(0.0), Some(50.0))],
            &[PreferenceMode::Balanced],
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].precision, 100.0);
        assert_eq!(rows[0].coverage, 100.0);
        assert_eq!(rows[0].missing_relevant_out_of_price, 1);
    }

    #[test]
    fn test_invalid_config_aborts_matrix() {
        let mut config = get_test_config();
        config.ga.num_parents_mating = 0;
        let result = run_benchmark(&config, &get_test_catalog());
        assert!(matches!(result, Err(EngineError::InvalidGaConfig(_))));
    }

    #[test]
    fn test_report_written_and_read_back() {
        let config = get_test_config();
        let catalog = get_test_catalog();
        let rows = run_benchmark(&config, &catalog).unwrap();

        let file = NamedTempFile::new().unwrap();
        write_benchmark_report(&rows, &catalog, file.path()).unwrap();
        let report = read_benchmark_report(file.path()).unwrap();

        assert_eq!(report.schema_version, "1.0.0");
        assert_eq!(report.catalog_fingerprint, catalog.fingerprint());
        assert_eq!(report.rows.len(), rows.len());
        assert_eq!(report.rows[0].profile, rows[0].profile);
        assert_eq!(report.rows[0].mode, rows[0].mode);
    }
}

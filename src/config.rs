use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::catalog::PriceRange;
use crate::profile::{PreferenceMode, TasteProfile};
use crate::scoring::FacetWeights;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub ga: GaConfig,
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub profiles: BTreeMap<String, TasteProfile>,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CatalogConfig {
    pub file_path: String,
    /// Drop rows with an unusable price instead of failing the load
    #[serde(default)]
    pub skip_invalid_rows: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    SteadyState,
    Tournament,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverKind {
    Uniform,
    SinglePoint,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AffinityKind {
    AnyMatch,
    FacetCardinality,
}

/// Parameters of the genetic search.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GaConfig {
    pub num_generations: usize,
    pub num_parents_mating: usize,
    pub sol_per_pop: usize,
    /// Per-gene flip probability, as a percentage
    pub mutation_percent_genes: f64,
    /// Probability that an offspring is recombined rather than copied, as a percentage
    pub crossover_probability: f64,
    pub keep_elitism: usize,
    /// Consecutive generations without strict improvement before stopping; 0 disables
    pub stagnation_limit: usize,
    /// Lower bound on selected genes for each initial solution
    #[serde(default)]
    pub min_selected: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_selection")]
    pub selection: SelectionKind,
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    #[serde(default = "default_crossover")]
    pub crossover: CrossoverKind,
    #[serde(default = "default_affinity_model")]
    pub affinity_model: AffinityKind,
}

fn default_selection() -> SelectionKind {
    SelectionKind::SteadyState
}

fn default_tournament_size() -> usize {
    3
}

fn default_crossover() -> CrossoverKind {
    CrossoverKind::Uniform
}

fn default_affinity_model() -> AffinityKind {
    AffinityKind::AnyMatch
}

/// Affinity weights and fitness penalties.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub artist_weight: f64,
    pub genre_weight: f64,
    pub penalty_non_match: f64,
    pub penalty_missing_relevant: f64,
    #[serde(default)]
    pub facet_weights: FacetWeights,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub preference_mode: PreferenceMode,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl RunConfig {
    pub fn price_range(&self) -> PriceRange {
        PriceRange::new(self.min_price, self.max_price)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BenchmarkConfig {
    #[serde(default = "default_price_ranges")]
    pub price_ranges: Vec<PriceRange>,
    #[serde(default = "default_modes")]
    pub modes: Vec<PreferenceMode>,
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            price_ranges: default_price_ranges(),
            modes: default_modes(),
            output: None,
        }
    }
}

fn default_price_ranges() -> Vec<PriceRange> {
    vec![PriceRange::unbounded()]
}

fn default_modes() -> Vec<PreferenceMode> {
    vec![
        PreferenceMode::Artist,
        PreferenceMode::Genre,
        PreferenceMode::Balanced,
    ]
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Checks every section; the first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ga.validate().map_err(ConfigError::Invalid)?;
        self.scoring.validate().map_err(ConfigError::Invalid)?;

        if self.catalog.file_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "catalog.file_path must not be empty".to_string(),
            ));
        }
        for (name, price) in [
            ("run.min_price", self.run.min_price),
            ("run.max_price", self.run.max_price),
        ] {
            if let Some(p) = price {
                if !p.is_finite() {
                    return Err(ConfigError::Invalid(format!("{} must be finite", name)));
                }
            }
        }
        if let Some(profile) = &self.run.profile {
            if !self.profiles.contains_key(profile) {
                return Err(ConfigError::Invalid(format!(
                    "run.profile '{}' is not defined in [profiles]",
                    profile
                )));
            }
        }
        Ok(())
    }

    /// The profile named by `name`, or by `run.profile` when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Option<(&str, &TasteProfile)> {
        let wanted = name.or(self.run.profile.as_deref())?;
        self.profiles
            .get_key_value(wanted)
            .map(|(k, v)| (k.as_str(), v))
    }
}

fn check_percentage(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(format!("{} must be within [0, 100], got {}", name, value));
    }
    Ok(())
}

fn check_weight(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!(
            "{} must be a non-negative finite number, got {}",
            name, value
        ));
    }
    Ok(())
}

impl GaConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sol_per_pop == 0 {
            return Err("sol_per_pop must be greater than zero".to_string());
        }
        if self.num_parents_mating == 0 || self.num_parents_mating > self.sol_per_pop {
            return Err(format!(
                "num_parents_mating must be within [1, sol_per_pop={}], got {}",
                self.sol_per_pop, self.num_parents_mating
            ));
        }
        if self.keep_elitism > self.sol_per_pop {
            return Err(format!(
                "keep_elitism ({}) cannot exceed sol_per_pop ({})",
                self.keep_elitism, self.sol_per_pop
            ));
        }
        if self.selection == SelectionKind::Tournament && self.tournament_size == 0 {
            return Err("tournament_size must be greater than zero".to_string());
        }
        check_percentage("mutation_percent_genes", self.mutation_percent_genes)?;
        check_percentage("crossover_probability", self.crossover_probability)?;
        Ok(())
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_percent_genes / 100.0
    }

    pub fn crossover_rate(&self) -> f64 {
        self.crossover_probability / 100.0
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_weight("artist_weight", self.artist_weight)?;
        check_weight("genre_weight", self.genre_weight)?;
        check_weight("penalty_non_match", self.penalty_non_match)?;
        check_weight("penalty_missing_relevant", self.penalty_missing_relevant)?;
        let names = [
            "shared_genres",
            "shared_artists",
            "only_top_genres",
            "only_top_artists",
            "only_recent_genres",
            "only_recent_artists",
        ];
        for (name, value) in names.iter().zip(self.facet_weights.values()) {
            check_weight(&format!("facet_weights.{}", name), value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[catalog]
file_path = "data/products.csv"

[ga]
num_generations = 50
num_parents_mating = 10
sol_per_pop = 35
mutation_percent_genes = 10.0
crossover_probability = 70.0
keep_elitism = 1
stagnation_limit = 15
seed = 7

[scoring]
artist_weight = 8.0
genre_weight = 10.0
penalty_non_match = 5.0
penalty_missing_relevant = 2.0

[run]
min_price = 12.0
max_price = 51.0
preference_mode = "Genre"
profile = "metal"

[profiles.metal]
artists = ["tool"]
genres = ["metal"]

[benchmark]
modes = ["artist", "balanced"]

[[benchmark.price_ranges]]
min_price = 22.0
max_price = 37.0

[[benchmark.price_ranges]]
"#;

    fn get_test_config() -> Config {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let config = get_test_config();
        assert_eq!(config.ga.sol_per_pop, 35);
        assert_eq!(config.ga.seed, Some(7));
        assert_eq!(config.ga.selection, SelectionKind::SteadyState);
        assert_eq!(config.ga.crossover, CrossoverKind::Uniform);
        assert_eq!(config.ga.affinity_model, AffinityKind::AnyMatch);
        assert_eq!(config.ga.min_selected, 0);
        assert_eq!(config.run.preference_mode, PreferenceMode::Genre);
        assert_eq!(config.scoring.facet_weights, FacetWeights::default());
        assert_eq!(config.benchmark.price_ranges.len(), 2);
        assert_eq!(
            config.benchmark.price_ranges[1],
            PriceRange::unbounded()
        );
        assert_eq!(config.benchmark.modes.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), SAMPLE).unwrap();
        let config = Config::load(file.path()).unwrap();
        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "metal");
        assert!(profile.top_artists.contains("tool"));
    }

    #[test]
    fn test_rejects_empty_population() {
        let mut config = get_test_config();
        config.ga.sol_per_pop = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_too_many_parents_or_elites() {
        let mut config = get_test_config();
        config.ga.num_parents_mating = 36;
        assert!(config.validate().is_err());

        let mut config = get_test_config();
        config.ga.keep_elitism = 36;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_percentages() {
        let mut config = get_test_config();
        config.ga.crossover_probability = 140.0;
        assert!(config.validate().is_err());

        let mut config = get_test_config();
        config.ga.mutation_percent_genes = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_weights() {
        let mut config = get_test_config();
        config.scoring.penalty_non_match = -5.0;
        assert!(config.validate().is_err());

        let mut config = get_test_config();
        config.scoring.facet_weights.only_top_artists = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_undefined_run_profile() {
        let mut config = get_test_config();
        config.run.profile = Some("jazz".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_mode_is_accepted() {
        let mut config = get_test_config();
        config.run.preference_mode = PreferenceMode::parse("danceable");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rates_are_fractions() {
        let config = get_test_config();
        assert!((config.ga.mutation_rate() - 0.1).abs() < 1e-12);
        assert!((config.ga.crossover_rate() - 0.7).abs() < 1e-12);
    }
}

use clap::{Parser, Subcommand};
use encore::catalog::{Catalog, LoadConfig, PriceRange};
use encore::config::Config;
use encore::evaluation::benchmark::{print_benchmark_results, run_benchmark, write_benchmark_report};
use encore::evaluation::{evaluate, print_recommendation};
use encore::evolution::SubsetEngine;
use encore::export::{write_export_to_json, RecommendationExport, RequestSnapshot};
use encore::profile::{PreferenceMode, TasteProfile};
use std::path::{Path, PathBuf};
use std::process;

/// Command-line arguments for encore
#[derive(Parser, Debug)]
#[command(name = "encore")]
#[command(about = "Recommends music merchandise with a genetic algorithm")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recommend products for one profile
    Recommend {
        /// Profile name from [profiles]; defaults to run.profile
        #[arg(short, long)]
        profile: Option<String>,

        /// artist, genre or balanced; defaults to run.preference_mode
        #[arg(short, long)]
        mode: Option<String>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        /// Overrides ga.seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write a JSON export of the run
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Run every configured profile across the benchmark price ranges and modes
    Benchmark {
        /// Write a JSON report; defaults to benchmark.output
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Loads the catalog named in the config.
fn load_catalog(config: &Config) -> Result<Catalog, String> {
    log::info!("Loading catalog from '{}'...", config.catalog.file_path);
    let load_config = LoadConfig {
        skip_invalid_rows: config.catalog.skip_invalid_rows,
    };
    let catalog = Catalog::load_with_config(Path::new(&config.catalog.file_path), &load_config)
        .map_err(|e| format!("Failed to load catalog: {}", e))?;
    if catalog.is_empty() {
        log::warn!("Catalog is empty; every recommendation will be empty");
    }
    log::info!("Catalog loaded: {} products.", catalog.len());
    Ok(catalog)
}

#[allow(clippy::too_many_arguments)]
fn recommend(
    mut config: Config,
    catalog: &Catalog,
    profile: Option<String>,
    mode: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> Result<(), String> {
    if seed.is_some() {
        config.ga.seed = seed;
    }
    let (profile_name, taste): (Option<String>, TasteProfile) =
        match config.profile(profile.as_deref()) {
            Some((name, p)) => (Some(name.to_string()), p.clone()),
            None => match profile {
                Some(name) => return Err(format!("Profile '{}' is not defined", name)),
                None => return Err("No profile given and run.profile is not set".to_string()),
            },
        };
    let mode = mode
        .map(|m| PreferenceMode::parse(&m))
        .unwrap_or_else(|| config.run.preference_mode.clone());
    let price_range = PriceRange::new(
        min_price.or(config.run.min_price),
        max_price.or(config.run.max_price),
    );

    log::info!(
        "Recommending for profile '{}' in {} ({} mode)",
        profile_name.as_deref().unwrap_or("?"),
        price_range,
        mode
    );
    let engine = SubsetEngine::new(
        &config.ga,
        &config.scoring,
        catalog,
        &taste,
        price_range,
        mode.clone(),
    )
    .map_err(|e| e.to_string())?;
    let recommendation = engine.recommend();
    let metrics = evaluate(&recommendation.products, catalog, &taste, &price_range, &mode);
    print_recommendation(&recommendation, &metrics);

    let output = output.or_else(|| config.run.output.as_ref().map(PathBuf::from));
    if let Some(path) = output {
        let export = RecommendationExport::new(
            recommendation,
            metrics,
            catalog,
            &config.ga,
            &config.scoring,
            RequestSnapshot {
                profile_name,
                profile: taste,
                price_range,
                mode,
            },
        );
        write_export_to_json(&export, &path)
            .map_err(|e| format!("Failed to write export: {}", e))?;
        log::info!("Export written to '{}'", path.display());
    }
    Ok(())
}

fn benchmark(config: &Config, catalog: &Catalog, output: Option<PathBuf>) -> Result<(), String> {
    if config.profiles.is_empty() {
        return Err("No profiles defined in [profiles]".to_string());
    }
    let rows = run_benchmark(config, catalog).map_err(|e| e.to_string())?;
    print_benchmark_results(&rows);

    let output = output.or_else(|| config.benchmark.output.as_ref().map(PathBuf::from));
    if let Some(path) = output {
        write_benchmark_report(&rows, catalog, &path)
            .map_err(|e| format!("Failed to write benchmark report: {}", e))?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    log::info!("Booting encore...");

    // 1. Load and Validate Configuration
    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {}", e);
        process::exit(1);
    }
    log::info!("Configuration loaded and validated.");

    // 2. Load Catalog
    let catalog = match load_catalog(&config) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    // 3. Run
    let result = match args.command {
        Command::Recommend {
            profile,
            mode,
            min_price,
            max_price,
            seed,
            output,
        } => recommend(
            config, &catalog, profile, mode, min_price, max_price, seed, output,
        ),
        Command::Benchmark { output } => benchmark(&config, &catalog, output),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        process::exit(1);
    }
}

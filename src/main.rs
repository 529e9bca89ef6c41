//! WasteSort - Photograph an item of waste and get a disposal recommendation
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! This binary initializes:
//! - Logging infrastructure (daily rotating file, console output in debug mode)
//! - Tokio async runtime (oracle calls and background analysis tasks)
//! - Configuration loading ([`ConfigManager`])
//! - The classifier session ([`StateManager`] + [`ClassifierController`])
//!
//! # Commands
//!
//! - `classify <IMAGE>...`: Send each image to the classification oracle in turn
//! - `lookup [--location <LOC>] <QUERY>...`: Look an item up in the local rules
//!
//! # Configuration Files
//!
//! Expected in `WasteSort Data/` (override with `--config-dir`):
//! - `WasteSort Config.yaml`: Model, endpoint, API key variable, logging
//! - `WasteSort Rules.yaml`: Per-location disposal rules (written on first lookup)
//!
//! The API key is read from the environment variable named in the config
//! (`GEMINI_API_KEY` by default). A `.env` file in the working directory is loaded first.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use wastesort::config::DEFAULT_CONFIG_DIR;
use wastesort::models::{UiPhase, WasteSortSettings};
use wastesort::services::{FsPixelLoader, GeminiOracle, Lookup, LookupOutcome, RulesLookup};
use wastesort::ui::ConsolePresenter;
use wastesort::{
    APP_NAME, ClassificationOracle, ClassifierController, ConfigManager, ImageRef, Metrics,
    StateManager, VERSION,
};

#[derive(Parser)]
#[command(name = "wastesort")]
#[command(version)]
#[command(about = "Classify waste images as recycling, trash or compost")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding WasteSort Config.yaml and WasteSort Rules.yaml
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: Utf8PathBuf,

    /// Debug logging, also echoed to stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Print only the final result for each image
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one or more images with the AI oracle
    Classify {
        /// Image files to classify, in order
        #[arg(required = true)]
        images: Vec<Utf8PathBuf>,
    },

    /// Look an item description up in the local disposal rules
    Lookup {
        /// Rule set to use (defaults to the configured location)
        #[arg(short, long)]
        location: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Item description, e.g. "greasy pizza box"
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// List the locations that have rules
    Locations,
}

fn main() -> Result<ExitCode> {
    // A missing .env is fine; the key may already be in the environment
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let user_config = config_manager.load_user_config()?;
    let settings = user_config.settings;

    let debug = cli.debug || settings.debug_mode;
    let log_dir = config_manager.resolve(&settings.log_dir);
    let _guard = wastesort::logging::setup_logging(&log_dir, APP_NAME, debug, debug)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    match dotenv {
        Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
        Err(e) => tracing::debug!("No .env loaded: {}", e),
    }

    match cli.command {
        Commands::Classify { images } => run_classify(&settings, images, cli.quiet),
        Commands::Lookup {
            location,
            json,
            query,
        } => {
            let location = location.unwrap_or_else(|| settings.default_location.clone());
            run_lookup(&config_manager, &location, &query.join(" "), json)
        }
        Commands::Locations => {
            let rules = config_manager.load_rules_config()?;
            for (key, set) in &rules.locations {
                println!("{:<12} {}", key, set.source);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_oracle(settings: &WasteSortSettings) -> Option<Arc<dyn ClassificationOracle>> {
    match GeminiOracle::from_settings(settings) {
        Ok(oracle) => {
            tracing::info!("Using classification oracle {}", oracle.name());
            Some(Arc::new(oracle))
        }
        Err(e) => {
            tracing::warn!("AI classification disabled: {}", e);
            None
        }
    }
}

fn run_classify(
    settings: &WasteSortSettings,
    images: Vec<Utf8PathBuf>,
    quiet: bool,
) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("wastesort-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let metrics = Arc::new(Metrics::new());
    let state = Arc::new(StateManager::new().with_metrics(Arc::clone(&metrics)));
    let controller = ClassifierController::new(
        Arc::clone(&state),
        Arc::new(FsPixelLoader::new(settings.max_image_mb)),
        build_oracle(settings),
        Arc::clone(&metrics),
        runtime.handle().clone(),
    );
    let presenter = ConsolePresenter::new(std::io::stdout().is_terminal());

    let failures = runtime.block_on(async move {
        let printer = (!quiet).then(|| presenter.attach(&state));
        let mut failures = 0usize;

        for path in images {
            if let Some(task) = controller.submit_image(Some(ImageRef::file(path))) {
                if let Err(e) = task.await {
                    tracing::error!("Analysis task join error: {}", e);
                }
            }

            let final_state = state.snapshot();
            if quiet {
                println!("{}", presenter.render_state(&final_state));
            }
            if final_state.phase() == UiPhase::Error {
                failures += 1;
            }
        }

        // Closing the broadcast channel lets the printer drain and exit
        drop(controller);
        drop(state);
        if let Some(printer) = printer {
            if let Err(e) = printer.await {
                tracing::error!("Console printer join error: {}", e);
            }
        }

        failures
    });

    metrics.log_summary();
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    tracing::info!("Classification finished with {} failure(s)", failures);
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_lookup(
    config_manager: &ConfigManager,
    location: &str,
    query: &str,
    json: bool,
) -> Result<ExitCode> {
    let rules = RulesLookup::new(config_manager.load_rules_config()?);
    let result = rules.lookup(location, query)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize lookup result")?
        );
    } else {
        print_lookup(&result);
    }

    Ok(match result.outcome {
        LookupOutcome::Found { .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn print_lookup(result: &Lookup) {
    match &result.outcome {
        LookupOutcome::Found {
            keyword,
            item,
            rule,
        } => {
            if keyword != item {
                println!("'{}' -> {} ({})", keyword, item, result.source);
            } else {
                println!("{} ({})", item, result.source);
            }
            println!("  Category: {}", rule.category);
            if !rule.notes.is_empty() {
                println!("  Notes:    {}", rule.notes);
            }
        }
        LookupOutcome::Suggestion { suggestion } => {
            println!("No known item in '{}'. Did you mean '{}'?", result.query, suggestion);
        }
        LookupOutcome::MultipleSuggestions { suggestions } => {
            println!("No known item in '{}'. Did you mean one of:", result.query);
            for suggestion in suggestions {
                println!("  - {}", suggestion);
            }
        }
        LookupOutcome::NotFound { notes } => println!("{}", notes),
    }
}

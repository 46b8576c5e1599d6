//! paperfeed CLI: journal ingestion, enrichment and preference reports.
//!
//! Usage:
//!   paperfeed fetch
//!   paperfeed report
//!   paperfeed interact <like|unlike|archive|unarchive|restore|hide|unhide> <id>
//!   paperfeed correct <id> '<json>'

use clap::{ArgAction, Parser, Subcommand};
use paperfeed::overlay::{apply_correction, clear_correction, record_interaction, Action, CorrectionStore};
use paperfeed::pipeline::{self, RunInputs};
use paperfeed::{Config, EnrichmentManager, EnrichmentService, HttpFeedFetcher, LabelVocab, OpenAiService};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "paperfeed",
    version,
    about = "Journal RSS aggregation with cached enrichment and preference inference"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding corpus, caches and views
    #[arg(long, global = true, conflicts_with = "user_data")]
    data_dir: Option<PathBuf>,
    /// Keep data under the per-user data directory
    #[arg(long, global = true)]
    user_data: bool,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source, merge, enrich and render
    Fetch,
    /// Rebuild the preference report
    Report,
    /// Record a reading action on an entry
    Interact {
        /// like, unlike, archive, unarchive, restore, hide or unhide
        action: String,
        /// Entry identity
        id: String,
    },
    /// Override an entry's classification
    Correct {
        /// Entry identity
        id: String,
        /// JSON object with any of methods, topics, theories, contexts, subjects, novelty_score
        json: String,
    },
    /// Remove an entry's classification override
    Uncorrect {
        /// Entry identity
        id: String,
    },
    /// Summarize fetched abstracts
    Summarize {
        /// Restrict to these identities
        #[arg(long = "id")]
        ids: Vec<String>,
    },
    /// Store a user-provided abstract
    Abstract {
        /// Entry identity
        id: String,
        /// Abstract text
        text: String,
    },
}

/// Per-user data directory (~/.local/share/paperfeed)
fn user_data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("paperfeed")
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let mut config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    } else if cli.user_data {
        config.data_dir = user_data_dir();
    }
    Ok(config)
}

fn open_enrichment(config: &Config) -> Result<EnrichmentManager, String> {
    let timeout = Duration::from_secs(config.enrichment.timeout_secs.max(1));
    let service: Arc<dyn EnrichmentService> = Arc::new(
        OpenAiService::new(&config.provider, timeout)
            .map_err(|e| format!("Failed to build enrichment client: {}", e))?,
    );
    Ok(EnrichmentManager::open(
        service,
        &config.paths(),
        config.enrichment.clone(),
        LabelVocab::from_vocabulary(config.vocabulary.as_ref()),
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(body) => {
            println!("{}", body);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Re-render the view after an overlay edit; the edit itself already succeeded.
fn refresh_view(config: &Config) {
    if let Err(e) = pipeline::refresh_view(config, &config.queries()) {
        tracing::warn!(error = %e, "feed view not refreshed");
    }
}

async fn cmd_fetch(config: &Config) -> i32 {
    let fetcher = match HttpFeedFetcher::new(&config.ingest, &config.provider) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let enrichment = match open_enrichment(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let inputs = RunInputs::from_config(config);
    let summary = pipeline::run(config, &inputs, &fetcher, &enrichment).await;
    print_json(&summary)
}

fn cmd_report(config: &Config) -> i32 {
    match pipeline::run_report(config) {
        Ok(report) => {
            println!(
                "Report written to {} ({} positive, {} negative)",
                config.paths().report.display(),
                report.positive_count,
                report.negative_count
            );
            for line in &report.insights.narratives {
                println!("  {}", line);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_interact(config: &Config, action: &str, id: &str) -> i32 {
    if let Err(e) = action.parse::<Action>() {
        eprintln!("Error: {}", e);
        return 1;
    }
    match record_interaction(&config.paths().interactions, action, id) {
        Ok(state) => print_json(&state),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_correct(config: &Config, id: &str, json: &str) -> i32 {
    let payload: serde_json::Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: invalid correction JSON: {}", e);
            return 1;
        }
    };
    let store = CorrectionStore::load(&config.paths().corrections);
    match apply_correction(&store, id, &payload) {
        Ok(correction) => {
            refresh_view(config);
            print_json(&correction)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_uncorrect(config: &Config, id: &str) -> i32 {
    let store = CorrectionStore::load(&config.paths().corrections);
    match clear_correction(&store, id) {
        Ok(true) => {
            refresh_view(config);
            println!("Cleared correction for '{}'", id);
            0
        }
        Ok(false) => {
            eprintln!("Error: no correction for '{}'", id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_summarize(config: &Config, ids: Vec<String>) -> i32 {
    let enrichment = match open_enrichment(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let filter: Option<HashSet<String>> = if ids.is_empty() {
        None
    } else {
        Some(ids.into_iter().collect())
    };
    match pipeline::run_summarize(config, &config.queries(), &enrichment, filter.as_ref()).await {
        Ok(report) => print_json(&report),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_abstract(config: &Config, id: &str, text: &str) -> i32 {
    if text.trim().is_empty() {
        eprintln!("Error: abstract text is empty");
        return 1;
    }
    let enrichment = match open_enrichment(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match enrichment.set_user_abstract(id, text) {
        Ok(record) => {
            refresh_view(config);
            print_json(&record)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Fetch => rt.block_on(cmd_fetch(&config)),
        Commands::Report => cmd_report(&config),
        Commands::Interact { action, id } => cmd_interact(&config, &action, &id),
        Commands::Correct { id, json } => cmd_correct(&config, &id, &json),
        Commands::Uncorrect { id } => cmd_uncorrect(&config, &id),
        Commands::Summarize { ids } => rt.block_on(cmd_summarize(&config, ids)),
        Commands::Abstract { id, text } => cmd_abstract(&config, &id, &text),
    };
    std::process::exit(code);
}

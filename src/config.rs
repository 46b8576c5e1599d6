//! Pipeline configuration
//!
//! One `Config` value is built at startup and handed to every component that
//! needs settings. The JSON file keeps the `OPENAI_*` keys used by earlier
//! deployments; environment variables override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid taxonomy {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Credentials and endpoint for the OpenAI-compatible enrichment provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(rename = "OPENAI_API_KEY")]
    pub api_key: Option<String>,
    #[serde(rename = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,
    #[serde(rename = "OPENAI_PROXY")]
    pub proxy: Option<String>,
    #[serde(rename = "OPENAI_MODEL")]
    pub model: Option<String>,
}

impl ProviderConfig {
    fn normalize(&mut self) {
        for field in [
            &mut self.api_key,
            &mut self.base_url,
            &mut self.proxy,
            &mut self.model,
        ] {
            if field.as_deref().map(str::trim).is_some_and(str::is_empty) {
                *field = None;
            }
        }
    }
}

/// Feed fetching and corpus bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum number of entries kept in the corpus
    pub max_items: usize,
    /// Attempts per source before it contributes nothing for the run
    pub retries: u32,
    /// Fixed delay between attempts
    pub retry_backoff_secs: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_items: 1000,
            retries: 3,
            retry_backoff_secs: 2,
            timeout_secs: 30,
        }
    }
}

/// Enrichment dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Classify titles; when false only translations are requested
    pub classify: bool,
    /// Fetch abstracts for entries that have none cached
    pub fetch_abstracts: bool,
    /// Current classification record schema
    pub schema_version: u32,
    /// Keys per service call
    pub chunk_size: usize,
    /// Chunks in flight at once
    pub concurrency: usize,
    /// Persist the cache after this many merged records
    pub checkpoint_every: usize,
    /// Per-call timeout
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            classify: true,
            fetch_abstracts: true,
            schema_version: 2,
            chunk_size: 10,
            concurrency: 8,
            checkpoint_every: 50,
            timeout_secs: 60,
        }
    }
}

/// Preference report parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceConfig {
    pub top_k: usize,
    /// Minimum occurrences for term, bigram, journal and source keys
    pub min_text_total: u32,
    /// Minimum occurrences for method and topic labels
    pub min_label_total: u32,
    pub trend_months: usize,
    /// Lift a signal needs before it is narrated
    pub insight_min_lift: f64,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            min_text_total: 3,
            min_label_total: 5,
            trend_months: 12,
            insight_min_lift: 1.5,
        }
    }
}

/// Valid label names for classification results.
///
/// An empty list means that family is not filtered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub methods: Vec<String>,
    pub topics: Vec<String>,
}

impl Vocabulary {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the corpus, caches and generated views
    pub data_dir: PathBuf,
    /// Source list file (one feed URL per line)
    pub journals_file: PathBuf,
    /// Keyword query file (one `a AND b` query per line)
    pub keywords_file: PathBuf,
    /// Optional YAML label vocabulary
    pub taxonomy_file: Option<PathBuf>,
    /// RSS export of the corpus
    pub rss_output: PathBuf,
    pub ingest: IngestConfig,
    pub enrichment: EnrichmentConfig,
    pub preference: PreferenceConfig,
    #[serde(flatten)]
    pub provider: ProviderConfig,
    #[serde(skip)]
    pub vocabulary: Option<Vocabulary>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("web"),
            journals_file: PathBuf::from("journals.dat"),
            keywords_file: PathBuf::from("keywords.dat"),
            taxonomy_file: None,
            rss_output: PathBuf::from("filtered_feed.xml"),
            ingest: IngestConfig::default(),
            enrichment: EnrichmentConfig::default(),
            preference: PreferenceConfig::default(),
            provider: ProviderConfig::default(),
            vocabulary: None,
        }
    }
}

impl Config {
    /// Load from `path` (or `config.json`), then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            info!(path = %path.display(), "loading config");
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.load_vocabulary()?;
        Ok(config)
    }

    /// Override provider settings from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.provider.api_key = Some(v);
        }
        if let Some(v) = lookup("OPENAI_BASE_URL") {
            self.provider.base_url = Some(v);
        }
        if let Some(v) = lookup("OPENAI_PROXY") {
            self.provider.proxy = Some(v);
        }
        if let Some(v) = lookup("OPENAI_MODEL") {
            self.provider.model = Some(v);
        }
        self.provider.normalize();
    }

    fn load_vocabulary(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = &self.taxonomy_file {
            if path.exists() {
                self.vocabulary = Some(Vocabulary::load(path)?);
            } else {
                debug!(path = %path.display(), "taxonomy file missing, labels unfiltered");
            }
        }
        Ok(())
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir)
    }

    /// Feed URLs from `RSS_JOURNALS` or the journals file.
    pub fn sources(&self) -> Vec<String> {
        load_list(&self.journals_file, "RSS_JOURNALS", |k| std::env::var(k).ok())
    }

    /// Keyword queries from `RSS_KEYWORDS` or the keywords file.
    pub fn queries(&self) -> Vec<String> {
        load_list(&self.keywords_file, "RSS_KEYWORDS", |k| std::env::var(k).ok())
    }
}

/// Locations of every persisted artifact under the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub corpus: PathBuf,
    pub feed_view: PathBuf,
    pub fingerprint: PathBuf,
    pub classifications: PathBuf,
    pub abstracts: PathBuf,
    pub corrections: PathBuf,
    pub interactions: PathBuf,
    pub report: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            corpus: data_dir.join("corpus.json"),
            feed_view: data_dir.join("feed.json"),
            fingerprint: data_dir.join("journals.hash"),
            classifications: data_dir.join("translations.json"),
            abstracts: data_dir.join("abstracts.json"),
            corrections: data_dir.join("corrections.json"),
            interactions: data_dir.join("interactions.json"),
            report: data_dir.join("preference_report.json"),
        }
    }
}

/// Read a line list from an environment variable, else from a file.
///
/// The variable may separate items by newlines or `;`. File lines that are
/// blank or start with `#` are skipped.
pub fn load_list(
    file: &Path,
    env_var: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    if let Some(content) = lookup(env_var).filter(|c| !c.trim().is_empty()) {
        debug!(env_var, "loading list from environment");
        let sep = if content.contains('\n') { '\n' } else { ';' };
        return content
            .split(sep)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    match std::fs::read_to_string(file) {
        Ok(content) => content
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Err(_) => Vec::new(),
    }
}

//! Configuration loading for Citemill.
//! Reads citemill.toml from the current directory or the path in the
//! CITEMILL_CONFIG env var; a missing file yields the documented
//! defaults, so the pipeline runs out of the box.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Medallion storage areas. Each stage owns exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bronze_dir")]
    pub bronze_dir: PathBuf,
    #[serde(default = "default_silver_dir")]
    pub silver_dir: PathBuf,
    #[serde(default = "default_gold_dir")]
    pub gold_dir: PathBuf,
}

fn default_bronze_dir() -> PathBuf { PathBuf::from("data/bronze") }
fn default_silver_dir() -> PathBuf { PathBuf::from("data/silver") }
fn default_gold_dir()   -> PathBuf { PathBuf::from("data/gold") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bronze_dir: default_bronze_dir(),
            silver_dir: default_silver_dir(),
            gold_dir:   default_gold_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Topic labels fetched by `citemill ingest` / `citemill run`.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    /// Records persisted per topic per run; batches are truncated to
    /// exactly this count.
    #[serde(default = "default_works_per_topic")]
    pub works_per_topic: usize,
    /// Only works published on or after this date are fetched.
    #[serde(default = "default_from_publication_date")]
    pub from_publication_date: NaiveDate,
    /// Records requested per page (OpenAlex caps this at 200).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Minimum delay between consecutive page requests.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_topics() -> Vec<String> {
    [
        "Artificial intelligence",
        "Economics",
        "Sociology",
        "History",
        "Physics",
        "Biology",
        "Geopolitics",
        "Statistics",
        "Mathematics",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_works_per_topic() -> usize { 200 }
fn default_page_size()      -> usize { 200 }
fn default_page_delay_ms()  -> u64   { 500 }

fn default_from_publication_date() -> NaiveDate {
    // Fixed corpus cutoff; the dashboard's trend views start here.
    NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid cutoff date")
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            topics:                default_topics(),
            works_per_topic:       default_works_per_topic(),
            from_publication_date: default_from_publication_date(),
            page_size:             default_page_size(),
            page_delay_ms:         default_page_delay_ms(),
            retry:                 RetryConfig::default(),
        }
    }
}

/// Bounded retry with exponential backoff for page fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts()  -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 500 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts:  default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Sent on every request; OpenAlex's polite pool wants a mailto here.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_user_agent() -> String {
    "Citemill/0.1 (mailto:citemill@example.com)".to_string()
}

fn default_timeout_secs() -> u64 { 30 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent:   default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}


impl Config {
    /// Load configuration from citemill.toml.
    /// Checks CITEMILL_CONFIG first, then the current directory; falls
    /// back to defaults when no file exists.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CITEMILL_CONFIG")
            .unwrap_or_else(|_| "citemill.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load configuration from an explicit path; a missing file yields
    /// the defaults, an unparseable file is an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

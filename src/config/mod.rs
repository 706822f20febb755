use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub presenter: PresenterConfig,
}

/// Report fetcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed pause between two report requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,
}

/// Locations of the three files that couple the stages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_raw_log_path")]
    pub raw_log_path: PathBuf,

    #[serde(default = "default_directory_path")]
    pub directory_path: PathBuf,

    #[serde(default = "default_nav_series_path")]
    pub nav_series_path: PathBuf,

    /// gzip level, 0-9
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresenterConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://portal.amfiindia.com".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_request_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "nav-etl/0.1 (mutual fund NAV history research)".to_string()
}
fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}
fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 31).unwrap_or_default()
}
fn default_raw_log_path() -> PathBuf {
    PathBuf::from("data/nav_data.txt")
}
fn default_directory_path() -> PathBuf {
    PathBuf::from("data/scheme_code_to_name.json")
}
fn default_nav_series_path() -> PathBuf {
    PathBuf::from("data/scheme_code_to_nav.json.gz")
}
fn default_compression_level() -> u32 {
    6
}
fn default_top_k() -> usize {
    5
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            user_agent: default_user_agent(),
            start_date: default_start_date(),
            end_date: default_end_date(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_log_path: default_raw_log_path(),
            directory_path: default_directory_path(),
            nav_series_path: default_nav_series_path(),
            compression_level: default_compression_level(),
        }
    }
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("NAV").separator("__"))
            .build()
            .context("Failed to assemble configuration sources")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}

//! Stage orchestration: fetcher → raw log → normalizer → dataset files.
//!
//! ## Stages
//!
//! `fetch()` — one request per calendar day in range, sequential, fixed delay
//!   between requests. Failed days are logged and skipped.
//!
//! `normalize()` — full read of the raw log, rebuild both lookup tables from
//!   scratch, overwrite the dataset files. Re-running on the same log is idempotent.

use crate::config::AppConfig;
use crate::fetcher::raw_log::RawLog;
use crate::fetcher::{self, AmfiPortal, FetchStats, NavReportSource};
use crate::models::NavDataset;
use crate::normalizer::{self, NormalizeStats, SkipReason};
use crate::storage::DatasetStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::time::Duration;
use tracing::info;

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn fetch(&self, start: NaiveDate, end: NaiveDate, append: bool) -> Result<FetchStats> {
        let portal = AmfiPortal::new(&self.config.fetcher).context("Failed to build portal client")?;
        self.fetch_from(&portal, start, end, append).await
    }

    pub async fn fetch_from(
        &self,
        source: &dyn NavReportSource,
        start: NaiveDate,
        end: NaiveDate,
        append: bool,
    ) -> Result<FetchStats> {
        let path = &self.config.storage.raw_log_path;
        let mut log = if append { RawLog::append(path)? } else { RawLog::create(path)? };
        let delay = Duration::from_millis(self.config.fetcher.request_delay_ms);

        let stats = fetcher::fetch_range(source, &mut log, start, end, delay).await?;
        info!(
            "=== Fetch done: {} days | {} written | {} errors ===",
            stats.days_requested, stats.days_written, stats.errors
        );
        Ok(stats)
    }

    pub fn normalize(&self) -> Result<(NavDataset, NormalizeStats)> {
        let text = RawLog::read_to_string(&self.config.storage.raw_log_path)?;
        let (dataset, stats) = normalizer::normalize(&text);

        let bad_navs = stats.skipped_for(SkipReason::InvalidNav);
        if bad_navs > 0 {
            info!("{} rows dropped for a missing or non-numeric NAV", bad_navs);
        }

        DatasetStore::new(&self.config.storage)
            .save(&dataset)
            .context("Failed to save normalized dataset")?;
        Ok((dataset, stats))
    }

    pub fn load_dataset(&self) -> Result<NavDataset> {
        DatasetStore::new(&self.config.storage)
            .load()
            .context("Dataset files missing or unreadable; run `nav-etl normalize` first")
    }
}

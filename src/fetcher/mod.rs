pub mod http_client;
pub mod raw_log;

use crate::config::FetcherConfig;
use crate::models::REPORT_DATE_FORMAT;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use self::http_client::HttpClient;
use self::raw_log::RawLog;

const REPORT_PATH: &str = "DownloadNAVHistoryReport_Po.aspx";
const DATE_PARAM: &str = "frmdt";

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable report source: one raw semicolon-delimited report per calendar day.
#[async_trait]
pub trait NavReportSource: Send + Sync {
    async fn fetch_report(&self, date: NaiveDate) -> Result<String>;
}

// ── AMFI portal ───────────────────────────────────────────────────────────────

pub struct AmfiPortal {
    client: HttpClient,
    endpoint: Url,
}

impl AmfiPortal {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let base = format!("{}/", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&base)
            .and_then(|u| u.join(REPORT_PATH))
            .with_context(|| format!("Invalid base URL {:?}", config.base_url))?;

        Ok(Self {
            client: HttpClient::new(config)?,
            endpoint,
        })
    }

    /// e.g. `https://portal.amfiindia.com/DownloadNAVHistoryReport_Po.aspx?frmdt=01-Jan-2020`
    pub fn report_url(&self, date: NaiveDate) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(DATE_PARAM, &date.format(REPORT_DATE_FORMAT).to_string());
        url
    }
}

#[async_trait]
impl NavReportSource for AmfiPortal {
    async fn fetch_report(&self, date: NaiveDate) -> Result<String> {
        let url = self.report_url(date);
        self.client.get_text(url.as_str()).await
    }
}

// ── Fetch loop ────────────────────────────────────────────────────────────────

/// Every calendar day from `start` to `end`, inclusive. Empty when `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

#[derive(Debug, Default, PartialEq)]
pub struct FetchStats {
    pub days_requested: usize,
    pub days_written: usize,
    pub errors: usize,
}

/// Request every day in range sequentially, appending each report to `log`.
/// A failed day is logged and skipped; only log write failures abort the run.
pub async fn fetch_range(
    source: &dyn NavReportSource,
    log: &mut RawLog,
    start: NaiveDate,
    end: NaiveDate,
    delay: Duration,
) -> Result<FetchStats> {
    let total = (end - start).num_days().max(-1) + 1;
    info!("Fetching {} daily reports ({} → {}) into {:?}", total, start, end, log.path());

    let mut stats = FetchStats::default();

    for date in date_range(start, end) {
        if stats.days_requested > 0 && !delay.is_zero() {
            sleep(delay).await;
        }
        stats.days_requested += 1;

        match source.fetch_report(date).await {
            Ok(body) => {
                log.write_block(date, &body)?;
                stats.days_written += 1;
                debug!("{}: {} bytes", date, body.len());
            }
            Err(e) => {
                warn!("Error fetching data for {}: {:#}", date.format(REPORT_DATE_FORMAT), e);
                stats.errors += 1;
            }
        }

        if stats.days_requested % 30 == 0 {
            info!("  {}/{} days ({} errors)", stats.days_requested, total, stats.errors);
        }
    }

    Ok(stats)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use tokio_test::{assert_err, assert_ok};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    fn test_config(base_url: String) -> FetcherConfig {
        FetcherConfig {
            base_url,
            request_delay_ms: 0,
            ..FetcherConfig::default()
        }
    }

    /// Fails on the listed dates, echoes the date otherwise.
    struct FlakySource {
        failing: Vec<NaiveDate>,
    }

    #[async_trait]
    impl NavReportSource for FlakySource {
        async fn fetch_report(&self, date: NaiveDate) -> Result<String> {
            if self.failing.contains(&date) {
                anyhow::bail!("simulated outage");
            }
            Ok(format!("body {}", date))
        }
    }

    #[test]
    fn test_date_range() {
        let days: Vec<_> = date_range(day(2, 27), day(3, 2)).collect();
        assert_eq!(days, vec![day(2, 27), day(2, 28), day(2, 29), day(3, 1), day(3, 2)]);

        assert_eq!(date_range(day(1, 1), day(1, 1)).count(), 1);
        assert_eq!(date_range(day(1, 2), day(1, 1)).count(), 0);
    }

    #[test]
    fn test_report_url() {
        let portal = AmfiPortal::new(&test_config("https://portal.amfiindia.com/".into())).unwrap();
        assert_eq!(
            portal.report_url(day(1, 1)).as_str(),
            "https://portal.amfiindia.com/DownloadNAVHistoryReport_Po.aspx?frmdt=01-Jan-2020"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(AmfiPortal::new(&test_config("not a url".into())).is_err());
    }

    #[tokio::test]
    async fn failing_day_does_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nav_data.txt");
        let mut log = RawLog::create(&path).unwrap();
        let source = FlakySource { failing: vec![day(1, 2)] };

        let stats = fetch_range(&source, &mut log, day(1, 1), day(1, 3), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(stats, FetchStats { days_requested: 3, days_written: 2, errors: 1 });
        assert_eq!(
            RawLog::read_to_string(&path).unwrap(),
            "Data for 01-Jan-2020:\nbody 2020-01-01\n\nData for 03-Jan-2020:\nbody 2020-01-03\n\n"
        );
    }

    #[tokio::test]
    async fn portal_fetches_by_date_and_maps_server_errors() {
        let server = MockServer::start_async().await;

        let ok = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/DownloadNAVHistoryReport_Po.aspx")
                    .query_param("frmdt", "01-Jan-2020");
                then.status(200)
                    .body("100;SchemeA;x;x;50.25;x;x;01-Jan-2020");
            })
            .await;
        let down = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/DownloadNAVHistoryReport_Po.aspx")
                    .query_param("frmdt", "02-Jan-2020");
                then.status(500);
            })
            .await;

        let portal = AmfiPortal::new(&test_config(server.base_url())).unwrap();

        let body = assert_ok!(portal.fetch_report(day(1, 1)).await);
        assert_eq!(body, "100;SchemeA;x;x;50.25;x;x;01-Jan-2020");
        assert_err!(portal.fetch_report(day(1, 2)).await);

        ok.assert_async().await;
        down.assert_async().await;
    }

    #[tokio::test]
    async fn portal_range_writes_blocks_in_order() {
        let server = MockServer::start_async().await;
        for (d, nav) in [("01-Jan-2020", "10.0"), ("02-Jan-2020", "11.0")] {
            server
                .mock_async(|when, then| {
                    when.method(GET).query_param("frmdt", d);
                    then.status(200).body(format!("100;SchemeA;x;x;{};x;x;{}", nav, d));
                })
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nav_data.txt");
        let mut log = RawLog::create(&path).unwrap();
        let portal = AmfiPortal::new(&test_config(server.base_url())).unwrap();

        let stats = fetch_range(&portal, &mut log, day(1, 1), day(1, 2), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(stats.errors, 0);

        let text = RawLog::read_to_string(&path).unwrap();
        let first = text.find("Data for 01-Jan-2020:").unwrap();
        let second = text.find("Data for 02-Jan-2020:").unwrap();
        assert!(first < second);
        assert!(text.contains("100;SchemeA;x;x;11.0;x;x;02-Jan-2020"));
    }
}

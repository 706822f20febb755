//! Derived metrics over NAV series: returns, Sharpe ratio, ranking, SIP value.

use crate::models::{NavDataset, REPORT_DATE_FORMAT, SchemeNav};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MetricError {
    #[error("no returns to evaluate")]
    NoReturns,
    #[error("returns have zero volatility")]
    ZeroVolatility,
    #[error("annual rate must be greater than -100%, got {0}")]
    InvalidRate(f64),
    #[error("amount must be a non-negative finite number, got {0}")]
    InvalidAmount(f64),
}

// ── Series helpers ────────────────────────────────────────────────────────────

/// NAV map of one scheme, keyed by the report's date strings.
pub fn scheme_nav<'a>(dataset: &'a NavDataset, code: &str) -> Option<&'a SchemeNav> {
    dataset.series.get(code)
}

/// Parse report dates and sort ascending. Unparseable dates are dropped.
pub fn chronological(nav: &SchemeNav) -> Vec<(NaiveDate, f64)> {
    let mut points: Vec<(NaiveDate, f64)> = nav
        .iter()
        .filter_map(|(date, &v)| match NaiveDate::parse_from_str(date, REPORT_DATE_FORMAT) {
            Ok(d) => Some((d, v)),
            Err(_) => {
                debug!("unparseable report date {:?}", date);
                None
            }
        })
        .collect();
    points.sort_by_key(|(d, _)| *d);
    points
}

// ── Returns / Sharpe ──────────────────────────────────────────────────────────

/// Period-over-period percentage change. A zero prior NAV yields 0.
pub fn returns(navs: &[f64]) -> Vec<f64> {
    navs.windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { (w[1] - w[0]) / w[0] * 100.0 })
        .collect()
}

pub fn cumulative_return(returns: &[f64]) -> f64 {
    returns.iter().sum()
}

/// Mean over population standard deviation.
pub fn sharpe(returns: &[f64]) -> Result<f64, MetricError> {
    if returns.is_empty() {
        return Err(MetricError::NoReturns);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stdev = var.sqrt();

    if stdev == 0.0 {
        return Err(MetricError::ZeroVolatility);
    }
    Ok(mean / stdev)
}

// ── Ranking ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    Returns,
    Sharpe,
}

impl RankMetric {
    pub fn label(self) -> &'static str {
        match self {
            Self::Returns => "Total Returns",
            Self::Sharpe => "Sharpe Ratio",
        }
    }

    fn evaluate(self, returns: &[f64]) -> Result<f64, MetricError> {
        match self {
            Self::Returns => Ok(cumulative_return(returns)),
            Self::Sharpe => sharpe(returns),
        }
    }
}

impl FromStr for RankMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "returns" | "return" => Ok(Self::Returns),
            "sharpe" => Ok(Self::Sharpe),
            other => Err(format!("unknown metric {:?} (expected returns|sharpe)", other)),
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Returns => "returns",
            Self::Sharpe => "sharpe",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedFund {
    pub code: String,
    pub name: String,
    pub value: f64,
}

/// Top `k` schemes by `metric`, descending.
///
/// Schemes with fewer than two dated points, or whose metric is undefined,
/// are left out. Ties keep directory order.
pub fn top_funds(dataset: &NavDataset, metric: RankMetric, k: usize) -> Vec<RankedFund> {
    let mut ranked: Vec<RankedFund> = dataset
        .directory
        .iter()
        .filter_map(|(code, name)| {
            let points = chronological(scheme_nav(dataset, code)?);
            if points.len() < 2 {
                return None;
            }
            let navs: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
            match metric.evaluate(&returns(&navs)) {
                Ok(value) => Some(RankedFund { code: code.clone(), name: name.clone(), value }),
                Err(e) => {
                    debug!("{} excluded from {} ranking: {}", code, metric, e);
                    None
                }
            }
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    ranked.truncate(k);
    ranked
}

// ── Trend ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSummary {
    pub points: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub first_nav: f64,
    pub last_nav: f64,
    pub min_nav: f64,
    pub max_nav: f64,
    pub total_return_pct: f64,
}

pub fn trend_summary(points: &[(NaiveDate, f64)]) -> Option<TrendSummary> {
    let (first_date, first_nav) = *points.first()?;
    let (last_date, last_nav) = *points.last()?;
    let navs: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

    Some(TrendSummary {
        points: points.len(),
        first_date,
        last_date,
        first_nav,
        last_nav,
        min_nav: navs.iter().copied().fold(f64::INFINITY, f64::min),
        max_nav: navs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        total_return_pct: cumulative_return(&returns(&navs)),
    })
}

// ── SIP ───────────────────────────────────────────────────────────────────────

/// Effective monthly rate for an annual percentage: `(1 + r/100)^(1/12) - 1`.
pub fn monthly_rate(annual_rate_pct: f64) -> f64 {
    (1.0 + annual_rate_pct / 100.0).powf(1.0 / 12.0) - 1.0
}

/// Future value of `months` instalments paid at the start of each month.
///
/// A zero effective rate returns the plain sum `amount * months`.
pub fn sip_future_value(amount: f64, months: u32, annual_rate_pct: f64) -> Result<f64, MetricError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(MetricError::InvalidAmount(amount));
    }
    if !annual_rate_pct.is_finite() || annual_rate_pct <= -100.0 {
        return Err(MetricError::InvalidRate(annual_rate_pct));
    }

    let i = monthly_rate(annual_rate_pct);
    if i == 0.0 {
        return Ok(amount * f64::from(months));
    }
    Ok(amount * ((1.0 + i).powf(f64::from(months)) - 1.0) * (1.0 + i) / i)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_returns() {
        let r = returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!(approx(r[0], 10.0));
        assert!(approx(r[1], -10.0));

        assert!(returns(&[]).is_empty());
        assert!(returns(&[5.0]).is_empty());
    }

    #[test]
    fn test_returns_zero_prior_nav() {
        assert_eq!(returns(&[0.0, 10.0, 20.0]), vec![0.0, 100.0]);
    }

    #[test]
    fn test_sharpe() {
        assert_eq!(sharpe(&[]), Err(MetricError::NoReturns));
        assert_eq!(sharpe(&[1.5, 1.5, 1.5]), Err(MetricError::ZeroVolatility));
        assert_eq!(sharpe(&[2.0]), Err(MetricError::ZeroVolatility));

        // mean 2, population stdev 1
        assert!(approx(sharpe(&[1.0, 3.0]).unwrap(), 2.0));
    }

    #[test]
    fn test_sharpe_of_rising_pair() {
        // two points give a single return, so rising pairs carry no spread
        assert_eq!(sharpe(&returns(&[10.0, 12.0])), Err(MetricError::ZeroVolatility));

        let s = sharpe(&returns(&[10.0, 11.0, 12.5])).unwrap();
        assert!(s.is_finite() && s > 0.0);
    }

    #[test]
    fn test_chronological_sorts_by_calendar_not_text() {
        let mut nav = SchemeNav::new();
        nav.insert("01-Feb-2020".into(), 2.0);
        nav.insert("15-Jan-2020".into(), 1.0);
        nav.insert("garbage".into(), 9.0);
        nav.insert("01-Jan-2021".into(), 3.0);

        let values: Vec<f64> = chronological(&nav).into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    fn ranking_fixture() -> NavDataset {
        normalize(
            "\
1;Flat;x;x;10;x;x;01-Jan-2020
1;Flat;x;x;10;x;x;02-Jan-2020
1;Flat;x;x;10;x;x;03-Jan-2020
2;Rising;x;x;10;x;x;01-Jan-2020
2;Rising;x;x;11;x;x;02-Jan-2020
2;Rising;x;x;12.5;x;x;03-Jan-2020
3;Single;x;x;10;x;x;01-Jan-2020
4;Falling;x;x;10;x;x;01-Jan-2020
4;Falling;x;x;9;x;x;02-Jan-2020
4;Falling;x;x;8.5;x;x;03-Jan-2020
5;NoDates;x;x;10;x;x
6;Jumpy;x;x;10;x;x;03-Jan-2020
6;Jumpy;x;x;20;x;x;01-Jan-2020
6;Jumpy;x;x;15;x;x;02-Jan-2020
",
        )
        .0
    }

    #[test]
    fn top_by_returns_sorted_descending() {
        let top = top_funds(&ranking_fixture(), RankMetric::Returns, 5);
        let names: Vec<&str> = top.iter().map(|f| f.name.as_str()).collect();

        // Jumpy: 20 → 15 → 10 chronologically
        assert_eq!(names, ["Rising", "Flat", "Falling", "Jumpy"]);
        assert!(top.windows(2).all(|w| w[0].value >= w[1].value));
        assert!(!names.contains(&"Single"));
        assert!(!names.contains(&"NoDates"));
    }

    #[test]
    fn top_by_sharpe_excludes_undefined() {
        let top = top_funds(&ranking_fixture(), RankMetric::Sharpe, 5);
        let names: Vec<&str> = top.iter().map(|f| f.name.as_str()).collect();

        assert!(!names.contains(&"Flat"));
        assert_eq!(names[0], "Rising");
        assert!(top.iter().all(|f| f.value.is_finite()));
    }

    #[test]
    fn top_respects_k_and_ties_keep_directory_order() {
        let mut text = String::new();
        for code in 1..=8 {
            text.push_str(&format!("{code};Fund{code};x;x;10;x;x;01-Jan-2020\n"));
            text.push_str(&format!("{code};Fund{code};x;x;11;x;x;02-Jan-2020\n"));
        }
        let ds = normalize(&text).0;

        let top = top_funds(&ds, RankMetric::Returns, 5);
        assert_eq!(top.len(), 5);
        let codes: Vec<&str> = top.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, ["1", "2", "3", "4", "5"]);

        assert!(top_funds(&ds, RankMetric::Returns, 0).is_empty());
    }

    #[test]
    fn test_rank_metric_from_str() {
        assert_eq!("Sharpe".parse::<RankMetric>(), Ok(RankMetric::Sharpe));
        assert_eq!("returns".parse::<RankMetric>(), Ok(RankMetric::Returns));
        assert!("alpha".parse::<RankMetric>().is_err());
    }

    #[test]
    fn test_trend_summary() {
        let d = |day| NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
        let s = trend_summary(&[(d(1), 10.0), (d(2), 8.0), (d(3), 12.0)]).unwrap();

        assert_eq!(s.points, 3);
        assert_eq!(s.first_date, d(1));
        assert_eq!(s.last_date, d(3));
        assert_eq!(s.min_nav, 8.0);
        assert_eq!(s.max_nav, 12.0);
        assert!(approx(s.total_return_pct, -20.0 + 50.0));

        assert!(trend_summary(&[]).is_none());
    }

    #[test]
    fn test_sip_future_value() {
        let i = 1.12f64.powf(1.0 / 12.0) - 1.0;
        let expected = 10_000.0 * ((1.0 + i).powi(12) - 1.0) * (1.0 + i) / i;

        let fv = sip_future_value(10_000.0, 12, 12.0).unwrap();
        assert!(approx(fv, expected));
        assert!(fv > 127_000.0 && fv < 128_000.0);
    }

    #[test]
    fn test_sip_zero_rate_is_plain_sum() {
        assert_eq!(sip_future_value(5_000.0, 24, 0.0), Ok(120_000.0));
        assert_eq!(sip_future_value(5_000.0, 0, 12.0), Ok(0.0));
    }

    #[test]
    fn test_sip_grows_with_months() {
        let months = [1, 12, 120, 1_200, 2_147_483_647, 2_147_483_648, 3_000_000_000, u32::MAX];
        let values: Vec<f64> = months
            .iter()
            .map(|&m| sip_future_value(1_000.0, m, 12.0).unwrap())
            .collect();

        assert!(values.iter().all(|v| *v > 0.0));
        assert!(values.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_sip_rejects_bad_input() {
        assert_eq!(sip_future_value(1_000.0, 12, -100.0), Err(MetricError::InvalidRate(-100.0)));
        assert_eq!(sip_future_value(-1.0, 12, 10.0), Err(MetricError::InvalidAmount(-1.0)));
        assert!(sip_future_value(f64::NAN, 12, 10.0).is_err());
    }
}

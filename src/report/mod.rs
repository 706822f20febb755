//! Terminal rendering of the dashboard views, plus CSV export of a scheme's trend.

use crate::metrics::{self, MetricError, RankMetric, RankedFund};
use crate::models::NavDataset;
use crate::utils::{fmt_inr, fmt_metric, fmt_number};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;

const RULE: &str = "─────────────────────────────────────────────────────────────";
const NAME_WIDTH: usize = 60;

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width - 1).collect();
        out.push('…');
        out
    }
}

// ── Ranking tables ────────────────────────────────────────────────────────────

pub fn render_top(w: &mut impl Write, metric: RankMetric, funds: &[RankedFund]) -> Result<()> {
    let title = match metric {
        RankMetric::Returns => "Top Mutual Funds by Returns",
        RankMetric::Sharpe => "Top Mutual Funds by Sharpe Ratio",
    };
    writeln!(w, "{}", RULE)?;
    writeln!(w, "  {}", title)?;
    writeln!(w, "{}", RULE)?;

    if funds.is_empty() {
        writeln!(w, "  No scheme has enough NAV history to rank.")?;
        return Ok(());
    }

    writeln!(w, "  {:>2}  {:<width$}  {:>14}", "#", "Scheme", metric.label(), width = NAME_WIDTH)?;
    for (i, f) in funds.iter().enumerate() {
        writeln!(
            w,
            "  {:>2}  {:<width$}  {:>14.4}",
            i + 1,
            truncate(&f.name, NAME_WIDTH),
            f.value,
            width = NAME_WIDTH
        )?;
    }
    Ok(())
}

// ── Trend ─────────────────────────────────────────────────────────────────────

/// Summary block followed by the dated series (`last` most recent points, or all).
pub fn render_trend(
    w: &mut impl Write,
    code: &str,
    name: &str,
    points: &[(NaiveDate, f64)],
    last: Option<usize>,
) -> Result<()> {
    writeln!(w, "{}", RULE)?;
    writeln!(w, "  NAV Trend for {} ({})", name, code)?;
    writeln!(w, "{}", RULE)?;

    let Some(summary) = metrics::trend_summary(points) else {
        writeln!(w, "  No data available for scheme: {}", name)?;
        return Ok(());
    };

    let navs: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let sharpe = metrics::sharpe(&metrics::returns(&navs));

    writeln!(w, "  Points       : {}", fmt_number(summary.points))?;
    writeln!(w, "  From         : {}  NAV {:.4}", summary.first_date, summary.first_nav)?;
    writeln!(w, "  To           : {}  NAV {:.4}", summary.last_date, summary.last_nav)?;
    writeln!(w, "  Range        : {:.4} – {:.4}", summary.min_nav, summary.max_nav)?;
    writeln!(w, "  Total return : {:.4}", summary.total_return_pct)?;
    writeln!(w, "  Sharpe ratio : {}", fmt_metric(sharpe))?;
    writeln!(w, "{}", RULE)?;

    let skip = last.map_or(0, |n| points.len().saturating_sub(n));
    for (date, nav) in &points[skip..] {
        writeln!(w, "  {}  {:>12.4}", date, nav)?;
    }
    Ok(())
}

/// Write `date,nav` rows in chronological order.
pub fn export_trend_csv(path: &Path, points: &[(NaiveDate, f64)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV {:?}", path))?;

    writer.write_record(["date", "nav"])?;
    for (date, nav) in points {
        writer.write_record([date.to_string(), nav.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

// ── SIP ───────────────────────────────────────────────────────────────────────

pub fn render_sip(w: &mut impl Write, amount: f64, months: u32, annual_rate_pct: f64) -> Result<()> {
    let fv: Result<f64, MetricError> = metrics::sip_future_value(amount, months, annual_rate_pct);

    writeln!(w, "{}", RULE)?;
    writeln!(w, "  SIP Calculator")?;
    writeln!(w, "{}", RULE)?;
    writeln!(w, "  Monthly amount : ₹{}", fmt_inr(amount))?;
    writeln!(w, "  Duration       : {} months", months)?;
    writeln!(w, "  Annual return  : {}%", annual_rate_pct)?;
    writeln!(w, "  Invested       : ₹{}", fmt_inr(amount * f64::from(months)))?;
    match fv {
        Ok(v) => writeln!(w, "  Future value   : ₹{}", fmt_inr(v))?,
        Err(e) => writeln!(w, "  Future value   : N/A ({})", e)?,
    }
    Ok(())
}

// ── Dataset overview ──────────────────────────────────────────────────────────

pub fn render_stats(w: &mut impl Write, dataset: &NavDataset) -> Result<()> {
    let (min, max) = date_span(dataset);
    writeln!(w, "{}", RULE)?;
    writeln!(w, "  NAV dataset")?;
    writeln!(w, "{}", RULE)?;
    writeln!(w, "  Schemes    : {}", fmt_number(dataset.directory.len()))?;
    writeln!(w, "  With NAVs  : {}", fmt_number(dataset.series.len()))?;
    writeln!(w, "  NAV points : {}", fmt_number(dataset.point_count()))?;
    writeln!(w, "  From       : {}", min.map(|d| d.to_string()).unwrap_or("—".into()))?;
    writeln!(w, "  To         : {}", max.map(|d| d.to_string()).unwrap_or("—".into()))?;
    Ok(())
}

pub fn render_dashboard(w: &mut impl Write, dataset: &NavDataset, k: usize) -> Result<()> {
    render_stats(w, dataset)?;
    writeln!(w)?;
    render_top(w, RankMetric::Returns, &metrics::top_funds(dataset, RankMetric::Returns, k))?;
    writeln!(w)?;
    render_top(w, RankMetric::Sharpe, &metrics::top_funds(dataset, RankMetric::Sharpe, k))?;
    writeln!(w)?;
    writeln!(
        w,
        "  Mutual funds are subject to market risks. Read all the scheme related information carefully before investing."
    )?;
    Ok(())
}

fn date_span(dataset: &NavDataset) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let dates = dataset
        .series
        .values()
        .flat_map(|nav| metrics::chronological(nav).into_iter().map(|(d, _)| d));
    dates.fold((None, None), |(lo, hi), d| {
        (
            Some(lo.map_or(d, |l: NaiveDate| l.min(d))),
            Some(hi.map_or(d, |h: NaiveDate| h.max(d))),
        )
    })
}

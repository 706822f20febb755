//! Raw report log → lookup tables.
//!
//! The portal report is line oriented and noisy: every day's block repeats the
//! column header, carries a `Data for <date>:` marker, fund-house and category
//! captions, and blank separators. Only rows that pass [`parse_line`] contribute.

use crate::models::{NavDataset, RawReportLine};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

pub const FIELD_SEPARATOR: char = ';';
pub const HEADER_TOKEN: &str = "Scheme Code";
pub const MIN_FIELDS: usize = 7;

const CODE_IDX: usize = 0;
const NAME_IDX: usize = 1;
const NAV_IDX: usize = 4;
const DATE_IDX: usize = 7;

// ── Validity predicate ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Error)]
pub enum SkipReason {
    #[error("blank line")]
    Blank,
    #[error("fewer than {} fields", MIN_FIELDS)]
    TooFewFields,
    #[error("column header")]
    Header,
    #[error("NAV is not a finite number")]
    InvalidNav,
}

/// Parse NAV: a finite decimal, surrounding whitespace allowed.
/// "50.25" → 50.25 | "N.A." → None | "NaN" → None
pub fn parse_nav(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Decide whether one log line is a data row and extract its fields.
pub fn parse_line(line: &str) -> Result<RawReportLine, SkipReason> {
    let line = line.trim();
    if line.is_empty() {
        return Err(SkipReason::Blank);
    }

    let parts: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
    if parts.len() < MIN_FIELDS {
        return Err(SkipReason::TooFewFields);
    }
    if parts[CODE_IDX] == HEADER_TOKEN {
        return Err(SkipReason::Header);
    }

    let nav = parse_nav(parts[NAV_IDX]).ok_or(SkipReason::InvalidNav)?;
    let date = parts
        .get(DATE_IDX)
        .filter(|d| !d.is_empty())
        .map(|d| d.to_string());

    Ok(RawReportLine {
        scheme_code: parts[CODE_IDX].to_string(),
        scheme_name: parts[NAME_IDX].to_string(),
        nav,
        date,
    })
}

// ── Run statistics ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeStats {
    pub lines_read: usize,
    pub lines_accepted: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl NormalizeStats {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }
}

impl fmt::Display for NormalizeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines, {} accepted, {} skipped",
            self.lines_read,
            self.lines_accepted,
            self.skipped_total()
        )?;
        for (reason, n) in &self.skipped {
            write!(f, " [{}: {}]", reason, n)?;
        }
        Ok(())
    }
}

// ── Build ─────────────────────────────────────────────────────────────────────

/// Build both lookup tables from the full text of a raw report log.
/// Never fails: noise is skipped and counted.
pub fn normalize(text: &str) -> (NavDataset, NormalizeStats) {
    let mut dataset = NavDataset::default();
    let mut stats = NormalizeStats::default();

    for (i, raw) in text.lines().enumerate() {
        stats.lines_read += 1;
        match parse_line(raw) {
            Ok(line) => {
                dataset.upsert(line);
                stats.lines_accepted += 1;
            }
            Err(reason) => {
                if reason != SkipReason::Blank {
                    debug!("line {}: skipped ({})", i + 1, reason);
                }
                *stats.skipped.entry(reason).or_insert(0) += 1;
            }
        }
    }

    info!(
        "Normalized {} schemes, {} NAV points ({})",
        dataset.directory.len(),
        dataset.point_count(),
        stats
    );
    (dataset, stats)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

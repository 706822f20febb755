use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Date layout used by the portal in query strings and report rows, e.g. `01-Jan-2020`.
pub const REPORT_DATE_FORMAT: &str = "%d-%b-%Y";

// ── Raw report row ────────────────────────────────────────────────────────────

/// One accepted semicolon-delimited row of a NAV history report.
///
/// Column layout of the portal report:
/// `Scheme Code;Scheme Name;ISIN Div Payout/Growth;ISIN Div Reinvestment;Net Asset Value;Repurchase Price;Sale Price;Date`
#[derive(Debug, Clone, PartialEq)]
pub struct RawReportLine {
    pub scheme_code: String,
    pub scheme_name: String,
    pub nav: f64,
    pub date: Option<String>, // kept verbatim, dd-Mon-yyyy
}

// ── Lookup tables ─────────────────────────────────────────────────────────────

/// scheme code → display name, in first-seen order
pub type SchemeDirectory = IndexMap<String, String>;

/// date string → NAV for one scheme
pub type SchemeNav = IndexMap<String, f64>;

/// scheme code → date string → NAV
pub type NavSeries = IndexMap<String, SchemeNav>;

/// Both lookup tables, built together by one normalization run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavDataset {
    pub directory: SchemeDirectory,
    pub series: NavSeries,
}

impl NavDataset {
    /// Upsert one accepted row: the name always, the NAV only when the row carries a date.
    pub fn upsert(&mut self, line: RawReportLine) {
        let RawReportLine { scheme_code, scheme_name, nav, date } = line;

        if let Some(date) = date {
            self.series
                .entry(scheme_code.clone())
                .or_default()
                .insert(date, nav);
        }
        self.directory.insert(scheme_code, scheme_name);
    }

    pub fn scheme_name(&self, code: &str) -> Option<&str> {
        self.directory.get(code).map(String::as_str)
    }

    /// First scheme code registered under exactly this name.
    pub fn code_for_name(&self, name: &str) -> Option<&str> {
        self.directory
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(code, _)| code.as_str())
    }

    pub fn point_count(&self) -> usize {
        self.series.values().map(IndexMap::len).sum()
    }
}

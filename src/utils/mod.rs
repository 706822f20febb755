use std::time::{Duration, Instant};
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("⏱  Finished: {} (took {:.2?})", self.label, self.elapsed());
    }
}

/// Format a count with thousands separators.
pub fn fmt_number(n: usize) -> String {
    group_digits(&n.to_string(), 3)
}

/// Indian-style grouping with two decimals: 127663.4 → "1,27,663.40".
pub fn fmt_inr(amount: f64) -> String {
    if !amount.is_finite() {
        return "N/A".to_string();
    }
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    // last three digits, then pairs
    let grouped = if int_part.len() > 3 {
        let (head, tail) = int_part.split_at(int_part.len() - 3);
        format!("{},{}", group_digits(head, 2), tail)
    } else {
        int_part.to_string()
    };

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}

fn group_digits(digits: &str, size: usize) -> String {
    let mut result = String::new();
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % size == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Metric cell: fixed decimals, or "N/A" for undefined values.
pub fn fmt_metric<E>(value: Result<f64, E>) -> String {
    match value {
        Ok(v) if v.is_finite() => format!("{:.4}", v),
        _ => "N/A".to_string(),
    }
}

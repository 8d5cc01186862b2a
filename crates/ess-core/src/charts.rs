//! Chart-library-agnostic presentation shapes. The aggregation layer emits
//! these; any front end (ratatui widgets, JSON, plain text) can consume them
//! without knowing how the numbers were computed.

use serde::{Deserialize, Serialize};

/// Sentinel shown for metrics that are undefined over an empty table.
pub const NO_DATA: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Pie,
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
    pub series: Vec<SeriesPoint>,
}

impl ChartSpec {
    pub fn pie(title: impl Into<String>, series: Vec<SeriesPoint>) -> Self {
        Self {
            title: title.into(),
            kind: ChartKind::Pie,
            series,
        }
    }

    pub fn bar(title: impl Into<String>, series: Vec<SeriesPoint>) -> Self {
        Self {
            title: title.into(),
            kind: ChartKind::Bar,
            series,
        }
    }

    pub fn line(title: impl Into<String>, series: Vec<SeriesPoint>) -> Self {
        Self {
            title: title.into(),
            kind: ChartKind::Line,
            series,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// One scalar metric tile: a label, a display string, and the raw value when
/// it is defined (`None` over an empty table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub formatted: String,
    pub value: Option<f64>,
}

impl Metric {
    pub fn count(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            formatted: group_thousands(value),
            value: Some(value as f64),
        }
    }

    pub fn currency(label: impl Into<String>, value: Option<f64>) -> Self {
        let formatted = match value {
            Some(amount) => format_currency(amount),
            None => NO_DATA.to_string(),
        };
        Self {
            label: label.into(),
            formatted,
            value,
        }
    }

    pub fn percent(label: impl Into<String>, value: Option<f64>) -> Self {
        let formatted = match value {
            Some(pct) => format!("{pct:.1}%"),
            None => NO_DATA.to_string(),
        };
        Self {
            label: label.into(),
            formatted,
            value,
        }
    }

    pub fn decimal(label: impl Into<String>, value: Option<f64>, suffix: &str) -> Self {
        let formatted = match value {
            Some(amount) => format!("{amount:.1}{suffix}"),
            None => NO_DATA.to_string(),
        };
        Self {
            label: label.into(),
            formatted,
            value,
        }
    }
}

/// "$1,234.56"-style display for sales totals.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${whole}.{:02}", cents % 100)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (offset, ch) in digits.chars().enumerate() {
        if offset > 0 && (digits.len() - offset) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

//! Data models for the sales desk.
//!
//! This module contains the core data structures shared by the loader,
//! the router, the aggregation handlers and the renderers.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Calendar month bucket used to aggregate sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Returns the month bucket a date falls into.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One row of the sales dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    /// Transaction date.
    pub date: NaiveDate,
    /// Month bucket derived from `date` at load time.
    pub year_month: YearMonth,
    /// Product or model identifier.
    pub product: String,
    /// Monetary value of the sale.
    pub value: f64,
    /// Any other descriptive columns, keyed by header.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl SalesRecord {
    pub fn new(date: NaiveDate, product: impl Into<String>, value: f64) -> Self {
        Self {
            date,
            year_month: YearMonth::from_date(date),
            product: product.into(),
            value,
            extra: BTreeMap::new(),
        }
    }
}

/// Source header names of the date, product and value columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyColumns {
    pub date: String,
    pub product: String,
    pub value: String,
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            product: "product".to_string(),
            value: "value".to_string(),
        }
    }
}

/// The sales data loaded for one session.
///
/// Records keep the order they had in the source file. The dataset is never
/// mutated after loading.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SalesDataset {
    /// Header names in source order.
    pub columns: Vec<String>,
    /// Which headers hold the date, product and value.
    pub key_columns: KeyColumns,
    /// Loaded rows.
    pub records: Vec<SalesRecord>,
}

impl SalesDataset {
    pub fn new(columns: Vec<String>, records: Vec<SalesRecord>) -> Self {
        Self {
            columns,
            key_columns: KeyColumns::default(),
            records,
        }
    }

    pub fn with_key_columns(mut self, key_columns: KeyColumns) -> Self {
        self.key_columns = key_columns;
        self
    }

    /// Header row in source order.
    ///
    /// Without a source header, the key columns come first, followed by the
    /// extra columns of the first record.
    pub fn header(&self) -> Vec<String> {
        if !self.columns.is_empty() {
            return self.columns.clone();
        }

        let keys = &self.key_columns;
        let mut header = vec![keys.date.clone(), keys.product.clone(), keys.value.clone()];
        if let Some(first) = self.records.first() {
            header.extend(first.extra.keys().cloned());
        }
        header
    }

    /// Cell of `record` under `column`, as it would appear in a CSV.
    pub fn cell(&self, record: &SalesRecord, column: &str) -> String {
        let keys = &self.key_columns;
        if column == keys.date {
            record.date.to_string()
        } else if column == keys.product {
            record.product.clone()
        } else if column == keys.value {
            record.value.to_string()
        } else {
            record.extra.get(column).cloned().unwrap_or_default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest transaction dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.iter().map(|r| r.date).min()?;
        let last = self.records.iter().map(|r| r.date).max()?;
        Some((first, last))
    }
}

/// Category a question is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Trend,
    Average,
    TopN,
    Goal,
    Recommendation,
    Forecast,
    Fallback,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Trend => write!(f, "Trend"),
            Intent::Average => write!(f, "Average"),
            Intent::TopN => write!(f, "Top N"),
            Intent::Goal => write!(f, "Goal"),
            Intent::Recommendation => write!(f, "Recommendation"),
            Intent::Forecast => write!(f, "Forecast"),
            Intent::Fallback => write!(f, "AI Answer"),
        }
    }
}

impl Intent {
    /// Returns an emoji shown next to answers of this kind.
    pub fn emoji(&self) -> &'static str {
        match self {
            Intent::Trend => "📈",
            Intent::Average => "🧮",
            Intent::TopN => "🏆",
            Intent::Goal => "🎯",
            Intent::Recommendation => "💡",
            Intent::Forecast => "🔮",
            Intent::Fallback => "🤖",
        }
    }
}

/// Simple rectangular table of display strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// Kind of chart a handler asks the renderer to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

/// How a series is stroked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStyle {
    #[default]
    Solid,
    Dashed,
    Markers,
}

/// One labelled data series. Each series carries its own x labels so that
/// a forecast can sit on a different axis from the history it extends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default)]
    pub style: SeriesStyle,
    pub points: Vec<(String, f64)>,
}

impl Series {
    pub fn new(name: impl Into<String>, style: SeriesStyle, points: Vec<(String, f64)>) -> Self {
        Self {
            name: name.into(),
            style,
            points,
        }
    }
}

/// Display-independent chart description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    /// Rotate x-axis labels for readability.
    #[serde(default)]
    pub rotate_x_labels: bool,
    pub series: Vec<Series>,
}

/// Result of answering one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub intent: Intent,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
}

impl Outcome {
    pub fn summary_only(intent: Intent, summary: impl Into<String>) -> Self {
        Self {
            intent,
            summary: summary.into(),
            table: None,
            chart: None,
        }
    }
}

/// One successfully answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub intent: Intent,
    pub asked_at: DateTime<Utc>,
}

/// Format a value as currency with thousands separators and two decimals.
pub fn format_currency(value: f64, symbol: &str) -> String {
    let cents = (value.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{}{}.{:02}", sign, symbol, grouped, fraction)
}

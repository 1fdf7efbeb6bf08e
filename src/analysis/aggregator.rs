//! Sales aggregation and statistics.
//!
//! Pure functions over a [`SalesDataset`] shared by the analysis handlers.

use crate::models::{SalesDataset, YearMonth};
use std::collections::{BTreeMap, HashMap};

/// Total value per calendar month, in chronological order.
pub fn monthly_totals(dataset: &SalesDataset) -> Vec<(YearMonth, f64)> {
    let mut totals: BTreeMap<YearMonth, f64> = BTreeMap::new();

    for record in &dataset.records {
        *totals.entry(record.year_month).or_default() += record.value;
    }

    totals.into_iter().collect()
}

/// Total value per product, in order of first appearance.
pub fn totals_by_product(dataset: &SalesDataset) -> Vec<(String, f64)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(String, f64)> = Vec::new();

    for record in &dataset.records {
        match positions.get(record.product.as_str()) {
            Some(&pos) => totals[pos].1 += record.value,
            None => {
                positions.insert(record.product.as_str(), totals.len());
                totals.push((record.product.clone(), record.value));
            }
        }
    }

    totals
}

/// Product totals sorted highest first, truncated to `n`.
///
/// The sort is stable, so tied products keep their first-appearance order.
pub fn top_products(dataset: &SalesDataset, n: usize) -> Vec<(String, f64)> {
    let mut totals = totals_by_product(dataset);
    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    totals.truncate(n);
    totals
}

/// Arithmetic mean of all values.
pub fn mean_value(dataset: &SalesDataset) -> Option<f64> {
    if dataset.is_empty() {
        return None;
    }
    let sum: f64 = dataset.records.iter().map(|r| r.value).sum();
    Some(sum / dataset.len() as f64)
}

/// Percent change of each total against the previous one.
///
/// The first entry is 0. An entry whose predecessor is 0 is also 0.
pub fn percent_changes(totals: &[f64]) -> Vec<f64> {
    let mut changes = Vec::with_capacity(totals.len());

    for (i, total) in totals.iter().enumerate() {
        let change = match i.checked_sub(1).map(|p| totals[p]) {
            Some(prev) if prev != 0.0 => (total - prev) / prev * 100.0,
            _ => 0.0,
        };
        changes.push(change);
    }

    changes
}

/// Index of the smallest value, first occurrence on ties.
pub fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Index of the largest value, first occurrence on ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Least-squares line through `(index, value)` points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit `value = intercept + slope * index` with x = 0, 1, 2, ...
///
/// Returns `None` for fewer than two points.
pub fn linear_fit(values: &[f64]) -> Option<LinearFit> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }

    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

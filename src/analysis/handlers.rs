//! Canned analyses.
//!
//! Each handler reads the whole dataset and builds an [`Outcome`] with a
//! summary sentence and, where useful, a table and a chart spec.

use super::aggregator::{
    argmax, argmin, linear_fit, mean_value, monthly_totals, percent_changes, top_products,
    totals_by_product,
};
use crate::error::{InsightError, Result};
use crate::models::{
    format_currency, ChartKind, ChartSpec, Intent, Outcome, SalesDataset, Series, SeriesStyle,
    Table,
};

/// Parameters shared by the handlers.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub monthly_goal: f64,
    pub top_n: usize,
    pub forecast_horizon: usize,
    pub currency_symbol: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::from(&crate::config::AnalysisConfig::default())
    }
}

impl From<&crate::config::AnalysisConfig> for AnalysisSettings {
    fn from(config: &crate::config::AnalysisConfig) -> Self {
        Self {
            monthly_goal: config.monthly_goal,
            top_n: config.top_n,
            forecast_horizon: config.forecast_horizon,
            currency_symbol: config.currency_symbol.clone(),
        }
    }
}

impl AnalysisSettings {
    fn money(&self, value: f64) -> String {
        format_currency(value, &self.currency_symbol)
    }
}

/// Monthly totals with month-over-month growth.
pub fn trend(dataset: &SalesDataset, settings: &AnalysisSettings) -> Result<Outcome> {
    let monthly = monthly_totals(dataset);
    let totals: Vec<f64> = monthly.iter().map(|(_, t)| *t).collect();
    let changes = percent_changes(&totals);

    let (Some(low), Some(high)) = (argmin(&totals), argmax(&changes)) else {
        return Ok(Outcome::summary_only(Intent::Trend, "No sales to compare."));
    };

    let mut table = Table::new(["Month", "Total", "Change %"]);
    for ((month, total), change) in monthly.iter().zip(&changes) {
        table.push_row(vec![
            month.to_string(),
            settings.money(*total),
            format!("{:+.2}%", change),
        ]);
    }

    let chart = ChartSpec {
        kind: ChartKind::Line,
        title: "Monthly sales".to_string(),
        x_label: "Month".to_string(),
        y_label: "Total".to_string(),
        rotate_x_labels: true,
        series: vec![Series::new(
            "Total",
            SeriesStyle::Solid,
            monthly.iter().map(|(m, t)| (m.to_string(), *t)).collect(),
        )],
    };

    let summary = format!(
        "Lowest sales month: {} ({}). Highest growth: {} ({:+.2}%).",
        monthly[low].0,
        settings.money(monthly[low].1),
        monthly[high].0,
        changes[high]
    );

    Ok(Outcome {
        intent: Intent::Trend,
        summary,
        table: Some(table),
        chart: Some(chart),
    })
}

/// Mean sale value.
pub fn average(dataset: &SalesDataset, settings: &AnalysisSettings) -> Result<Outcome> {
    let summary = match mean_value(dataset) {
        Some(mean) => format!("Average sale value: {}", settings.money(mean)),
        None => "No sales to average.".to_string(),
    };
    Ok(Outcome::summary_only(Intent::Average, summary))
}

/// Best-selling products by total value.
pub fn top_n(dataset: &SalesDataset, settings: &AnalysisSettings) -> Result<Outcome> {
    let top = top_products(dataset, settings.top_n);
    let shown = top.len();

    let mut table = Table::new(["Rank", "Product", "Total"]);
    for (rank, (product, total)) in top.iter().enumerate() {
        table.push_row(vec![
            (rank + 1).to_string(),
            product.clone(),
            settings.money(*total),
        ]);
    }

    let chart = ChartSpec {
        kind: ChartKind::Bar,
        title: format!("Top {} products", shown),
        x_label: "Product".to_string(),
        y_label: "Total".to_string(),
        rotate_x_labels: false,
        series: vec![Series::new("Total", SeriesStyle::Solid, top)],
    };

    Ok(Outcome {
        intent: Intent::TopN,
        summary: if shown == 1 {
            "Here is the best-selling product.".to_string()
        } else {
            format!("Here are the top {} best-selling products.", shown)
        },
        table: Some(table),
        chart: Some(chart),
    })
}

/// Monthly totals against a fixed goal.
pub fn goal(dataset: &SalesDataset, settings: &AnalysisSettings) -> Result<Outcome> {
    let monthly = monthly_totals(dataset);
    let target = settings.monthly_goal;

    let mut table = Table::new(["Month", "Total", "Goal", "Met goal"]);
    let mut met = 0;
    for (month, total) in &monthly {
        let reached = *total >= target;
        if reached {
            met += 1;
        }
        table.push_row(vec![
            month.to_string(),
            settings.money(*total),
            settings.money(target),
            if reached { "yes" } else { "no" }.to_string(),
        ]);
    }

    let chart = ChartSpec {
        kind: ChartKind::Line,
        title: "Actual vs goal".to_string(),
        x_label: "Month".to_string(),
        y_label: "Total".to_string(),
        rotate_x_labels: true,
        series: vec![
            Series::new(
                "Actual",
                SeriesStyle::Solid,
                monthly.iter().map(|(m, t)| (m.to_string(), *t)).collect(),
            ),
            Series::new(
                "Goal",
                SeriesStyle::Dashed,
                monthly.iter().map(|(m, _)| (m.to_string(), target)).collect(),
            ),
        ],
    };

    Ok(Outcome {
        intent: Intent::Goal,
        summary: format!(
            "{} of {} months met the goal of {}.",
            met,
            monthly.len(),
            settings.money(target)
        ),
        table: Some(table),
        chart: Some(chart),
    })
}

/// Product to invest in: the highest total, first seen on ties.
pub fn recommendation(dataset: &SalesDataset, settings: &AnalysisSettings) -> Result<Outcome> {
    let totals = totals_by_product(dataset);
    let values: Vec<f64> = totals.iter().map(|(_, t)| *t).collect();

    let summary = match argmax(&values) {
        Some(best) => format!(
            "We recommend investing in {}, the product with the highest total sales ({}).",
            totals[best].0,
            settings.money(totals[best].1)
        ),
        None => "There are no products to recommend.".to_string(),
    };

    Ok(Outcome::summary_only(Intent::Recommendation, summary))
}

/// Linear projection of the monthly totals.
pub fn forecast(dataset: &SalesDataset, settings: &AnalysisSettings) -> Result<Outcome> {
    let monthly = monthly_totals(dataset);
    let totals: Vec<f64> = monthly.iter().map(|(_, t)| *t).collect();

    let fit = linear_fit(&totals).ok_or(InsightError::UnderdeterminedForecast {
        months: monthly.len(),
    })?;

    let predictions: Vec<f64> = (0..settings.forecast_horizon)
        .map(|step| fit.predict((totals.len() + step) as f64))
        .collect();

    let mut table = Table::new(["Month", "Forecast"]);
    for (step, value) in predictions.iter().enumerate() {
        table.push_row(vec![format!("+{}", step + 1), settings.money(*value)]);
    }

    let chart = ChartSpec {
        kind: ChartKind::Line,
        title: "Sales forecast".to_string(),
        x_label: "Month".to_string(),
        y_label: "Total".to_string(),
        rotate_x_labels: true,
        series: vec![
            Series::new(
                "History",
                SeriesStyle::Solid,
                monthly.iter().map(|(m, t)| (m.to_string(), *t)).collect(),
            ),
            Series::new(
                "Forecast",
                SeriesStyle::Markers,
                predictions
                    .iter()
                    .enumerate()
                    .map(|(step, v)| (format!("+{}", step + 1), *v))
                    .collect(),
            ),
        ],
    };

    let listed: Vec<String> = predictions
        .iter()
        .enumerate()
        .map(|(step, v)| format!("Month {}: {}", step + 1, settings.money(*v)))
        .collect();

    Ok(Outcome {
        intent: Intent::Forecast,
        summary: format!("Forecast for the next months. {}", listed.join(", ")),
        table: Some(table),
        chart: Some(chart),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SalesRecord;
    use chrono::NaiveDate;

    fn record(y: i32, m: u32, product: &str, value: f64) -> SalesRecord {
        SalesRecord::new(NaiveDate::from_ymd_opt(y, m, 10).unwrap(), product, value)
    }

    fn linear_six_months() -> SalesDataset {
        let records = (1..=6)
            .map(|m| record(2024, m, "A", m as f64 * 100.0))
            .collect();
        SalesDataset::new(vec![], records)
    }

    #[test]
    fn test_trend_first_month_change_is_zero() {
        let ds = SalesDataset::new(
            vec![],
            vec![
                record(2024, 1, "A", 200.0),
                record(2024, 2, "A", 100.0),
                record(2024, 3, "A", 300.0),
            ],
        );
        let outcome = trend(&ds, &AnalysisSettings::default()).unwrap();

        let table = outcome.table.unwrap();
        assert_eq!(table.rows[0][2], "+0.00%");
        assert_eq!(table.rows[2][2], "+200.00%");
        assert!(outcome.summary.contains("Lowest sales month: 2024-02"));
        assert!(outcome.summary.contains("Highest growth: 2024-03"));
        assert!(outcome.chart.unwrap().rotate_x_labels);
    }

    #[test]
    fn test_trend_single_month() {
        let ds = SalesDataset::new(vec![], vec![record(2024, 1, "A", 5.0)]);
        let outcome = trend(&ds, &AnalysisSettings::default()).unwrap();
        assert_eq!(outcome.table.unwrap().rows[0][2], "+0.00%");
        assert!(outcome.summary.contains("Highest growth: 2024-01 (+0.00%)"));
    }

    #[test]
    fn test_average_formats_currency() {
        let ds = SalesDataset::new(
            vec![],
            vec![record(2024, 1, "A", 1000.0), record(2024, 1, "B", 1500.5)],
        );
        let outcome = average(&ds, &AnalysisSettings::default()).unwrap();
        assert_eq!(outcome.summary, "Average sale value: $1,250.25");
        assert!(outcome.table.is_none());
    }

    #[test]
    fn test_top_n_limits_and_orders() {
        let records = (0..12).map(|i| record(2024, 1, &format!("P{}", i), i as f64)).collect();
        let ds = SalesDataset::new(vec![], records);
        let outcome = top_n(&ds, &AnalysisSettings::default()).unwrap();

        let chart = outcome.chart.unwrap();
        assert_eq!(chart.kind, ChartKind::Bar);
        let points = &chart.series[0].points;
        assert_eq!(points.len(), 10);
        assert_eq!(points[0].0, "P11");
        assert!(points.windows(2).all(|w| w[0].1 > w[1].1));
        assert_eq!(outcome.summary, "Here are the top 10 best-selling products.");
    }

    #[test]
    fn test_top_n_counts_available_products() {
        let ds = SalesDataset::new(
            vec![],
            vec![
                record(2024, 1, "A", 5.0),
                record(2024, 1, "B", 9.0),
                record(2024, 2, "C", 1.0),
            ],
        );
        let outcome = top_n(&ds, &AnalysisSettings::default()).unwrap();
        assert_eq!(outcome.summary, "Here are the top 3 best-selling products.");
        assert_eq!(outcome.chart.unwrap().title, "Top 3 products");

        let single = SalesDataset::new(vec![], vec![record(2024, 1, "A", 5.0)]);
        let outcome = top_n(&single, &AnalysisSettings::default()).unwrap();
        assert_eq!(outcome.summary, "Here is the best-selling product.");
    }

    #[test]
    fn test_goal_flags_months() {
        let ds = SalesDataset::new(
            vec![],
            vec![record(2024, 1, "A", 600_000.0), record(2024, 2, "A", 400_000.0)],
        );
        let outcome = goal(&ds, &AnalysisSettings::default()).unwrap();

        let table = outcome.table.unwrap();
        assert_eq!(table.rows[0][3], "yes");
        assert_eq!(table.rows[1][3], "no");
        let chart = outcome.chart.unwrap();
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[1].style, SeriesStyle::Dashed);
        assert!(chart.series[1].points.iter().all(|(_, v)| *v == 500_000.0));
        assert_eq!(outcome.summary, "1 of 2 months met the goal of $500,000.00.");
    }

    #[test]
    fn test_goal_exact_total_meets_goal() {
        let ds = SalesDataset::new(vec![], vec![record(2024, 1, "A", 500_000.0)]);
        let outcome = goal(&ds, &AnalysisSettings::default()).unwrap();
        assert_eq!(outcome.table.unwrap().rows[0][3], "yes");
    }

    #[test]
    fn test_recommendation_picks_max() {
        let ds = SalesDataset::new(
            vec![],
            vec![
                record(2024, 1, "A", 10.0),
                record(2024, 1, "B", 30.0),
                record(2024, 2, "A", 15.0),
            ],
        );
        let outcome = recommendation(&ds, &AnalysisSettings::default()).unwrap();
        assert!(outcome.summary.contains("investing in B,"));
    }

    #[test]
    fn test_recommendation_tie_goes_to_first_seen() {
        let ds = SalesDataset::new(
            vec![],
            vec![
                record(2024, 1, "Zeta", 50.0),
                record(2024, 1, "Alpha", 50.0),
            ],
        );
        let outcome = recommendation(&ds, &AnalysisSettings::default()).unwrap();
        assert!(outcome.summary.contains("investing in Zeta,"));
    }

    #[test]
    fn test_forecast_linear_series() {
        let outcome = forecast(&linear_six_months(), &AnalysisSettings::default()).unwrap();

        let chart = outcome.chart.unwrap();
        let predicted = &chart.series[1].points;
        let expected = [("+1", 700.0), ("+2", 800.0), ("+3", 900.0)];
        assert_eq!(predicted.len(), 3);
        for ((label, value), (want_label, want_value)) in predicted.iter().zip(expected) {
            assert_eq!(label, want_label);
            assert!((value - want_value).abs() < 1e-6);
        }
        assert_eq!(chart.series[0].points[0].0, "2024-01");
        assert!(outcome.summary.contains("Month 1: $700.00"));
        assert!(outcome.summary.contains("Month 3: $900.00"));
    }

    #[test]
    fn test_forecast_needs_two_months() {
        let ds = SalesDataset::new(
            vec![],
            vec![record(2024, 1, "A", 1.0), record(2024, 1, "B", 2.0)],
        );
        let err = forecast(&ds, &AnalysisSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            InsightError::UnderdeterminedForecast { months: 1 }
        ));
    }
}

//! Answer, history and transcript rendering.
//!
//! Everything renders to Markdown that also reads well in a terminal, or
//! to JSON. Charts are drawn as text bars.

use crate::models::{ChartSpec, HistoryEntry, Outcome, SeriesStyle, Table};
use crate::session::HistoryLog;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Widest bar drawn for a chart value.
const BAR_WIDTH: usize = 40;

/// Render one answer.
pub fn render_outcome_markdown(outcome: &Outcome) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "## {} {}\n\n",
        outcome.intent.emoji(),
        outcome.intent
    ));
    output.push_str(&outcome.summary);
    output.push_str("\n\n");

    if let Some(ref table) = outcome.table {
        output.push_str(&render_table(table));
        output.push('\n');
    }

    if let Some(ref chart) = outcome.chart {
        output.push_str(&render_chart(chart));
    }

    output
}

/// Render one answer as pretty JSON.
pub fn render_outcome_json(outcome: &Outcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).map_err(Into::into)
}

/// Render a Markdown table.
pub fn render_table(table: &Table) -> String {
    let mut section = String::new();

    section.push_str(&format!("| {} |\n", table.columns.join(" | ")));
    section.push_str(&format!(
        "|{}\n",
        table.columns.iter().map(|_| ":---|").collect::<String>()
    ));
    for row in &table.rows {
        section.push_str(&format!("| {} |\n", row.join(" | ")));
    }

    section
}

/// Render a chart as horizontal text bars, one block per series.
pub fn render_chart(chart: &ChartSpec) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", chart.title));
    if !chart.x_label.is_empty() || !chart.y_label.is_empty() {
        section.push_str(&format!("*{} by {}*\n\n", chart.y_label, chart.x_label));
    }

    let max = chart
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, v)| v.abs()))
        .fold(0.0_f64, f64::max);
    let label_width = chart
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|(l, _)| l.chars().count()))
        .max()
        .unwrap_or(0);

    section.push_str("```\n");
    for series in &chart.series {
        let glyph = match series.style {
            SeriesStyle::Solid => '█',
            SeriesStyle::Dashed => '╌',
            SeriesStyle::Markers => '●',
        };
        section.push_str(&format!("{} ({:?})\n", series.name, series.style).to_lowercase());

        for (label, value) in &series.points {
            let len = if max > 0.0 {
                ((value.abs() / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            let bar = match series.style {
                SeriesStyle::Markers => format!("{:>width$}", glyph, width = len.max(1)),
                _ => glyph.to_string().repeat(len),
            };
            section.push_str(&format!(
                "  {:<label_width$} │{} {:.2}\n",
                label,
                bar,
                value,
                label_width = label_width
            ));
        }
    }
    section.push_str("```\n\n");

    section
}

/// Render the history newest first, numbered from 1.
pub fn render_history(history: &HistoryLog) -> String {
    if history.is_empty() {
        return "No questions answered yet.\n".to_string();
    }

    let mut section = String::new();
    for (number, entry) in history.recent_first() {
        section.push_str(&render_history_entry(number, entry));
    }
    section
}

fn render_history_entry(number: usize, entry: &HistoryEntry) -> String {
    format!(
        "{}. {} **{}**\n   {}\n",
        number,
        entry.intent.emoji(),
        entry.question,
        entry.answer
    )
}

/// Metadata printed at the top of a transcript.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptMetadata {
    pub data_file: String,
    pub records: usize,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Transcript<'a> {
    metadata: &'a TranscriptMetadata,
    entries: &'a [HistoryEntry],
}

/// Generate a Markdown transcript of a session.
pub fn generate_markdown_transcript(
    metadata: &TranscriptMetadata,
    history: &HistoryLog,
) -> String {
    let mut output = String::new();

    output.push_str("# Salesdesk Session\n\n");

    output.push_str("## Metadata\n\n");
    output.push_str(&format!("- **Data File:** {}\n", metadata.data_file));
    output.push_str(&format!("- **Records:** {}\n", metadata.records));
    output.push_str(&format!("- **Model:** `{}`\n", metadata.model));
    output.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("- **Questions Answered:** {}\n\n", history.len()));

    output.push_str("## History\n\n");
    output.push_str(&render_history(history));
    output.push('\n');

    output.push_str("---\n\n");
    output.push_str("*Transcript generated by Salesdesk*\n");

    output
}

/// Generate a JSON transcript of a session.
pub fn generate_json_transcript(
    metadata: &TranscriptMetadata,
    history: &HistoryLog,
) -> Result<String> {
    let transcript = Transcript {
        metadata,
        entries: history.entries(),
    };
    serde_json::to_string_pretty(&transcript).map_err(Into::into)
}

//! OpenAI-compatible answering service.
//!
//! Sends the question, the dataset schema, totals over every row and a
//! bounded CSV preview of the rows to a chat-completions endpoint and turns
//! the reply into an [`Answer`].

use super::{Answer, AnswerRequest, AnswerService};
use crate::analysis::aggregator::{mean_value, monthly_totals, totals_by_product};
use crate::error::ServiceError;
use crate::models::{ChartSpec, SalesDataset};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub max_preview_rows: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self::from(&crate::config::AssistantConfig::default())
    }
}

impl From<&crate::config::AssistantConfig> for OpenAiConfig {
    fn from(config: &crate::config::AssistantConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            max_preview_rows: config.max_preview_rows,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Chart replies must be wrapped as `{"chart": {...}}`.
#[derive(Debug, Deserialize)]
struct ChartReply {
    chart: ChartSpec,
}

/// Answering service backed by an OpenAI-compatible API.
pub struct OpenAiAnswerService {
    config: OpenAiConfig,
    http_client: reqwest::Client,
}

impl OpenAiAnswerService {
    pub fn new(config: OpenAiConfig) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ServiceError::Transport(format!("cannot create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn send_chat(
        &self,
        api_key: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<String, ServiceError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout(Duration::from_secs(self.config.timeout_seconds))
                } else if e.is_connect() {
                    ServiceError::Connect(self.config.api_url.clone())
                } else {
                    ServiceError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api { status, body });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ServiceError::InvalidResponse("no choices in response".to_string()))
    }
}

#[async_trait]
impl AnswerService for OpenAiAnswerService {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn ask(&self, request: AnswerRequest<'_>) -> Result<Answer, ServiceError> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: system_prompt(request.allow_plotting),
            },
            ChatMessage {
                role: "user".to_string(),
                content: build_prompt(
                    request.dataset,
                    request.question,
                    self.config.max_preview_rows,
                )?,
            },
        ];

        debug!("Sending question to {}", self.config.model);
        let content = self
            .send_chat(request.credential.expose(), messages)
            .await?;

        Ok(parse_answer(&content, request.allow_plotting))
    }
}

fn system_prompt(allow_plotting: bool) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();
    if allow_plotting {
        prompt.push_str(PLOTTING_PROMPT);
    }
    prompt
}

/// Build the user message: schema, size, whole-dataset totals and a CSV
/// preview of at most `max_rows` rows.
fn build_prompt(
    dataset: &SalesDataset,
    question: &str,
    max_rows: usize,
) -> Result<String, ServiceError> {
    let mut prompt = String::new();

    prompt.push_str(&format!("Columns: {}\n", dataset.header().join(", ")));
    prompt.push_str(&format!("Rows: {}\n", dataset.len()));
    if let Some((first, last)) = dataset.date_range() {
        prompt.push_str(&format!("Dates: {} to {}\n", first, last));
    }

    prompt.push_str("\n=== SUMMARY (all rows) ===\n");
    prompt.push_str(&dataset_summary(dataset));
    prompt.push_str("=== END OF SUMMARY ===\n");

    let shown = dataset.len().min(max_rows);
    if shown < dataset.len() {
        warn!(
            "Sending {} of {} rows to the answering service; totals come from the summary",
            shown,
            dataset.len()
        );
        prompt.push_str(&format!(
            "\nOnly the first {} of {} rows are listed below. \
             Use the summary for totals, rankings and trends.\n",
            shown,
            dataset.len()
        ));
    }

    prompt.push_str(&format!("\n=== DATA ({} of {} rows) ===\n", shown, dataset.len()));
    prompt.push_str(&csv_preview(dataset, max_rows)?);
    prompt.push_str("=== END OF DATA ===\n\n");

    prompt.push_str(&format!("Question: {}", question));
    Ok(prompt)
}

/// Totals computed over every row, so answers do not depend on the preview.
fn dataset_summary(dataset: &SalesDataset) -> String {
    let keys = &dataset.key_columns;
    let total: f64 = dataset.records.iter().map(|r| r.value).sum();

    let mut summary = format!("Total {}: {}\n", keys.value, total);
    if let Some(mean) = mean_value(dataset) {
        summary.push_str(&format!("Mean {} per row: {}\n", keys.value, mean));
    }

    summary.push_str(&format!("Total {} by month:\n", keys.value));
    for (month, total) in monthly_totals(dataset) {
        summary.push_str(&format!("  {}: {}\n", month, total));
    }

    summary.push_str(&format!("Total {} by {}:\n", keys.value, keys.product));
    for (product, total) in totals_by_product(dataset) {
        summary.push_str(&format!("  {}: {}\n", product, total));
    }
    summary
}

fn csv_preview(dataset: &SalesDataset, max_rows: usize) -> Result<String, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_encode = |e: csv::Error| ServiceError::Encode(e.to_string());

    let header = dataset.header();
    writer.write_record(&header).map_err(to_encode)?;

    for record in dataset.records.iter().take(max_rows) {
        let row: Vec<String> = header
            .iter()
            .map(|column| dataset.cell(record, column))
            .collect();
        writer.write_record(&row).map_err(to_encode)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ServiceError::Encode(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Interpret the reply: a bare number, a chart object, or text.
fn parse_answer(content: &str, allow_plotting: bool) -> Answer {
    let trimmed = content.trim();

    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return Answer::Number(n);
        }
    }

    if allow_plotting && trimmed.starts_with('{') {
        if let Ok(reply) = serde_json::from_str::<ChartReply>(trimmed) {
            return Answer::Chart(reply.chart);
        }
    }

    Answer::Text(trimmed.to_string())
}

const SYSTEM_PROMPT: &str = r#"You are a data analyst answering questions about a sales dataset.
You get a summary computed over all rows, then the rows as CSV (possibly only the first part).
Use the summary for totals, rankings and trends. Answer concisely using only the data provided.
If the answer is a single number, reply with the number only."#;

const PLOTTING_PROMPT: &str = r#"
If a chart answers the question best, reply with JSON only, in this shape:
{"chart": {"kind": "line" | "bar", "title": "...", "x_label": "...", "y_label": "...", "series": [{"name": "...", "points": [["label", 123.0]]}]}}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartKind, KeyColumns, SalesRecord, YearMonth};
    use chrono::NaiveDate;

    fn dataset() -> SalesDataset {
        let mut record = SalesRecord::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), "A", 10.0);
        record.extra.insert("region".to_string(), "North".to_string());
        let other = SalesRecord {
            date: NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
            year_month: YearMonth::new(2024, 2),
            ..record.clone()
        };
        SalesDataset::new(
            vec!["date".into(), "product".into(), "value".into(), "region".into()],
            vec![record, other],
        )
    }

    #[test]
    fn test_build_prompt_contains_schema_and_rows() {
        let prompt = build_prompt(&dataset(), "Which region?", 1).unwrap();
        assert!(prompt.contains("Columns: date, product, value, region"));
        assert!(prompt.contains("Rows: 2"));
        assert!(prompt.contains("Dates: 2024-01-05 to 2024-02-05"));
        assert!(prompt.contains("(1 of 2 rows)"));
        assert!(prompt.contains("Only the first 1 of 2 rows"));
        assert!(prompt.contains("date,product,value,region"));
        assert!(prompt.contains("2024-01-05,A,10,North"));
        assert!(!prompt.contains("2024-02-05,A"));
        assert!(prompt.ends_with("Question: Which region?"));
    }

    #[test]
    fn test_truncated_prompt_keeps_whole_dataset_totals() {
        let records: Vec<SalesRecord> = (0..250)
            .map(|i| {
                let day = NaiveDate::from_ymd_opt(2024, 1 + (i % 3) as u32, 1).unwrap();
                SalesRecord::new(day, if i < 200 { "A" } else { "B" }, 10.0)
            })
            .collect();
        let dataset = SalesDataset::new(vec![], records);

        let prompt = build_prompt(&dataset, "How much did B sell?", 200).unwrap();
        assert!(prompt.contains("Rows: 250"));
        assert!(prompt.contains("Total value: 2500\n"));
        assert!(prompt.contains("  A: 2000\n"));
        assert!(prompt.contains("  B: 500\n"));
        assert!(prompt.contains("  2024-01: 840\n"));
        assert!(prompt.contains("(200 of 250 rows)"));
        assert_eq!(prompt.matches(",B,").count(), 0);
    }

    #[test]
    fn test_preview_uses_source_headers() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let dataset = SalesDataset::new(
            vec!["Data".into(), "Modelo".into(), "Valor".into()],
            vec![SalesRecord::new(date, "X1", 7.0)],
        )
        .with_key_columns(KeyColumns {
            date: "Data".into(),
            product: "Modelo".into(),
            value: "Valor".into(),
        });

        let prompt = build_prompt(&dataset, "q", 10).unwrap();
        assert!(prompt.contains("Columns: Data, Modelo, Valor"));
        assert!(prompt.contains("Data,Modelo,Valor"));
        assert!(prompt.contains("2024-01-05,X1,7"));
        assert!(prompt.contains("Total Valor by Modelo:"));
        assert!(!prompt.contains("Only the first"));
    }

    #[test]
    fn test_parse_number_answer() {
        assert_eq!(parse_answer(" 42.5\n", true), Answer::Number(42.5));
    }

    #[test]
    fn test_parse_chart_answer() {
        let json = r#"{"chart": {"kind": "bar", "title": "By region", "series": [{"name": "Total", "points": [["North", 10.0]]}]}}"#;
        match parse_answer(json, true) {
            Answer::Chart(chart) => {
                assert_eq!(chart.kind, ChartKind::Bar);
                assert_eq!(chart.series[0].points[0], ("North".to_string(), 10.0));
            }
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_chart_ignored_when_plotting_disabled() {
        let json = r#"{"chart": {"kind": "bar", "title": "t", "series": []}}"#;
        assert!(matches!(parse_answer(json, false), Answer::Text(_)));
    }

    #[test]
    fn test_parse_text_answer() {
        assert_eq!(
            parse_answer("North sells the most.", true),
            Answer::Text("North sells the most.".to_string())
        );
    }

    #[test]
    fn test_system_prompt_plotting_toggle() {
        assert!(system_prompt(true).contains("\"chart\""));
        assert!(!system_prompt(false).contains("\"chart\""));
    }
}

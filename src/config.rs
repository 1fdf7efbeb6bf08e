//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.salesdesk.toml` files.

use crate::assistant::ApiKey;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".salesdesk.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dataset layout.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Canned analysis parameters.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Answering service settings.
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Write the session transcript here when the session ends.
    #[serde(default)]
    pub export: Option<String>,
}

/// Column names and parsing rules for the input CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_date_column")]
    pub date_column: String,

    #[serde(default = "default_product_column")]
    pub product_column: String,

    #[serde(default = "default_value_column")]
    pub value_column: String,

    /// chrono format strings tried in order. RFC 3339 is always tried last.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            date_column: default_date_column(),
            product_column: default_product_column(),
            value_column: default_value_column(),
            date_formats: default_date_formats(),
        }
    }
}

fn default_date_column() -> String {
    "date".to_string()
}

fn default_product_column() -> String {
    "product".to_string()
}

fn default_value_column() -> String {
    "value".to_string()
}

fn default_date_formats() -> Vec<String> {
    vec!["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%Y-%m-%d %H:%M:%S"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Parameters of the canned analyses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Monthly sales goal used by the goal view.
    #[serde(default = "default_monthly_goal")]
    pub monthly_goal: f64,

    /// Number of products in the top-N view.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Number of months projected by the forecast view.
    #[serde(default = "default_forecast_horizon")]
    pub forecast_horizon: usize,

    /// Prefix used when formatting money.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            monthly_goal: default_monthly_goal(),
            top_n: default_top_n(),
            forecast_horizon: default_forecast_horizon(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

fn default_monthly_goal() -> f64 {
    500_000.0
}

fn default_top_n() -> usize {
    10
}

fn default_forecast_horizon() -> usize {
    3
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

/// Settings for the OpenAI-compatible answering service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Base URL of the chat-completions API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Let the service answer with a chart.
    #[serde(default = "default_true")]
    pub allow_plotting: bool,

    /// Rows of the dataset included in each prompt.
    #[serde(default = "default_preview_rows")]
    pub max_preview_rows: usize,

    /// API key. Prefer the OPENAI_API_KEY environment variable.
    #[serde(default, skip_serializing, deserialize_with = "deserialize_api_key")]
    pub api_key: Option<ApiKey>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            allow_plotting: true,
            max_preview_rows: default_preview_rows(),
            api_key: None,
        }
    }
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_preview_rows() -> usize {
    200
}

fn deserialize_api_key<'de, D>(deserializer: D) -> std::result::Result<Option<ApiKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(ApiKey::new))
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check values that would make an analysis or the service meaningless.
    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if analysis.top_n == 0 {
            bail!("analysis.top_n must be at least 1");
        }
        if analysis.forecast_horizon == 0 {
            bail!("analysis.forecast_horizon must be at least 1");
        }
        if !analysis.monthly_goal.is_finite() || analysis.monthly_goal < 0.0 {
            bail!("analysis.monthly_goal must be a non-negative number");
        }
        if self.assistant.timeout_seconds == 0 {
            bail!("assistant.timeout_seconds must be at least 1");
        }
        if self.assistant.max_preview_rows == 0 {
            bail!("assistant.max_preview_rows must be at least 1");
        }
        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.salesdesk.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.assistant.model = model.clone();
        }
        if let Some(ref url) = args.api_url {
            self.assistant.api_url = url.clone();
        }
        if let Some(ref key) = args.api_key {
            self.assistant.api_key = Some(key.clone());
        }
        if let Some(timeout) = args.timeout {
            self.assistant.timeout_seconds = timeout;
        }
        if args.no_plots {
            self.assistant.allow_plotting = false;
        }

        if let Some(goal) = args.goal {
            self.analysis.monthly_goal = goal;
        }
        if let Some(top_n) = args.top_n {
            self.analysis.top_n = top_n;
        }

        if let Some(ref export) = args.export {
            self.general.export = Some(export.display().to_string());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::assistant::ApiKey;
use clap::Parser;
use std::path::PathBuf;

/// Salesdesk - ask questions about your sales data
///
/// Loads a sales CSV and answers natural-language questions about it.
/// Common questions (monthly growth, averages, best sellers, goals,
/// recommendations, forecasts) are answered locally; anything else is
/// forwarded to an OpenAI-compatible answering service.
///
/// Examples:
///   salesdesk --data sales.csv
///   salesdesk --data sales.csv --ask "show the monthly growth"
///   salesdesk --data sales.csv --ask "forecast next months" --format json
///   salesdesk --data sales.csv --export session.md
///   salesdesk --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Sales CSV file to load
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub data: Option<PathBuf>,

    /// Question to answer without starting the interactive prompt
    ///
    /// May be repeated; questions are answered in order.
    #[arg(short, long, value_name = "QUESTION")]
    pub ask: Vec<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .salesdesk.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Model used by the answering service
    #[arg(short, long, env = "SALESDESK_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, value_name = "URL", env = "SALESDESK_API_URL")]
    pub api_url: Option<String>,

    /// API key for the answering service
    #[arg(
        long,
        value_name = "KEY",
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        value_parser = parse_api_key
    )]
    pub api_key: Option<ApiKey>,

    /// Answering service timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Monthly sales goal for goal questions
    #[arg(long, value_name = "AMOUNT")]
    pub goal: Option<f64>,

    /// Number of products listed for top/best-seller questions
    #[arg(long, value_name = "COUNT")]
    pub top_n: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the session transcript to this file at exit
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Do not let the answering service reply with charts
    #[arg(long)]
    pub no_plots: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .salesdesk.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

fn parse_api_key(raw: &str) -> Result<ApiKey, String> {
    ApiKey::new(raw).ok_or_else(|| "API key must not be blank".to_string())
}

/// Output format for answers and transcripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.data {
            Some(ref path) if !path.is_file() => {
                return Err(format!("Data file does not exist: {}", path.display()));
            }
            None => return Err("--data is required".to_string()),
            _ => {}
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(goal) = self.goal {
            if !goal.is_finite() || goal < 0.0 {
                return Err("Goal must be a non-negative number".to_string());
            }
        }

        if self.top_n == Some(0) {
            return Err("Top N must be at least 1".to_string());
        }

        if self.ask.iter().any(|q| q.trim().is_empty()) {
            return Err("Questions passed with --ask must not be empty".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` comes from `[general] verbose`; `--quiet` wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Whether to run the interactive prompt.
    pub fn is_interactive(&self) -> bool {
        self.ask.is_empty()
    }
}

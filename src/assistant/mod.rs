//! Fallback answering service.
//!
//! Questions no canned analysis handles are forwarded, together with the
//! dataset, to an [`AnswerService`]. The reply is passed back untouched.

pub mod openai;

use crate::error::{InsightError, Result, ServiceError};
use crate::models::{ChartSpec, Intent, Outcome, SalesDataset};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

pub use openai::{OpenAiAnswerService, OpenAiConfig};

/// Secret used to authenticate with the answering service.
///
/// `Debug` and `Display` never show the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, ignoring blank input.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// What the answering service receives.
pub struct AnswerRequest<'a> {
    pub dataset: &'a SalesDataset,
    pub question: &'a str,
    pub credential: &'a ApiKey,
    pub allow_plotting: bool,
}

/// Opaque reply from the answering service.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    Number(f64),
    Chart(ChartSpec),
}

impl Answer {
    /// Convert to an outcome for display and history.
    pub fn into_outcome(self) -> Outcome {
        match self {
            Answer::Text(text) => Outcome::summary_only(Intent::Fallback, text),
            Answer::Number(n) => Outcome::summary_only(Intent::Fallback, n.to_string()),
            Answer::Chart(chart) => Outcome {
                intent: Intent::Fallback,
                summary: chart.title.clone(),
                table: None,
                chart: Some(chart),
            },
        }
    }
}

/// Capability: answer an open question about tabular data.
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn ask(&self, request: AnswerRequest<'_>) -> std::result::Result<Answer, ServiceError>;
}

/// Forwards unrouted questions to an [`AnswerService`].
pub struct FallbackDelegate {
    service: Box<dyn AnswerService>,
    credential: Option<ApiKey>,
    timeout: Duration,
    allow_plotting: bool,
}

impl FallbackDelegate {
    pub fn new(
        service: Box<dyn AnswerService>,
        credential: Option<ApiKey>,
        timeout: Duration,
        allow_plotting: bool,
    ) -> Self {
        Self {
            service,
            credential,
            timeout,
            allow_plotting,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn set_credential(&mut self, credential: ApiKey) {
        self.credential = Some(credential);
    }

    /// Ask the service, bounded by the configured timeout.
    pub async fn answer(&self, dataset: &SalesDataset, question: &str) -> Result<Outcome> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(InsightError::MissingCredential)?;

        info!("Forwarding question to {}", self.service.name());

        let request = AnswerRequest {
            dataset,
            question,
            credential,
            allow_plotting: self.allow_plotting,
        };

        let answer = match tokio::time::timeout(self.timeout, self.service.ask(request)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!("Answering service failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Answering service timed out");
                return Err(ServiceError::Timeout(self.timeout).into());
            }
        };

        Ok(answer.into_outcome())
    }
}

//! Per-session state.
//!
//! A [`Session`] owns the loaded dataset, the analysis settings, the
//! fallback delegate and the history of answered questions. It lives for
//! one run of the program and is dropped with it.

use crate::analysis::{handlers, AnalysisSettings};
use crate::assistant::{ApiKey, FallbackDelegate};
use crate::error::{InsightError, Result};
use crate::models::{HistoryEntry, Intent, Outcome, SalesDataset};
use crate::router;
use chrono::Utc;
use tracing::{debug, warn};

/// Append-only log of answered questions.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order they were asked.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Entries newest first, numbered from 1.
    pub fn recent_first(&self) -> impl Iterator<Item = (usize, &HistoryEntry)> {
        self.entries
            .iter()
            .rev()
            .enumerate()
            .map(|(i, entry)| (i + 1, entry))
    }
}

/// One interactive session over a dataset.
pub struct Session {
    dataset: SalesDataset,
    settings: AnalysisSettings,
    delegate: FallbackDelegate,
    history: HistoryLog,
}

impl Session {
    pub fn new(
        dataset: SalesDataset,
        settings: AnalysisSettings,
        delegate: FallbackDelegate,
    ) -> Self {
        Self {
            dataset,
            settings,
            delegate,
            history: HistoryLog::new(),
        }
    }

    pub fn dataset(&self) -> &SalesDataset {
        &self.dataset
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn has_credential(&self) -> bool {
        self.delegate.has_credential()
    }

    pub fn set_credential(&mut self, credential: ApiKey) {
        self.delegate.set_credential(credential);
    }

    /// Answer one question.
    ///
    /// Successful answers are appended to the history. Failed questions
    /// leave the history untouched.
    pub async fn ask(&mut self, question: &str) -> Result<Outcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(InsightError::EmptyQuestion);
        }

        let intent = router::classify(question);
        let result = match intent {
            Intent::Trend => handlers::trend(&self.dataset, &self.settings),
            Intent::Average => handlers::average(&self.dataset, &self.settings),
            Intent::TopN => handlers::top_n(&self.dataset, &self.settings),
            Intent::Goal => handlers::goal(&self.dataset, &self.settings),
            Intent::Recommendation => handlers::recommendation(&self.dataset, &self.settings),
            Intent::Forecast => handlers::forecast(&self.dataset, &self.settings),
            Intent::Fallback => self.delegate.answer(&self.dataset, question).await,
        };

        match result {
            Ok(outcome) => {
                self.history.push(HistoryEntry {
                    question: question.to_string(),
                    answer: outcome.summary.clone(),
                    intent: outcome.intent,
                    asked_at: Utc::now(),
                });
                debug!("History now holds {} entries", self.history.len());
                Ok(outcome)
            }
            Err(e) => {
                warn!("Question failed ({}): {}", intent, e);
                Err(e)
            }
        }
    }
}

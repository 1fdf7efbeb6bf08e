//! Question routing.
//!
//! Picks an [`Intent`] by substring containment on the lowercased question.
//! Rules are checked in order and the first match wins, so a question
//! mentioning both "monthly" and "average" is a trend question. Matching
//! is not word-aware: "stop" contains "top".

use crate::models::Intent;
use tracing::debug;

/// Trigger keywords per intent, in priority order.
const ROUTES: &[(Intent, &[&str])] = &[
    (Intent::Trend, &["monthly", "comparative", "growth"]),
    (Intent::Average, &["average"]),
    (Intent::TopN, &["top", "best sellers"]),
    (Intent::Goal, &["goal", "target"]),
    (Intent::Recommendation, &["recommend"]),
    (Intent::Forecast, &["forecast", "prediction"]),
];

/// Classify a question.
pub fn classify(question: &str) -> Intent {
    let normalized = question.to_lowercase();

    let intent = ROUTES
        .iter()
        .find(|(_, triggers)| triggers.iter().any(|t| normalized.contains(t)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Fallback);

    debug!("Routed question to {:?}", intent);
    intent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_intent() {
        assert_eq!(classify("Show the monthly totals"), Intent::Trend);
        assert_eq!(classify("comparative view please"), Intent::Trend);
        assert_eq!(classify("How is growth going?"), Intent::Trend);
        assert_eq!(classify("What is the average sale?"), Intent::Average);
        assert_eq!(classify("Top products"), Intent::TopN);
        assert_eq!(classify("who are the best sellers"), Intent::TopN);
        assert_eq!(classify("Did we hit the goal?"), Intent::Goal);
        assert_eq!(classify("monthly target"), Intent::Trend);
        assert_eq!(classify("what target did we set"), Intent::Goal);
        assert_eq!(classify("What do you recommend?"), Intent::Recommendation);
        assert_eq!(classify("Give me a forecast"), Intent::Forecast);
        assert_eq!(classify("any prediction for next quarter"), Intent::Forecast);
        assert_eq!(classify("Which region sells most?"), Intent::Fallback);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("TOP 10 PLEASE"), Intent::TopN);
        assert_eq!(classify("FoReCaSt"), Intent::Forecast);
    }

    #[test]
    fn test_trend_wins_over_average() {
        assert_eq!(classify("monthly average"), Intent::Trend);
        assert_eq!(classify("Average growth per month"), Intent::Trend);
    }

    #[test]
    fn test_top_without_earlier_trigger() {
        for q in ["top", "the TOP models", "top recommend forecast goal"] {
            assert_eq!(classify(q), Intent::TopN, "question: {}", q);
        }
    }

    #[test]
    fn test_substring_matching_misfires_inside_words() {
        // Known imprecision: no word boundaries.
        assert_eq!(classify("when did sales stop?"), Intent::TopN);
        assert_eq!(classify("laptop revenue"), Intent::TopN);
    }

    #[test]
    fn test_empty_question_falls_back() {
        assert_eq!(classify(""), Intent::Fallback);
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(ReviewDecision::Approved),
            "rejected" => Some(ReviewDecision::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client's decision on a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub submission_id: String,
    pub client_id: String,
    pub decision: ReviewDecision,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate approved/rejected review counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCounts {
    pub approved: u64,
    pub rejected: u64,
}

impl ReviewCounts {
    pub fn new(approved: u64, rejected: u64) -> Self {
        Self { approved, rejected }
    }

    pub fn total(&self) -> u64 {
        self.approved + self.rejected
    }

    /// approved / (approved + rejected), or `default` with no history.
    pub fn approval_rate_or(&self, default: f64) -> f64 {
        if self.total() == 0 {
            default
        } else {
            self.approved as f64 / self.total() as f64
        }
    }
}

/// Cached client summary as stored in `client_summaries`.
///
/// The counts the payload was computed from are kept as columns next to
/// the payload; a cached entry is only reusable while they still match.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub client_id: String,
    pub payload_json: String,
    pub approved_count: u64,
    pub rejected_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl SummaryEntry {
    pub fn counts(&self) -> ReviewCounts {
        ReviewCounts::new(self.approved_count, self.rejected_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_rate_defaults_without_history() {
        assert_eq!(ReviewCounts::default().approval_rate_or(0.5), 0.5);
        assert!((ReviewCounts::new(7, 3).approval_rate_or(0.5) - 0.7).abs() < 1e-9);
        assert_eq!(ReviewCounts::new(0, 4).approval_rate_or(0.5), 0.0);
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!(ReviewDecision::parse("approved"), Some(ReviewDecision::Approved));
        assert_eq!(ReviewDecision::parse("rejected"), Some(ReviewDecision::Rejected));
        assert_eq!(ReviewDecision::parse("changes_requested"), None);
    }
}

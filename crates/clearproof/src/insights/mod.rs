//! On-demand insights over analyzed submissions and review history: the
//! cached per-client summary and the approval-likelihood score.

pub mod scorer;
pub mod summary;
pub mod tokens;

pub use scorer::{
    compute_score, fallback_rationale, logistic, ApprovalPrediction, ApprovalScorer,
    PredictionStatus, ScoreSignals,
};
pub use summary::{assess_coverage, ClientSummary, Coverage, CoverageStatus, SummaryCache};

//! Background content analysis: the submission queue, the per-image
//! analyzer, the status state machine, the queue consumer and the startup
//! backfill scan.

pub mod aggregator;
pub mod analyzer;
pub mod backfill;
pub mod queue;
pub mod worker;

pub use aggregator::{evaluate, AnalysisOutcome, FeatureAggregator};
pub use analyzer::{MediaAnalysisResult, MediaAnalyzer};
pub use backfill::BackfillScanner;
pub use queue::AnalysisQueue;
pub use worker::AnalysisWorker;

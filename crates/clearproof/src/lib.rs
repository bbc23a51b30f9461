pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod insights;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod sanitize;
pub mod secrets;
pub mod storage;

pub use analysis::{AnalysisQueue, AnalysisWorker, BackfillScanner, FeatureAggregator, MediaAnalyzer};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError, Repository};
pub use error::{AnalysisError, ClearproofError, ConfigError, InsightsError, Result, StorageError};
pub use insights::{ApprovalPrediction, ApprovalScorer, ClientSummary, CoverageStatus, SummaryCache};
pub use model::{AnalysisStatus, ContentFeature, Submission, ThemeInsights};
pub use pipeline::{Pipeline, PipelineError, PipelineHandles};
pub use providers::{ProviderError, Providers};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};

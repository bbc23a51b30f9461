use std::path::PathBuf;
use thiserror::Error;

use crate::providers::ProviderError;

#[derive(Error, Debug)]
pub enum ClearproofError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Insights error: {0}")]
    Insights(#[from] InsightsError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid provider '{name}': {reason}")]
    InvalidProvider { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Stored path is empty")]
    EmptyPath,

    #[error("Stored path '{0}' escapes the storage root")]
    OutsideRoot(String),

    #[error("Stored file not found: {0}")]
    NotFound(PathBuf),
}

impl StorageError {
    /// Short tag used when a storage failure is folded into an analysis result.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::EmptyPath => "EmptyPath",
            StorageError::OutsideRoot(_) => "OutsideRoot",
            StorageError::NotFound(_) => "NotFound",
        }
    }
}

/// Errors that abort an analysis pass.
///
/// Per-file provider failures never show up here; they are folded into
/// `MediaAnalysisResult` error tags instead.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Failed to persist content feature: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Submission '{0}' not found")]
    SubmissionNotFound(String),

    #[error("Text generation is not configured: {0}")]
    Configuration(#[source] ProviderError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to encode summary: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClearproofError>;
